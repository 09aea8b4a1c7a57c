//! Config command handlers

use anyhow::{bail, Context, Result};

use anno_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "server_url": config.server_url,
                    "nickname": config.nickname,
                    "user_color": config.user_color,
                    "sync_enabled": config.sync_enabled,
                    "seed_path": config.seed_path
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:     {}", config.data_dir.display());
            println!("  server_url:   {}", config.server_url);
            println!(
                "  nickname:     {}",
                if config.nickname.is_empty() {
                    "(not set)"
                } else {
                    &config.nickname
                }
            );
            println!("  user_color:   {}", config.user_color);
            println!("  sync_enabled: {}", config.sync_enabled);
            println!(
                "  seed_path:    {}",
                config
                    .seed_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    match key.as_str() {
        "data_dir" => {
            config.data_dir = value.clone().into();
        }
        "server_url" => {
            config.server_url = value.clone();
        }
        "nickname" => {
            config.nickname = value.clone();
        }
        "user_color" => {
            config.user_color = value.clone();
        }
        "sync_enabled" => {
            config.sync_enabled = value
                .parse()
                .context("Invalid value for sync_enabled. Use 'true' or 'false'.")?;
        }
        "seed_path" => {
            config.seed_path = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.clone().into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, server_url, nickname, user_color, sync_enabled, seed_path",
                key
            );
        }
    }

    config.save().context("Failed to save configuration")?;
    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}
