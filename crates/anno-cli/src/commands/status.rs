//! Status command handler

use std::path::Path;

use anyhow::{Context, Result};

use anno_core::{AnnotationStore, Config};

use crate::document;
use crate::output::{Output, OutputFormat};

/// Show status for one document
pub fn show(file: &Path, target: Option<String>, output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let info = document::describe(file, target.unwrap_or_default())
        .with_context(|| format!("Failed to read document: {}", file.display()))?;

    let store = AnnotationStore::open(&config, info)
        .context("Failed to open the annotation database")?;
    let info = store.info();
    let count = store.annotations().len();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "file": file.display().to_string(),
                    "filehash": info.filehash,
                    "mimetype": info.mimetype,
                    "target": info.target,
                    "annotations": count,
                    "sync_enabled": config.sync_enabled,
                    "server_url": config.server_url,
                    "database": config.db_path().display().to_string()
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", info.filehash);
        }
        OutputFormat::Human => {
            println!("anno Status");
            println!("===========");
            println!();
            println!("Document:");
            println!("  File:     {}", file.display());
            println!("  Hash:     {}", info.filehash);
            println!("  Type:     {}", info.mimetype);
            if !info.target.is_empty() {
                println!("  Target:   {}", info.target);
            }
            println!();
            println!("Annotations: {}", count);
            println!();
            println!("Sync:");
            println!(
                "  Status: {}",
                if config.sync_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!("  Server: {}", config.server_url);
            println!();
            println!("Storage:");
            println!("  Database: {}", config.db_path().display());
        }
    }

    Ok(())
}
