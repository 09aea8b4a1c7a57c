//! anno CLI
//!
//! Command-line collaborator for anno - document annotations with
//! remote sync. Every document-scoped command takes the document file;
//! its content hash keys the local store and the server lookups.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use anno_core::{AnnoClient, AnnotationStore, Config, StoreError, SyncEngine};

mod commands;
mod document;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "anno")]
#[command(about = "anno - Local-first document annotations with remote sync")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// The document a command operates on
#[derive(Args)]
struct DocumentArgs {
    /// Path to the document file
    file: PathBuf,

    /// External target URL for cross-edition matching
    #[arg(long)]
    target: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the annotation database (first-time setup)
    Init,
    /// Create an annotation on a page
    Add {
        #[command(flatten)]
        doc: DocumentArgs,
        /// Page number
        #[arg(short, long)]
        page: u32,
        /// Annotation title
        #[arg(short = 'T', long)]
        title: String,
        /// Annotation body
        #[arg(short, long, default_value = "")]
        body: String,
    },
    /// List annotations
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        doc: DocumentArgs,
        /// Only this page
        #[arg(short, long)]
        page: Option<u32>,
    },
    /// Edit an annotation
    Edit {
        #[command(flatten)]
        doc: DocumentArgs,
        /// Annotation ID
        id: i64,
        /// New title
        #[arg(short = 'T', long)]
        title: String,
        /// New body
        #[arg(short, long, default_value = "")]
        body: String,
    },
    /// Delete an annotation
    #[command(alias = "rm")]
    Delete {
        #[command(flatten)]
        doc: DocumentArgs,
        /// Annotation ID
        id: i64,
    },
    /// Show the next annotation from a page, in reading order
    Next {
        #[command(flatten)]
        doc: DocumentArgs,
        /// Page to start from
        #[arg(short, long, default_value_t = 0)]
        page: u32,
    },
    /// Show the previous annotation from a page, in reading order
    Prev {
        #[command(flatten)]
        doc: DocumentArgs,
        /// Page to start from
        #[arg(short, long, default_value_t = 0)]
        page: u32,
    },
    /// Manage highlights
    Highlight {
        #[command(subcommand)]
        command: HighlightCommands,
    },
    /// Sync with the annotation server (pull and push)
    Sync {
        #[command(flatten)]
        doc: DocumentArgs,
    },
    /// Download remote annotations without pushing local ones
    Download {
        #[command(flatten)]
        doc: DocumentArgs,
    },
    /// Show status for a document
    Status {
        #[command(flatten)]
        doc: DocumentArgs,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum HighlightCommands {
    /// Add a highlight to a page
    Add {
        #[command(flatten)]
        doc: DocumentArgs,
        /// Page number
        #[arg(short, long)]
        page: u32,
        /// Range start position
        #[arg(short, long)]
        start: i64,
        /// Range end position
        #[arg(short, long)]
        end: i64,
    },
    /// Remove a highlight from a page
    #[command(alias = "rm")]
    Remove {
        #[command(flatten)]
        doc: DocumentArgs,
        /// Page number
        #[arg(short, long)]
        page: u32,
        /// Range start position
        #[arg(short, long)]
        start: i64,
        /// Range end position
        #[arg(short, long)]
        end: i64,
    },
    /// List highlights on a page
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        doc: DocumentArgs,
        /// Page number
        #[arg(short, long)]
        page: u32,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, server_url, nickname, user_color, sync_enabled)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match cli.command {
        Commands::Init => handle_init_command(&output),
        Commands::Config { command } => handle_config_command(command, &output),
        Commands::Status { doc } => commands::status::show(&doc.file, doc.target, &output),
        Commands::Add {
            doc,
            page,
            title,
            body,
        } => {
            let mut engine = open_engine(&doc)?;
            commands::annotation::add(&mut engine, page, title, body, &output)
        }
        Commands::List { doc, page } => {
            let engine = open_engine(&doc)?;
            commands::annotation::list(&engine, page, &output)
        }
        Commands::Edit {
            doc,
            id,
            title,
            body,
        } => {
            let mut engine = open_engine(&doc)?;
            commands::annotation::edit(&mut engine, id, title, body, &output)
        }
        Commands::Delete { doc, id } => {
            let mut engine = open_engine(&doc)?;
            commands::annotation::delete(&mut engine, id, &output)
        }
        Commands::Next { doc, page } => {
            let mut engine = open_engine(&doc)?;
            commands::annotation::next(&mut engine, page, &output)
        }
        Commands::Prev { doc, page } => {
            let mut engine = open_engine(&doc)?;
            commands::annotation::prev(&mut engine, page, &output)
        }
        Commands::Highlight { command } => handle_highlight_command(command, &output),
        Commands::Sync { doc } => {
            let mut engine = open_engine(&doc)?;
            commands::sync::sync(&mut engine, &output)
        }
        Commands::Download { doc } => {
            let mut engine = open_engine(&doc)?;
            commands::sync::download(&mut engine, &output)
        }
    }
}

fn handle_highlight_command(command: HighlightCommands, output: &Output) -> Result<()> {
    match command {
        HighlightCommands::Add {
            doc,
            page,
            start,
            end,
        } => {
            let mut engine = open_engine(&doc)?;
            commands::highlight::add(&mut engine, page, start, end, output)
        }
        HighlightCommands::Remove {
            doc,
            page,
            start,
            end,
        } => {
            let mut engine = open_engine(&doc)?;
            commands::highlight::remove(&mut engine, page, start, end, output)
        }
        HighlightCommands::List { doc, page } => {
            let mut engine = open_engine(&doc)?;
            commands::highlight::list(&mut engine, page, output)
        }
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}

fn handle_init_command(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    if provision_database(&config)? {
        output.success(&format!(
            "Created annotation database at {}",
            config.db_path().display()
        ));
    } else {
        output.message(&format!(
            "Database already exists at {}",
            config.db_path().display()
        ));
    }
    Ok(())
}

/// Create the annotation database if it does not exist yet
///
/// Returns whether a database was created. A bundled seed (when
/// `seed_path` is configured) still takes effect at store open; this is
/// the path for installations without one.
fn provision_database(config: &Config) -> Result<bool> {
    let db_path = config.db_path();
    if db_path.exists() {
        return Ok(false);
    }

    anno_core::storage::create_seed(&db_path)
        .with_context(|| format!("Failed to create database at {}", db_path.display()))?;
    Ok(true)
}

/// Open the store and engine for one document
fn open_engine(doc: &DocumentArgs) -> Result<SyncEngine<AnnoClient>> {
    let config = Config::load().context("Failed to load configuration")?;

    let target = doc.target.clone().unwrap_or_default();
    let info = document::describe(&doc.file, target)
        .with_context(|| format!("Failed to read document: {}", doc.file.display()))?;

    let store = AnnotationStore::open(&config, info).map_err(|e| match e {
        StoreError::MissingDatabase { .. } => {
            anyhow::anyhow!("{}. Run `anno init` to create it.", e)
        }
        other => anyhow::Error::new(other).context("Failed to open the annotation database"),
    })?;
    let client =
        AnnoClient::new(&config.server_url).context("Failed to build the server client")?;

    Ok(SyncEngine::new(store, client, &config))
}

/// Log to stderr; level controlled by RUST_LOG, warnings by default
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
