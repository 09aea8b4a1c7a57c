//! Storage error handling
//!
//! Typed errors for database provisioning and store operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Neither the database file nor a bundled seed copy exists.
    /// Fatal at startup: the store cannot initialize.
    #[error(
        "Annotation database not found at '{db_path}' and no seed database \
         is available to install"
    )]
    MissingDatabase { db_path: PathBuf },

    /// Failed to install the bundled seed copy
    #[error("Failed to install seed database from '{seed}' to '{db_path}': {source}")]
    SeedInstall {
        seed: PathBuf,
        db_path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create the data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Attempt to remove a highlight range that is not present.
    /// This indicates a caller bug (UI/state desync), not an
    /// environmental condition, so it is surfaced rather than ignored.
    #[error("No highlight ({start}, {end}) on page {page}")]
    HighlightNotFound { page: u32, start: i64, end: i64 },

    /// Annotation id not present in the store
    #[error("No annotation with id {id}")]
    AnnotationNotFound { id: i64 },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
