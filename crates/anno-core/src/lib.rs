//! Anno Core Library
//!
//! This crate provides the core functionality for anno, a local-first
//! annotation system for documents: highlights, notes and bookmarks kept
//! in a local sqlite database and merged with a shared annotation server.
//!
//! # Architecture
//!
//! - **sqlite**: Source of truth for annotations, highlights, identity
//!   cache and deletion tombstones
//! - **Sync engine**: fetch/merge/push against the annotation server,
//!   last-writer-wins with a clock-skew tolerance
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let store = AnnotationStore::open(&config, info)?;
//! let client = AnnoClient::new(&config.server_url)?;
//! let mut engine = SyncEngine::new(store, client, &config);
//!
//! engine.add_annotation(4, &NoteContent::new("title", "a note"))?;
//! engine.sync_annotations(&mut NullObserver)?;
//! ```
//!
//! # Modules
//!
//! - `sync`: The engine collaborators talk to (main entry point)
//! - `store`: Persistent annotation/highlight store for one document
//! - `client`: HTTP client for the annotation server
//! - `models`: Annotation, highlight and note data structures
//! - `nav`: Cyclic page-order navigation over the annotation set
//! - `identity`: Nickname hashing for server-side identity
//! - `storage`: Database provisioning and schema
//! - `config`: Application configuration

pub mod client;
pub mod config;
pub mod identity;
pub mod models;
pub mod nav;
pub mod storage;
pub mod store;
pub mod sync;

pub use client::{AnnoClient, AnnotationService, ClientError, LookupKey, PushReceipt};
pub use config::Config;
pub use models::{Annotation, Highlight, NoteContent};
pub use nav::{Cursor, NavIndex};
pub use storage::{StoreError, StoreResult};
pub use store::{AnnotationStore, DocumentInfo};
pub use sync::{NullObserver, PageObserver, SyncEngine, SyncSummary};
