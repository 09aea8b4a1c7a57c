//! Document identity helpers
//!
//! Derives the [`DocumentInfo`] that scopes a store: the sha256 content
//! hash, a mime type guessed from the file extension, and a display
//! title from the file name.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use anno_core::DocumentInfo;

/// Describe a document file for the annotation store
pub fn describe(path: &Path, target: String) -> Result<DocumentInfo> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let filehash = hex::encode(hasher.finalize());

    let text_title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(DocumentInfo {
        filehash,
        mimetype: mimetype_for(path).to_string(),
        target,
        text_title,
        text_creator: String::new(),
    })
}

/// Guess a mime type from the file extension
fn mimetype_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "epub" => "application/epub+zip",
        "djvu" => "image/vnd.djvu",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}
