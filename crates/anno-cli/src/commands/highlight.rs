//! Highlight command handlers

use anyhow::{bail, Context, Result};

use anno_core::{AnnoClient, Highlight, SyncEngine};

use crate::output::Output;

/// Add a highlight to a page
pub fn add(
    engine: &mut SyncEngine<AnnoClient>,
    page: u32,
    start: i64,
    end: i64,
    output: &Output,
) -> Result<()> {
    if start > end {
        bail!("Highlight start {} is past its end {}", start, end);
    }

    engine.add_highlight(page, Highlight::new(start, end))?;
    output.success(&format!("Highlighted {}..{} on page {}", start, end, page));
    Ok(())
}

/// Remove a highlight from a page
pub fn remove(
    engine: &mut SyncEngine<AnnoClient>,
    page: u32,
    start: i64,
    end: i64,
    output: &Output,
) -> Result<()> {
    engine
        .remove_highlight(page, Highlight::new(start, end))
        .context("Failed to remove highlight")?;
    output.success(&format!(
        "Removed highlight {}..{} on page {}",
        start, end, page
    ));
    Ok(())
}

/// List highlights on a page
pub fn list(engine: &mut SyncEngine<AnnoClient>, page: u32, output: &Output) -> Result<()> {
    let highlights = engine.highlights(page);
    output.print_highlights(page, &highlights);
    Ok(())
}
