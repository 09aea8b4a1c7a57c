//! Annotation command handlers

use anyhow::{anyhow, Result};

use anno_core::{AnnoClient, NoteContent, SyncEngine};

use crate::output::Output;

/// Create an annotation on a page
pub fn add(
    engine: &mut SyncEngine<AnnoClient>,
    page: u32,
    title: String,
    body: String,
    output: &Output,
) -> Result<()> {
    let note = NoteContent::new(title, body);
    let annotation = engine.add_annotation(page, &note)?;
    output.print_annotation(&annotation);
    Ok(())
}

/// List annotations, optionally for one page
pub fn list(engine: &SyncEngine<AnnoClient>, page: Option<u32>, output: &Output) -> Result<()> {
    let annotations = match page {
        Some(page) => engine.annotations_for_page(page),
        None => engine.store().annotations().to_vec(),
    };
    output.print_annotations(&annotations);
    Ok(())
}

/// Edit the title/body of an annotation
pub fn edit(
    engine: &mut SyncEngine<AnnoClient>,
    id: i64,
    title: String,
    body: String,
    output: &Output,
) -> Result<()> {
    let page = engine
        .store()
        .annotation_by_id(id)
        .ok_or_else(|| anyhow!("No annotation with id {}", id))?
        .page;

    let note = NoteContent::new(title, body);
    if engine.edit_annotation(page, &note, id)? {
        output.success(&format!("Updated annotation {}", id));
    } else {
        output.message("No changes.");
    }
    Ok(())
}

/// Delete an annotation
pub fn delete(engine: &mut SyncEngine<AnnoClient>, id: i64, output: &Output) -> Result<()> {
    let page = engine
        .store()
        .annotation_by_id(id)
        .ok_or_else(|| anyhow!("No annotation with id {}", id))?
        .page;

    engine.delete_annotation(page, id)?;
    output.success(&format!("Deleted annotation {}", id));
    Ok(())
}

/// Show the next annotation in reading order, starting from a page
pub fn next(engine: &mut SyncEngine<AnnoClient>, page: u32, output: &Output) -> Result<()> {
    match engine.next_annotation(page) {
        Some(annotation) => output.print_annotation(&annotation),
        None => output.message("No annotations."),
    }
    Ok(())
}

/// Show the previous annotation in reading order, starting from a page
pub fn prev(engine: &mut SyncEngine<AnnoClient>, page: u32, output: &Output) -> Result<()> {
    match engine.prev_annotation(page) {
        Some(annotation) => output.print_annotation(&annotation),
        None => output.message("No annotations."),
    }
    Ok(())
}
