//! Sync command handlers

use anyhow::{bail, Result};

use anno_core::{AnnoClient, Config, PageObserver, SyncEngine, SyncSummary};

use crate::output::Output;

/// Observer that collects the pages new annotations landed on
#[derive(Default)]
struct PageCollector {
    pages: Vec<u32>,
}

impl PageObserver for PageCollector {
    fn page_updated(&mut self, page: u32) {
        self.pages.push(page);
    }
}

/// Full sync with the annotation server
pub fn sync(engine: &mut SyncEngine<AnnoClient>, output: &Output) -> Result<()> {
    let config = Config::load()?;
    if !config.sync_enabled {
        bail!(
            "Sync is not enabled. Enable it with:\n  \
             anno config set sync_enabled true\n  \
             anno config set nickname <your-nickname>"
        );
    }

    let mut observer = PageCollector::default();
    let summary = engine.sync_annotations(&mut observer)?;
    report(&summary, &observer.pages, output);
    Ok(())
}

/// Download remote annotations without pushing local ones
pub fn download(engine: &mut SyncEngine<AnnoClient>, output: &Output) -> Result<()> {
    let mut observer = PageCollector::default();
    let summary = engine.download_annotations(&mut observer)?;
    report(&summary, &observer.pages, output);
    Ok(())
}

fn report(summary: &SyncSummary, pages: &[u32], output: &Output) {
    if output.format == crate::output::OutputFormat::Json {
        println!(
            "{}",
            serde_json::json!({
                "inserted": summary.inserted,
                "updated": summary.updated,
                "pushed": summary.pushed,
                "deleted": summary.deleted,
                "updated_pages": pages
            })
        );
        return;
    }

    output.success(&format!(
        "Sync complete - {} pulled, {} updated, {} pushed, {} deleted",
        summary.inserted, summary.updated, summary.pushed, summary.deleted
    ));

    if !pages.is_empty() {
        let pages: Vec<String> = pages.iter().map(|p| p.to_string()).collect();
        output.message(&format!("  New annotations on pages: {}", pages.join(", ")));
    }
}
