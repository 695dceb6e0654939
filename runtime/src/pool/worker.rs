//! Processing of a single child sitemap task.

use crate::acquisition::fetcher::DocumentSource;
use crate::acquisition::resolver::ChildSitemapTask;
use crate::acquisition::sitemap::{parse_sitemap, EntryKind};
use crate::audit::JobLog;
use crate::error::{ExtractError, ExtractResult, FetchError};
use crate::extraction::{parse_listing_url, PropertyListing};
use crate::job::control::JobControl;
use crate::output::IncrementalWriter;
use crate::pool::dedup::Deduplicator;
use std::io;
use std::sync::Arc;

/// Progress is logged every this many `<url>` entries within one document.
pub const PROGRESS_EVERY: usize = 10_000;

/// Everything a worker shares with the rest of the job.
pub struct WorkerContext {
    pub source: Arc<dyn DocumentSource>,
    pub dedup: Arc<Deduplicator>,
    pub writer: Arc<IncrementalWriter>,
    pub control: Arc<JobControl>,
    pub log: Arc<JobLog>,
}

/// Per-task tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskOutcome {
    pub urls: u64,
    pub admitted: u64,
    pub duplicates: u64,
    pub parse_failures: u64,
}

/// Fetch one child sitemap, parse its listings, admit new ids and write them.
///
/// Fetch faults come back as [`ExtractError::Fetch`]; write faults as
/// [`ExtractError::Write`]. Malformed listing URLs are logged and skipped.
pub async fn process_task(ctx: &WorkerContext, task: &ChildSitemapTask) -> ExtractResult<TaskOutcome> {
    let doc = ctx.source.fetch(&task.url).await?;
    for (i, reason) in doc.retried.iter().enumerate() {
        ctx.log.warn(format!(
            "retried {} after attempt {}: {reason}",
            task.url,
            i + 1
        ));
    }

    let entries = parse_sitemap(&doc.body).map_err(|e| FetchError {
        url: task.url.clone(),
        attempts: doc.attempts,
        reason: format!("unreadable sitemap: {e}"),
    })?;

    let mut outcome = TaskOutcome::default();
    let mut admitted: Vec<PropertyListing> = Vec::new();

    for entry in entries.iter().filter(|e| e.kind == EntryKind::Url) {
        outcome.urls += 1;
        match parse_listing_url(&entry.loc, entry.lastmod.as_deref()) {
            Ok(listing) => {
                if ctx.dedup.try_admit(&listing.property_id) {
                    admitted.push(listing);
                } else {
                    outcome.duplicates += 1;
                }
            }
            Err(e) => {
                outcome.parse_failures += 1;
                ctx.log.warn(format!("skipping listing URL: {e}"));
            }
        }
        if outcome.urls % PROGRESS_EVERY as u64 == 0 {
            ctx.log.info(format!(
                "{}: {} URLs processed in {}",
                task.category, outcome.urls, task.url
            ));
        }
    }
    outcome.admitted = admitted.len() as u64;

    if !admitted.is_empty() {
        let writer = Arc::clone(&ctx.writer);
        let category = task.category.clone();
        tokio::task::spawn_blocking(move || writer.append_rows(&category, &admitted))
            .await
            .map_err(|e| {
                ExtractError::write(
                    ctx.writer.dir(),
                    io::Error::new(io::ErrorKind::Other, e.to_string()),
                )
            })??;
    }

    Ok(outcome)
}
