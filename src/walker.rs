//! Listing walker.
//!
//! For every [`ListingRequest`] the walker pages through the listing, gives
//! each entry a zero-padded sequence index and hands submissions to the
//! [`ItemPipeline`] under `<listing dir>/<index>_<sanitized title>`.
//! Comments (user comment listings) are written as single records.
//!
//! Failures never stop the walk:
//! - a failing entry is logged with its index and the next entry proceeds
//! - a failing listing (the listing stream yields an error) is abandoned and
//!   the next listing starts
//!
//! Entries may be processed concurrently (`concurrency > 1`); results are
//! consumed in listing order, so indices follow the listing regardless of
//! completion order.

use futures::FutureExt;
use futures::stream::StreamExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Error, Result};
use crate::models::{Comment, Entry};
use crate::outputs::{comments, json::write_pretty};
use crate::pipeline::ItemPipeline;
use crate::reddit::{ListingProvider, ListingRequest};
use crate::utils::{
    MAX_TITLE_CHARS, item_dir_name, padded_index, sanitize_name, truncate_for_log,
};

/// Host directory under the output root.
pub const SITE_DIR: &str = "www.reddit.com";

/// Profile file of an archived user.
pub const USER_FILE: &str = "user.json";

/// Per-listing totals, logged when the listing ends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingSummary {
    pub listing: String,
    pub processed: usize,
    /// Entries whose retrieval, metadata or comment stage failed.
    pub failed: usize,
    /// Set when the listing itself failed and was abandoned.
    pub aborted: Option<String>,
    pub elapsed: Duration,
}

enum EntryResult {
    Ok { failed: bool },
    Panicked,
    ListingFailed(Error),
}

/// Walks listings and feeds their entries to the pipeline.
pub struct Walker {
    provider: Arc<dyn ListingProvider>,
    pipeline: ItemPipeline,
    site_root: PathBuf,
    concurrency: usize,
}

impl Walker {
    /// `output_root` is the user-chosen root; files land under
    /// `<output_root>/www.reddit.com/...`.
    pub fn new(
        provider: Arc<dyn ListingProvider>,
        pipeline: ItemPipeline,
        output_root: &Path,
        concurrency: usize,
    ) -> Self {
        Self {
            provider,
            pipeline,
            site_root: output_root.join(SITE_DIR),
            concurrency: concurrency.max(1),
        }
    }

    pub fn site_root(&self) -> &Path {
        &self.site_root
    }

    /// Walk every listing in order.
    pub async fn walk(&self, requests: &[ListingRequest]) -> Vec<ListingSummary> {
        let mut summaries = Vec::with_capacity(requests.len());
        for request in requests {
            summaries.push(self.walk_listing(request).await);
        }
        summaries
    }

    /// Page through one listing and archive every entry it yields.
    ///
    /// Up to `concurrency` entries are processed at once while results are
    /// consumed in listing order. A failing or panicking entry is counted and
    /// skipped; an error from the listing itself abandons the listing.
    ///
    /// # Arguments
    ///
    /// * `request` - The listing to walk; its entries land under
    ///   `<site root>/<request.relative_dir()>`
    ///
    /// # Returns
    ///
    /// A [`ListingSummary`] with processed and failed counts, and the
    /// reason the listing was abandoned, if it was.
    #[instrument(level = "info", skip_all, fields(listing = %request.label()))]
    pub async fn walk_listing(&self, request: &ListingRequest) -> ListingSummary {
        let t0 = Instant::now();
        let listing_dir = self.site_root.join(request.relative_dir());
        let mut summary = ListingSummary {
            listing: request.label(),
            ..Default::default()
        };
        info!(dir = %listing_dir.display(), "Walking listing");

        let listing_dir = listing_dir.as_path();
        let mut results = self
            .provider
            .listing(request)
            .enumerate()
            .map(|(index, entry)| async move {
                match entry {
                    Ok(entry) => AssertUnwindSafe(self.process_entry(index, entry, listing_dir))
                        .catch_unwind()
                        .await
                        .map(|failed| EntryResult::Ok { failed })
                        .unwrap_or(EntryResult::Panicked),
                    Err(e) => EntryResult::ListingFailed(e),
                }
            })
            .buffered(self.concurrency);

        while let Some(result) = results.next().await {
            match result {
                EntryResult::Ok { failed } => {
                    summary.processed += 1;
                    summary.failed += usize::from(failed);
                }
                EntryResult::Panicked => {
                    summary.processed += 1;
                    summary.failed += 1;
                    error!("Entry processing panicked; continuing with next entry");
                }
                EntryResult::ListingFailed(e) => {
                    let message = truncate_for_log(&e.to_string(), 300);
                    warn!(error = %message, "Listing failed; abandoning it");
                    summary.aborted = Some(message);
                    break;
                }
            }
        }

        summary.elapsed = t0.elapsed();
        info!(
            processed = summary.processed,
            failed = summary.failed,
            aborted = summary.aborted.is_some(),
            elapsed_ms = summary.elapsed.as_millis(),
            "Listing finished"
        );
        summary
    }

    /// Process one entry; returns whether anything about it failed.
    async fn process_entry(&self, index: usize, entry: Entry, listing_dir: &Path) -> bool {
        match entry {
            Entry::Submission(submission) => {
                let item_dir = listing_dir.join(item_dir_name(index, &submission.title));
                let report = self.pipeline.process(index, &submission, &item_dir).await;
                debug!(
                    index = report.index,
                    category = %report.category,
                    dir = %report.item_dir.display(),
                    bytes = report.retrieval.bytes_written(),
                    "Item done"
                );
                report.has_failures()
            }
            Entry::Comment(comment) => {
                let path = listing_dir.join(comment_file_name(index, &comment));
                match comments::write_comment(&comment, &path).await {
                    Ok(()) => false,
                    Err(e) => {
                        warn!(
                            index,
                            error = %truncate_for_log(&e.to_string(), 300),
                            "Writing comment failed"
                        );
                        true
                    }
                }
            }
        }
    }

    /// Write `u/<name>/user.json`.
    #[instrument(level = "info", skip(self))]
    pub async fn archive_user_profile(&self, name: &str) -> Result<PathBuf> {
        let profile = self.provider.user_profile(name).await?;
        let path = self.site_root.join("u").join(name).join(USER_FILE);
        write_pretty(&profile, &path).await?;
        info!(path = %path.display(), "Saved user profile");
        Ok(path)
    }

    /// Archive a user: profile first, then their listings. A profile failure
    /// is logged and the listings still run.
    pub async fn walk_user(&self, name: &str, requests: &[ListingRequest]) -> Vec<ListingSummary> {
        if let Err(e) = self.archive_user_profile(name).await {
            warn!(user = name, error = %truncate_for_log(&e.to_string(), 300), "Saving user profile failed");
        }
        self.walk(requests).await
    }
}

/// `<index>_Comment_<sanitized body>.json`.
pub fn comment_file_name(index: usize, comment: &Comment) -> String {
    format!(
        "{}_Comment_{}.json",
        padded_index(index),
        sanitize_name(&comment.body, MAX_TITLE_CHARS)
    )
}
