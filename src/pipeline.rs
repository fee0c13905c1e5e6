//! Per-item pipeline.
//!
//! Every submission goes through the same stages:
//!
//! ```text
//! Classified -> Retrieved{ok|failed|skipped} -> Meta{written|failed|skipped}
//!            -> Comments{written|failed|skipped} -> Done
//! ```
//!
//! Each stage after classification can be skipped by [`PipelineOptions`]
//! and can fail on its own; a failure is logged with the item index and the
//! next stage still runs. [`ItemPipeline::process`] therefore always
//! returns an [`ItemReport`] and never an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::classify::{self, Category, ClassifyOptions};
use crate::error::Error;
use crate::models::Submission;
use crate::outputs::{comments, submission};
use crate::reddit::ListingProvider;
use crate::retrieve::{RetrievalOutcome, Retriever};
use crate::utils::truncate_for_log;

/// Sub-directory holding retrieved content.
pub const FILES_DIR: &str = "files";

/// Maximum bytes of an error message in a warning.
const MAX_LOGGED_ERROR: usize = 300;

/// Stage switches and limits for one run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub skip_videos: bool,
    pub skip_meta: bool,
    pub skip_comments: bool,
    /// `Some(0)` keeps top-level comments only; `None` keeps the whole
    /// forest with collapsed threads expanded.
    pub comment_depth: Option<usize>,
    /// Send unrecognized links to the external video extractor.
    pub video_extraction: bool,
    /// Collapsed-thread expansions per submission when depth is unbounded.
    pub more_comments_budget: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            skip_videos: false,
            skip_meta: false,
            skip_comments: false,
            comment_depth: Some(0),
            video_extraction: false,
            more_comments_budget: 32,
        }
    }
}

/// Outcome of the metadata and comment stages.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Written,
    Skipped,
    Failed(String),
}

impl StageOutcome {
    fn from_result(result: crate::error::Result<()>) -> Self {
        match result {
            Ok(()) => StageOutcome::Written,
            Err(e) => StageOutcome::Failed(e.to_string()),
        }
    }
}

/// What happened to one item.
#[derive(Debug)]
pub struct ItemReport {
    pub index: usize,
    pub category: Category,
    pub item_dir: PathBuf,
    pub retrieval: RetrievalOutcome,
    pub meta: StageOutcome,
    pub comments: StageOutcome,
}

impl ItemReport {
    pub fn has_failures(&self) -> bool {
        self.retrieval.is_failed()
            || matches!(self.meta, StageOutcome::Failed(_))
            || matches!(self.comments, StageOutcome::Failed(_))
    }
}

/// Classify, retrieve and record one submission.
#[derive(Clone)]
pub struct ItemPipeline {
    provider: Arc<dyn ListingProvider>,
    retriever: Retriever,
    options: PipelineOptions,
}

impl ItemPipeline {
    pub fn new(
        provider: Arc<dyn ListingProvider>,
        retriever: Retriever,
        options: PipelineOptions,
    ) -> Self {
        Self {
            provider,
            retriever,
            options,
        }
    }

    /// Where retrieved files go: `files/`, or the item directory itself when
    /// neither metadata nor comments are written.
    pub fn files_dir(&self, item_dir: &Path) -> PathBuf {
        if self.options.skip_meta && self.options.skip_comments {
            item_dir.to_path_buf()
        } else {
            item_dir.join(FILES_DIR)
        }
    }

    /// Classify a submission, asking the extractor about otherwise generic
    /// links when video extraction is enabled.
    pub async fn classify(&self, submission: &Submission) -> Category {
        let url = submission.link();
        let options = ClassifyOptions {
            video_extraction: self.options.video_extraction,
        };
        let category = classify::classify(url, submission, options);
        if category != Category::GenericLink
            || !self.options.video_extraction
            || !classify::extractor_eligible(url)
        {
            return category;
        }
        match self.retriever.extractor() {
            Some(extractor) => classify::refine_with_extractor(category, extractor.supports(url).await),
            None => category,
        }
    }

    /// Run every stage for one submission: classify, retrieve, then write
    /// `submission.json` and `comments.json`.
    ///
    /// Stages are independent; a failure in one is logged and recorded in
    /// the report, and the remaining stages still run.
    ///
    /// # Arguments
    ///
    /// * `index` - Zero-based position of the submission in its listing
    /// * `submission` - The record to archive
    /// * `item_dir` - Directory for this item; media goes to `<item_dir>/files`
    ///
    /// # Returns
    ///
    /// An [`ItemReport`] with the outcome of each stage. This never fails.
    #[instrument(level = "info", skip_all, fields(index = index, id = %submission.id))]
    pub async fn process(&self, index: usize, submission: &Submission, item_dir: &Path) -> ItemReport {
        let url = submission.link();
        info!(title = %truncate_for_log(&submission.title, 120), url, "Processing item");

        if let Err(e) = tokio::fs::create_dir_all(item_dir).await {
            warn!(index, dir = %item_dir.display(), error = %e, "Failed to create item directory");
        }

        // Classified
        let category = self.classify(submission).await;
        debug!(index, %category, "Classified");

        // Retrieved
        let retrieval = self
            .retriever
            .retrieve(
                category,
                submission,
                &self.files_dir(item_dir),
                self.options.skip_videos,
            )
            .await;
        match &retrieval {
            RetrievalOutcome::Done(r) if r.failed_items > 0 => warn!(
                index,
                %category,
                failed_items = r.failed_items,
                saved = r.files.len(),
                "Some items could not be retrieved"
            ),
            RetrievalOutcome::Done(r) => debug!(index, files = r.files.len(), "Retrieved"),
            RetrievalOutcome::Skipped(reason) => debug!(index, reason, "Retrieval skipped"),
            RetrievalOutcome::Failed(e) => warn!(
                index,
                %category,
                url,
                error = %truncate_for_log(&e.to_string(), MAX_LOGGED_ERROR),
                "Retrieval failed"
            ),
        }

        // Meta
        let meta = if self.options.skip_meta {
            StageOutcome::Skipped
        } else {
            StageOutcome::from_result(submission::write_submission(submission, item_dir).await)
        };
        if let StageOutcome::Failed(e) = &meta {
            warn!(index, error = %truncate_for_log(e, MAX_LOGGED_ERROR), "Writing submission.json failed");
        }

        // Comments
        let comments = if self.options.skip_comments {
            StageOutcome::Skipped
        } else {
            StageOutcome::from_result(self.write_comments(submission, item_dir).await)
        };
        if let StageOutcome::Failed(e) = &comments {
            warn!(index, error = %truncate_for_log(e, MAX_LOGGED_ERROR), "Writing comments.json failed");
        }

        ItemReport {
            index,
            category,
            item_dir: item_dir.to_path_buf(),
            retrieval,
            meta,
            comments,
        }
    }

    async fn write_comments(&self, submission: &Submission, item_dir: &Path) -> Result<(), Error> {
        let depth = self.options.comment_depth;
        let budget = depth.is_none().then_some(self.options.more_comments_budget);
        let forest = self.provider.comment_forest(submission, budget).await?;
        let records = comments::flatten(&forest, depth);
        debug!(count = records.len(), ?depth, "Flattened comments");
        comments::write_comments(&records, item_dir).await
    }
}
