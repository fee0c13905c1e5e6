//! Retrieval strategies, one per content category.
//!
//! [`Retriever::retrieve`] dispatches on the [`Category`] computed by the
//! classifier and never returns an error: every failure is folded into a
//! [`RetrievalOutcome`] so the item pipeline can carry on with metadata and
//! comments.
//!
//! # Strategies
//!
//! | Category | Module | Files written |
//! |----------|--------|---------------|
//! | direct-media | [`direct`] | `<url leaf>` |
//! | reddit-gallery | [`gallery`] | `<media_id>.<subtype>` per item |
//! | reddit-video | [`reddit_video`] | `<id>_video.mp4`, `<id>_audio.mp4`, `<id>.mp4` |
//! | short-video-host | [`short_video`] / [`extractor`] | `<url leaf>.<ext>` / `<id>.<ext>` |
//! | album-host | [`imgur`] | `<index>_<link leaf>` per image |
//! | single-hosted-image | [`imgur`] | `<image id>.<subtype>` |
//! | self-text, generic-link | none | nothing |
//!
//! Strategies that loop over several items (galleries, albums) catch
//! per-item failures and count them in [`Retrieved::failed_items`].

mod direct;
mod extractor;
mod gallery;
mod imgur;
mod reddit_video;
mod short_video;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

use crate::classify::{Category, VideoSource};
use crate::error::{Error, Result};
use crate::external::{Muxer, VideoExtractor};
use crate::http::Fetcher;
use crate::imgur::ImgurClient;
use crate::models::Submission;

/// Files produced by a successful retrieval.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Retrieved {
    pub files: Vec<PathBuf>,
    pub bytes_written: u64,
    /// Items of a multi-item payload that could not be fetched.
    pub failed_items: usize,
}

impl Retrieved {
    fn record(&mut self, path: PathBuf, bytes: u64) {
        self.files.push(path);
        self.bytes_written += bytes;
    }
}

/// Result of the retrieval stage of one item.
#[derive(Debug)]
pub enum RetrievalOutcome {
    Done(Retrieved),
    /// Nothing to fetch (self-text, generic link) or skipped by option.
    Skipped(&'static str),
    Failed(Error),
}

impl RetrievalOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, RetrievalOutcome::Failed(_))
    }

    pub fn bytes_written(&self) -> u64 {
        match self {
            RetrievalOutcome::Done(r) => r.bytes_written,
            _ => 0,
        }
    }
}

/// Runs the retrieval strategy matching an item's category.
#[derive(Clone)]
pub struct Retriever {
    fetcher: Fetcher,
    imgur: ImgurClient,
    extractor: Option<Arc<dyn VideoExtractor>>,
    muxer: Option<Arc<dyn Muxer>>,
}

impl Retriever {
    pub fn new(
        fetcher: Fetcher,
        imgur: ImgurClient,
        extractor: Option<Arc<dyn VideoExtractor>>,
        muxer: Option<Arc<dyn Muxer>>,
    ) -> Self {
        Self {
            fetcher,
            imgur,
            extractor,
            muxer,
        }
    }

    /// The configured extractor, used by the pipeline for link probing.
    pub fn extractor(&self) -> Option<&Arc<dyn VideoExtractor>> {
        self.extractor.as_ref()
    }

    /// Fetch the content of `submission` into `dest`.
    ///
    /// `dest` is created lazily, only by strategies that write files.
    ///
    /// # Arguments
    ///
    /// * `category` - Strategy picked by classification
    /// * `submission` - Record carrying the link and its payloads
    /// * `dest` - Directory for the retrieved files
    /// * `skip_videos` - Skip video categories and video gallery items
    ///
    /// # Returns
    ///
    /// [`RetrievalOutcome::Done`] with the files written,
    /// [`RetrievalOutcome::Skipped`] when nothing is fetched by design, or
    /// [`RetrievalOutcome::Failed`] with the error.
    #[instrument(level = "info", skip_all, fields(category = %category, id = %submission.id))]
    pub async fn retrieve(
        &self,
        category: Category,
        submission: &Submission,
        dest: &Path,
        skip_videos: bool,
    ) -> RetrievalOutcome {
        if skip_videos && category.is_video() {
            return RetrievalOutcome::Skipped("video content skipped");
        }
        let url = submission.link();
        let t0 = Instant::now();
        let result = match category {
            Category::SelfText => return RetrievalOutcome::Skipped("self-text has no linked content"),
            Category::GenericLink => return RetrievalOutcome::Skipped("generic link"),
            Category::DirectMedia(_) => self.retrieve_direct(url, dest).await,
            Category::RedditGallery => self.retrieve_gallery(submission, dest, skip_videos).await,
            Category::RedditVideo => self.retrieve_reddit_video(submission, dest).await,
            Category::ShortVideoHost(VideoSource::GifHost) => {
                self.retrieve_short_video(submission, dest).await
            }
            Category::ShortVideoHost(VideoSource::Extractor) => {
                self.retrieve_with_extractor(url, dest).await
            }
            Category::AlbumHost => self.retrieve_album(url, dest).await,
            Category::SingleHostedImage => self.retrieve_single_image(url, dest).await,
        };
        match result {
            Ok(retrieved) => {
                debug!(
                    files = retrieved.files.len(),
                    bytes = retrieved.bytes_written,
                    failed_items = retrieved.failed_items,
                    elapsed_ms = t0.elapsed().as_millis(),
                    "Retrieval finished"
                );
                RetrievalOutcome::Done(retrieved)
            }
            Err(e) => RetrievalOutcome::Failed(e),
        }
    }

    /// Download `url` to `dest/file_name`, creating `dest` first.
    async fn download_into(&self, url: &str, dest: &Path, file_name: &str) -> Result<(PathBuf, u64)> {
        tokio::fs::create_dir_all(dest).await?;
        let path = dest.join(file_name);
        let bytes = self.fetcher.download(url, &path).await?;
        Ok((path, bytes))
    }
}
