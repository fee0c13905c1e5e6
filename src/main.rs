//! # Reddit Archiver
//!
//! Archives Reddit listings into a local directory tree: each submission's
//! linked media, its metadata record and a flattened copy of its comments.
//!
//! ## Features
//!
//! - Subreddit, multireddit, search and user scopes
//! - Direct media, galleries, hosted videos (muxed with `ffmpeg`), short-video
//!   hosts, Imgur albums and anything `yt-dlp` understands
//! - Breadth-first comment flattening, top level only or whole threads
//! - Per-item failure isolation: a broken link never stops a listing
//!
//! ## Usage
//!
//! ```sh
//! reddit_archiver subreddit pics -f hot,top -l 25 -o ./archive
//! ```
//!
//! ## Architecture
//!
//! 1. **Walking**: page through each listing ([`walker`], [`reddit`])
//! 2. **Classifying**: decide how each link is fetched ([`classify`])
//! 3. **Retrieving**: run the matching strategy ([`retrieve`])
//! 4. **Recording**: write `submission.json` and `comments.json` ([`outputs`])

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod classify;
mod cli;
mod config;
mod error;
mod external;
mod http;
mod imgur;
mod models;
mod outputs;
mod pipeline;
mod reddit;
mod retrieve;
mod utils;
mod walker;

use cli::Cli;
use config::AppConfig;
use external::{Ffmpeg, Muxer, VideoExtractor, YtDlp};
use http::Fetcher;
use imgur::ImgurClient;
use pipeline::{ItemPipeline, PipelineOptions};
use reddit::{ListingProvider, RedditClient};
use retrieve::Retriever;
use utils::ensure_writable_dir;
use walker::{ListingSummary, Walker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // --- Tracing init ---
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("reddit_archiver starting up");
    debug!(?args, "Parsed CLI arguments");

    // ---- Configuration ----
    let config_path = match args.config.clone() {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let config = match AppConfig::load(&config_path)
        .await
        .map(|c| c.with_imgur_client_id(args.imgur_client_id.clone()))
        .and_then(|c| c.validate().map(|()| c))
    {
        Ok(config) => config,
        Err(e) => {
            error!(path = %config_path.display(), error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    let common = args.command.common();

    // Early check: ensure the output root is writable
    if let Err(e) = ensure_writable_dir(&common.output).await {
        error!(
            path = %common.output.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    // ---- Collaborators ----
    let fetcher = Fetcher::new(&config.http, &config.user_agent)?;
    let reddit: Arc<dyn ListingProvider> =
        Arc::new(RedditClient::new(fetcher.clone(), &config.reddit_base_url)?);
    let imgur = ImgurClient::new(
        fetcher.clone(),
        &config.imgur_base_url,
        &config.imgur_client_id,
    )?;

    let extractor: Option<Arc<dyn VideoExtractor>> = if common.skip_videos {
        None
    } else {
        match YtDlp::from_path() {
            Some(yt_dlp) => Some(Arc::new(yt_dlp)),
            None => {
                warn!("yt-dlp not found on PATH; links it would handle are skipped");
                None
            }
        }
    };
    let muxer: Option<Arc<dyn Muxer>> = match Ffmpeg::from_path() {
        Some(ffmpeg) => Some(Arc::new(ffmpeg)),
        None => {
            warn!("ffmpeg not found on PATH; hosted videos keep separate audio and video tracks");
            None
        }
    };

    let options = PipelineOptions {
        skip_videos: common.skip_videos,
        skip_meta: common.skip_meta,
        skip_comments: common.skip_comments,
        comment_depth: if common.all_comments { None } else { Some(0) },
        video_extraction: extractor.is_some(),
        more_comments_budget: config.more_comments_budget,
    };
    info!(?options, concurrency = config.concurrency, "Pipeline configured");

    let retriever = Retriever::new(fetcher, imgur, extractor, muxer);
    let pipeline = ItemPipeline::new(Arc::clone(&reddit), retriever, options);
    let walker = Walker::new(reddit, pipeline, &common.output, config.concurrency);
    info!(root = %walker.site_root().display(), "Archiving");

    // ---- Walk ----
    let mut summaries: Vec<ListingSummary> = Vec::new();
    for target in args.command.targets() {
        let batch = match &target.user {
            Some(name) => walker.walk_user(name, &target.requests).await,
            None => walker.walk(&target.requests).await,
        };
        summaries.extend(batch);
    }

    let processed: usize = summaries.iter().map(|s| s.processed).sum();
    let failed: usize = summaries.iter().map(|s| s.failed).sum();
    let aborted = summaries.iter().filter(|s| s.aborted.is_some()).count();
    if aborted > 0 {
        warn!(aborted, "Some listings were abandoned early");
    }

    let elapsed = start_time.elapsed();
    info!(
        listings = summaries.len(),
        processed,
        failed,
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
