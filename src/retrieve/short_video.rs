//! Short-video hosts (gfycat, redgifs).
//!
//! Sources are tried from cheapest to most expensive; the first that yields
//! a file wins:
//!
//! 1. the reddit-hosted preview video (`preview.reddit_video_preview`)
//! 2. the page the submission URL redirects to, when it lands on an
//!    alternate host, scraped for `.mp4` `src` attributes
//! 3. the iframe of `media_embed`, whose target page is scraped the same way
//! 4. the preview still image, typed from the response `Content-Type`
//!
//! Scraped candidates prefer the `giant.` (full quality) naming over the
//! `thumbs.` (thumbnail) naming.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::path::Path;
use tracing::{debug, instrument};

use super::{Retrieved, Retriever};
use crate::error::{Error, Result};
use crate::models::Submission;
use crate::utils::{mime_subtype, strip_extension, url_leaf};

/// Hosts a gif-host link may redirect to, whose pages embed the real media.
const ALTERNATE_HOSTS: &[&str] = &["gifdeliverynetwork.com", "redgifs.com/"];

static SRC: Lazy<Selector> = Lazy::new(|| Selector::parse("[src]").expect("static selector"));
static IFRAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("iframe[src]").expect("static selector"));

/// Best `.mp4` source in an HTML page: `giant.` over `thumbs.` over any.
fn pick_video_source(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let candidates: Vec<&str> = document
        .select(&SRC)
        .filter_map(|e| e.value().attr("src"))
        .filter(|src| src.contains(".mp4"))
        .collect();
    candidates
        .iter()
        .find(|src| src.contains("giant."))
        .or_else(|| candidates.iter().find(|src| src.contains("thumbs.")))
        .or_else(|| candidates.first())
        .map(|src| src.to_string())
}

/// `src` of the first iframe in an embed snippet.
fn iframe_target(embed_html: &str) -> Option<String> {
    let fragment = Html::parse_fragment(embed_html);
    fragment
        .select(&IFRAME)
        .find_map(|e| e.value().attr("src"))
        .map(str::to_string)
}

/// Extension of a URL's leaf, if it has one.
fn leaf_extension(url: &str) -> Option<String> {
    let leaf = url_leaf(url);
    leaf.rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .filter(|ext| !ext.is_empty())
}

impl Retriever {
    #[instrument(level = "debug", skip_all, fields(url = %submission.link()))]
    pub(super) async fn retrieve_short_video(
        &self,
        submission: &Submission,
        dest: &Path,
    ) -> Result<Retrieved> {
        let url = submission.link();
        let stem = url_leaf(url);
        let stem = strip_extension(&stem);
        if stem.is_empty() {
            return Err(Error::MissingPayload(format!("no name in {url}")));
        }

        if let Some(preview) = submission.preview_video_url() {
            let ext = leaf_extension(preview).unwrap_or_else(|| "mp4".to_string());
            match self.download_into(preview, dest, &format!("{stem}.{ext}")).await {
                Ok((path, bytes)) => return Ok(single(path, bytes)),
                Err(e) => debug!(error = %e, "Preview video failed; trying scrape"),
            }
        }

        match self.fetcher.get_text(url).await {
            Ok((final_url, body)) if ALTERNATE_HOSTS.iter().any(|h| final_url.contains(h)) => {
                if let Some(found) = self.fetch_scraped(&body, dest).await {
                    return Ok(found);
                }
            }
            Ok((final_url, _)) => debug!(%final_url, "Link does not redirect to an alternate host"),
            Err(e) => debug!(error = %e, "Link could not be fetched"),
        }

        if let Some(target) = submission.iframe_embed().and_then(iframe_target) {
            match self.fetcher.get_text(&target).await {
                Ok((_, body)) => {
                    if let Some(found) = self.fetch_scraped(&body, dest).await {
                        return Ok(found);
                    }
                }
                Err(e) => debug!(%target, error = %e, "Embed target could not be fetched"),
            }
        }

        if let Some(image) = submission.preview_image_url() {
            let content_type = self.fetcher.content_type(image).await?;
            let ext = content_type
                .as_deref()
                .and_then(mime_subtype)
                .map(str::to_string)
                .or_else(|| leaf_extension(image))
                .unwrap_or_else(|| "jpg".to_string());
            let (path, bytes) = self.download_into(image, dest, &format!("{stem}.{ext}")).await?;
            return Ok(single(path, bytes));
        }

        Err(Error::NoVideoSource(url.to_string()))
    }

    /// Download the best video source scraped from `body`, if any.
    async fn fetch_scraped(&self, body: &str, dest: &Path) -> Option<Retrieved> {
        let source = pick_video_source(body)?;
        let name = url_leaf(&source);
        match self.download_into(&source, dest, &name).await {
            Ok((path, bytes)) => Some(single(path, bytes)),
            Err(e) => {
                debug!(%source, error = %e, "Scraped source failed");
                None
            }
        }
    }
}

fn single(path: std::path::PathBuf, bytes: u64) -> Retrieved {
    let mut retrieved = Retrieved::default();
    retrieved.record(path, bytes);
    retrieved
}
