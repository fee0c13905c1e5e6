//! URL classification.
//!
//! [`classify`] maps a submission's URL and payload presence to exactly one
//! [`Category`]. Rules are evaluated in order and the first match wins; the
//! order matters because categories overlap (an Imgur album URL also
//! contains `imgur.com`, an `i.imgur.com/x.jpg` link is also direct media).
//!
//! | # | Rule | Category |
//! |---|------|----------|
//! | 1 | leaf ends in png/jpg/jpeg/gif/mp4, not `.gifv` | [`Category::DirectMedia`] |
//! | 2 | `reddit.com/gallery` | [`Category::RedditGallery`] |
//! | 3 | `v.redd.it` | [`Category::RedditVideo`] |
//! | 4 | `gfycat.com/`, `redgifs.com/` | [`Category::ShortVideoHost`] |
//! | 5 | `imgur.com/a/`, `imgur.com/gallery/` | [`Category::AlbumHost`] |
//! | 6 | `imgur.com` | [`Category::SingleHostedImage`] |
//! | 7 | self-post flag | [`Category::SelfText`] |
//! | 8 | video mode and `youtube.com`/`youtu.be` | [`Category::ShortVideoHost`] (extractor) |
//! | 9 | anything else | [`Category::GenericLink`] |
//!
//! Classification never touches the network. The extractor lookup that can
//! promote a generic link to an extractor video lives in [`refine_with_extractor`]
//! and is driven by the item pipeline.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::models::Submission;
use crate::utils::url_leaf;

/// Kind of a direct media link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// How a short video is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSource {
    /// gfycat/redgifs: preview, redirect scrape, embed scrape.
    GifHost,
    /// Delegated to the external video extractor.
    Extractor,
}

/// Content category of a submission's link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    DirectMedia(MediaKind),
    RedditGallery,
    RedditVideo,
    ShortVideoHost(VideoSource),
    AlbumHost,
    SingleHostedImage,
    SelfText,
    GenericLink,
}

impl Category {
    /// Stable tag used in logs and reports.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Category::DirectMedia(_) => "direct-media",
            Category::RedditGallery => "reddit-gallery",
            Category::RedditVideo => "reddit-video",
            Category::ShortVideoHost(_) => "short-video-host",
            Category::AlbumHost => "album-host",
            Category::SingleHostedImage => "single-hosted-image",
            Category::SelfText => "self-text",
            Category::GenericLink => "generic-link",
        }
    }

    /// Whether retrieval of this category produces video content.
    pub const fn is_video(&self) -> bool {
        matches!(
            self,
            Category::DirectMedia(MediaKind::Video)
                | Category::RedditVideo
                | Category::ShortVideoHost(_)
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyOptions {
    /// Enables rule 8 (known video-sharing domains go to the extractor).
    pub video_extraction: bool,
}

/// Everything a rule may look at.
struct Subject<'a> {
    url: &'a str,
    leaf: String,
    submission: &'a Submission,
    options: ClassifyOptions,
}

type Rule = (fn(&Subject<'_>) -> bool, Category);

static IMAGE_LEAF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(png|jpe?g|gif)$").expect("static regex"));
static VIDEO_LEAF: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.mp4$").expect("static regex"));
static GALLERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)reddit\.com/gallery").expect("static regex"));
static REDDIT_VIDEO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)v\.redd\.it").expect("static regex"));
static GIF_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(gfycat|redgifs)\.com/").expect("static regex"));
static ALBUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)imgur\.com/(a|gallery)/").expect("static regex"));
static IMGUR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)imgur\.com").expect("static regex"));
static VIDEO_SITE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(youtube\.com|youtu\.be)").expect("static regex"));

fn is_gifv(s: &Subject<'_>) -> bool {
    s.leaf.to_ascii_lowercase().ends_with(".gifv")
}

/// Ordered rule table; first match wins.
const RULES: &[Rule] = &[
    (|s| !is_gifv(s) && IMAGE_LEAF.is_match(&s.leaf), Category::DirectMedia(MediaKind::Image)),
    (|s| !is_gifv(s) && VIDEO_LEAF.is_match(&s.leaf), Category::DirectMedia(MediaKind::Video)),
    (|s| GALLERY.is_match(s.url), Category::RedditGallery),
    (|s| REDDIT_VIDEO.is_match(s.url), Category::RedditVideo),
    (|s| GIF_HOST.is_match(s.url), Category::ShortVideoHost(VideoSource::GifHost)),
    (|s| ALBUM.is_match(s.url), Category::AlbumHost),
    (|s| IMGUR.is_match(s.url), Category::SingleHostedImage),
    (|s| s.submission.is_self, Category::SelfText),
    (
        |s| s.options.video_extraction && VIDEO_SITE.is_match(s.url),
        Category::ShortVideoHost(VideoSource::Extractor),
    ),
];

/// Classify a submission's link. Total: always returns a category.
pub fn classify(url: &str, submission: &Submission, options: ClassifyOptions) -> Category {
    let subject = Subject {
        url,
        leaf: url_leaf(url),
        submission,
        options,
    };
    RULES
        .iter()
        .find(|(matches, _)| matches(&subject))
        .map(|(_, category)| *category)
        .unwrap_or(Category::GenericLink)
}

/// URLs never handed to the extractor lookup.
pub fn extractor_eligible(url: &str) -> bool {
    !url.is_empty() && !url.contains("flickr.com/photos")
}

/// Promote a generic link to an extractor video when the extractor reported a
/// non-generic extractor match.
pub fn refine_with_extractor(category: Category, extractor_supported: bool) -> Category {
    match category {
        Category::GenericLink if extractor_supported => Category::ShortVideoHost(VideoSource::Extractor),
        other => other,
    }
}
