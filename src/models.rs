//! Data models for Reddit listing records and their optional payloads.
//!
//! This module defines the read-only records the archiver consumes:
//! - [`Submission`]: a post with its URL, metadata and optional media payloads
//! - [`Comment`]: a single comment, owning its direct replies
//! - [`CommentNode`]: either a loaded comment or a collapsed "load more" placeholder
//! - [`Entry`]: one item yielded by a listing (submission or comment)
//! - [`UserProfile`]: the public profile of a redditor
//!
//! Optional payloads (gallery, video, preview, embed, crosspost parents) are
//! modeled as `Option` fields so presence is checked explicitly instead of
//! probing attributes at runtime.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Author string Reddit reports for deleted or suspended accounts.
const DELETED_AUTHOR: &str = "[deleted]";

/// The `edited` field is either `false` or the epoch second of the last edit.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Edited {
    Flag(bool),
    At(f64),
}

impl Default for Edited {
    fn default() -> Self {
        Edited::Flag(false)
    }
}

/// A single posted item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Submission {
    pub id: String,
    /// Fullname (`t3_<id>`).
    pub name: String,
    pub url: Option<String>,
    pub title: String,
    pub author: Option<String>,
    pub selftext: String,
    pub selftext_html: Option<String>,
    pub created_utc: f64,
    pub distinguished: Option<String>,
    pub downs: i64,
    pub ups: i64,
    pub edited: Edited,
    pub link_flair_text: Option<String>,
    pub locked: bool,
    pub stickied: bool,
    pub spoiler: bool,
    pub is_self: bool,
    pub send_replies: bool,
    pub num_comments: i64,
    pub num_crossposts: i64,
    pub total_awards_received: i64,
    pub permalink: String,
    pub subreddit_name_prefixed: String,
    pub subreddit_id: String,
    pub subreddit_subscribers: Option<i64>,
    pub subreddit_type: String,
    pub upvote_ratio: f64,
    pub gallery_data: Option<GalleryData>,
    pub media_metadata: Option<HashMap<String, MediaMetadata>>,
    pub media: Option<Media>,
    pub crosspost_parent_list: Option<Vec<CrosspostParent>>,
    pub preview: Option<Preview>,
    pub media_embed: Option<MediaEmbed>,
}

impl Submission {
    /// Author name, or `None` when the account is deleted or suspended.
    pub fn author_name(&self) -> Option<&str> {
        author_name(self.author.as_deref())
    }

    /// The linked URL, empty for records without one.
    pub fn link(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }

    fn first_crosspost_parent(&self) -> Option<&CrosspostParent> {
        self.crosspost_parent_list.as_ref().and_then(|l| l.first())
    }

    /// Ordered gallery items, falling back to the first crosspost parent
    /// when the submission itself carries no gallery payload.
    pub fn gallery_items(&self) -> Option<Vec<GalleryItem>> {
        let own = resolve_gallery(self.gallery_data.as_ref(), self.media_metadata.as_ref());
        own.or_else(|| {
            self.first_crosspost_parent().and_then(|p| {
                resolve_gallery(p.gallery_data.as_ref(), p.media_metadata.as_ref())
            })
        })
    }

    /// Hosted-video descriptor, falling back to the first crosspost parent.
    pub fn reddit_video(&self) -> Option<&RedditVideo> {
        self.media
            .as_ref()
            .and_then(|m| m.reddit_video.as_ref())
            .or_else(|| {
                self.first_crosspost_parent()
                    .and_then(|p| p.media.as_ref())
                    .and_then(|m| m.reddit_video.as_ref())
            })
    }

    /// Fallback URL of the reddit-hosted preview video, if any.
    pub fn preview_video_url(&self) -> Option<&str> {
        self.preview
            .as_ref()
            .and_then(|p| p.reddit_video_preview.as_ref())
            .and_then(|v| v.fallback_url.as_deref())
    }

    /// Source URL of the first preview still image, if any.
    pub fn preview_image_url(&self) -> Option<&str> {
        self.preview
            .as_ref()
            .and_then(|p| p.images.first())
            .and_then(|i| i.source.as_ref())
            .map(|s| s.url.as_str())
    }

    /// Raw embed HTML when the submission carries an iframe embed.
    pub fn iframe_embed(&self) -> Option<&str> {
        self.media_embed
            .as_ref()
            .and_then(|e| e.content.as_deref())
            .filter(|c| c.contains("iframe"))
    }
}

fn author_name(author: Option<&str>) -> Option<&str> {
    author.filter(|a| !a.is_empty() && *a != DELETED_AUTHOR)
}

fn resolve_gallery(
    data: Option<&GalleryData>,
    metadata: Option<&HashMap<String, MediaMetadata>>,
) -> Option<Vec<GalleryItem>> {
    let (data, metadata) = (data?, metadata?);
    Some(
        data.items
            .iter()
            .map(|item| GalleryItem {
                media_id: item.media_id.clone(),
                mime_type: metadata.get(&item.media_id).and_then(|m| m.m.clone()),
                source_url: metadata
                    .get(&item.media_id)
                    .and_then(|m| m.s.as_ref())
                    .and_then(MediaSource::best_url)
                    .map(str::to_string),
            })
            .collect(),
    )
}

/// The subset of a crosspost parent used as a payload fallback.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrosspostParent {
    pub gallery_data: Option<GalleryData>,
    pub media_metadata: Option<HashMap<String, MediaMetadata>>,
    pub media: Option<Media>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GalleryData {
    pub items: Vec<GalleryDataItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GalleryDataItem {
    pub media_id: String,
}

/// Per-media entry of `media_metadata`; `m` is the MIME type, `s` the source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaMetadata {
    pub m: Option<String>,
    pub s: Option<MediaSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaSource {
    pub u: Option<String>,
    pub mp4: Option<String>,
    pub gif: Option<String>,
}

impl MediaSource {
    /// Still images carry `u`; animated items carry `mp4` and/or `gif`.
    pub fn best_url(&self) -> Option<&str> {
        self.u
            .as_deref()
            .or(self.mp4.as_deref())
            .or(self.gif.as_deref())
    }
}

/// One resolved gallery entry, in payload order.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryItem {
    pub media_id: String,
    pub mime_type: Option<String>,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Media {
    pub reddit_video: Option<RedditVideo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedditVideo {
    pub fallback_url: Option<String>,
    pub has_audio: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Preview {
    pub images: Vec<PreviewImage>,
    pub reddit_video_preview: Option<RedditVideo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PreviewImage {
    pub source: Option<PreviewSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PreviewSource {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaEmbed {
    pub content: Option<String>,
}

/// A comment together with the replies it owns.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Comment {
    pub id: String,
    pub name: String,
    pub parent_id: String,
    pub link_id: String,
    pub author: Option<String>,
    pub body: String,
    pub created_utc: f64,
    pub distinguished: Option<String>,
    pub downs: i64,
    pub ups: i64,
    pub score: i64,
    pub edited: Edited,
    pub is_submitter: bool,
    pub permalink: String,
    pub stickied: bool,
    pub subreddit_name_prefixed: String,
    pub subreddit_id: String,
    pub total_awards_received: i64,
    #[serde(deserialize_with = "deserialize_replies")]
    pub replies: Vec<CommentNode>,
}

impl Comment {
    /// Author name, or `None` when the account is deleted or suspended.
    pub fn author_name(&self) -> Option<&str> {
        author_name(self.author.as_deref())
    }
}

/// Collapsed "load more comments" placeholder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MoreComments {
    pub id: String,
    pub parent_id: String,
    pub count: i64,
    pub children: Vec<String>,
}

impl MoreComments {
    /// "Continue this thread" links carry no expandable children.
    pub fn is_expandable(&self) -> bool {
        self.children.iter().any(|c| c != "_")
    }
}

/// A node of the comment forest.
#[derive(Debug, Clone)]
pub enum CommentNode {
    Comment(Box<Comment>),
    More(MoreComments),
}

/// One record yielded by a listing.
#[derive(Debug, Clone)]
pub enum Entry {
    Submission(Box<Submission>),
    Comment(Box<Comment>),
}

/// Reddit's `{ "kind": ..., "data": ... }` envelope, decoded lazily so that
/// unknown kinds can be skipped instead of failing the whole page.
#[derive(Debug, Deserialize)]
pub struct Thing {
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Thing {
    /// The record's `id`, empty when the payload has none.
    pub fn id(&self) -> &str {
        self.data
            .get("id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
    }

    pub fn into_entry(self) -> serde_json::Result<Option<Entry>> {
        Ok(match self.kind.as_str() {
            "t3" => Some(Entry::Submission(Box::new(serde_json::from_value(self.data)?))),
            "t1" => Some(Entry::Comment(Box::new(serde_json::from_value(self.data)?))),
            _ => None,
        })
    }

    pub fn into_comment_node(self) -> serde_json::Result<Option<CommentNode>> {
        Ok(match self.kind.as_str() {
            "t1" => Some(CommentNode::Comment(Box::new(serde_json::from_value(self.data)?))),
            "more" => Some(CommentNode::More(serde_json::from_value(self.data)?)),
            _ => None,
        })
    }
}

/// A page of a listing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Listing {
    pub data: ListingData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListingData {
    pub after: Option<String>,
    pub children: Vec<Thing>,
}

impl Listing {
    /// Decode the entries of this page, skipping unknown kinds and dropping
    /// records that fail to decode.
    pub fn into_entries(self) -> Vec<Entry> {
        decode_each(self.data.children, Thing::into_entry)
    }

    /// Decode the comment nodes of this page, skipping kinds other than
    /// `t1` and `more` and dropping records that fail to decode.
    pub fn into_comment_nodes(self) -> Vec<CommentNode> {
        comment_nodes(self.data.children)
    }
}

/// Decode loose comment records, such as a `morechildren` batch.
pub fn comment_nodes(things: Vec<Thing>) -> Vec<CommentNode> {
    decode_each(things, Thing::into_comment_node)
}

/// One malformed record costs only itself.
fn decode_each<T>(
    things: Vec<Thing>,
    decode: impl Fn(Thing) -> serde_json::Result<Option<T>>,
) -> Vec<T> {
    let mut decoded = Vec::with_capacity(things.len());
    for thing in things {
        let kind = thing.kind.clone();
        let id = thing.id().to_string();
        match decode(thing) {
            Ok(Some(value)) => decoded.push(value),
            Ok(None) => {}
            Err(e) => warn!(%kind, %id, error = %e, "Dropping record that failed to decode"),
        }
    }
    decoded
}

/// `replies` is the empty string when a comment has none, a listing otherwise.
fn deserialize_replies<'de, D>(deserializer: D) -> Result<Vec<CommentNode>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(Vec::new());
    }
    let listing: Listing = serde_json::from_value(value).map_err(serde::de::Error::custom)?;
    Ok(listing.into_comment_nodes())
}

/// Public profile of a redditor, written verbatim to `user.json`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UserProfile {
    pub comment_karma: i64,
    #[serde(serialize_with = "serialize_epoch_seconds")]
    pub created_utc: f64,
    pub has_verified_email: Option<bool>,
    pub icon_img: Option<String>,
    pub id: Option<String>,
    pub is_employee: Option<bool>,
    pub is_friend: Option<bool>,
    pub is_mod: Option<bool>,
    pub is_gold: Option<bool>,
    pub is_suspended: Option<bool>,
    pub link_karma: i64,
    pub name: String,
}

fn serialize_epoch_seconds<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_i64(*value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deleted_author_maps_to_none() {
        let submission = Submission {
            author: Some("[deleted]".to_string()),
            ..Default::default()
        };
        assert_eq!(submission.author_name(), None);

        let submission = Submission {
            author: Some("spez".to_string()),
            ..Default::default()
        };
        assert_eq!(submission.author_name(), Some("spez"));
    }

    #[test]
    fn test_gallery_items_follow_payload_order() {
        let submission: Submission = serde_json::from_value(json!({
            "id": "abc",
            "gallery_data": { "items": [ { "media_id": "m2" }, { "media_id": "m1" } ] },
            "media_metadata": {
                "m1": { "m": "image/png", "s": { "u": "https://i.redd.it/m1.png" } },
                "m2": { "m": "image/jpg", "s": { "u": "https://i.redd.it/m2.jpg" } }
            }
        }))
        .unwrap();

        let items = submission.gallery_items().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].media_id, "m2");
        assert_eq!(items[0].mime_type.as_deref(), Some("image/jpg"));
        assert_eq!(items[1].source_url.as_deref(), Some("https://i.redd.it/m1.png"));
    }

    #[test]
    fn test_gallery_falls_back_to_crosspost_parent() {
        let submission: Submission = serde_json::from_value(json!({
            "id": "xpost",
            "crosspost_parent_list": [{
                "gallery_data": { "items": [ { "media_id": "p1" } ] },
                "media_metadata": {
                    "p1": { "m": "image/jpg", "s": { "u": "https://i.redd.it/p1.jpg" } }
                }
            }]
        }))
        .unwrap();

        let items = submission.gallery_items().unwrap();
        assert_eq!(items[0].media_id, "p1");
    }

    #[test]
    fn test_reddit_video_falls_back_to_crosspost_parent() {
        let submission: Submission = serde_json::from_value(json!({
            "id": "xpost",
            "media": null,
            "crosspost_parent_list": [{
                "media": { "reddit_video": { "fallback_url": "https://v.redd.it/abc/DASH_720.mp4" } }
            }]
        }))
        .unwrap();

        let video = submission.reddit_video().unwrap();
        assert_eq!(
            video.fallback_url.as_deref(),
            Some("https://v.redd.it/abc/DASH_720.mp4")
        );
    }

    #[test]
    fn test_comment_replies_empty_string_and_listing() {
        let comment: Comment = serde_json::from_value(json!({
            "id": "c1",
            "body": "top",
            "replies": {
                "kind": "Listing",
                "data": {
                    "children": [
                        { "kind": "t1", "data": { "id": "c2", "body": "reply", "replies": "" } },
                        { "kind": "more", "data": { "id": "m1", "parent_id": "t1_c1", "count": 3, "children": ["c3", "c4"] } }
                    ]
                }
            }
        }))
        .unwrap();

        assert_eq!(comment.replies.len(), 2);
        match &comment.replies[0] {
            CommentNode::Comment(c) => {
                assert_eq!(c.id, "c2");
                assert!(c.replies.is_empty());
            }
            other => panic!("expected comment, got {other:?}"),
        }
        match &comment.replies[1] {
            CommentNode::More(m) => assert_eq!(m.children, vec!["c3", "c4"]),
            other => panic!("expected more, got {other:?}"),
        }
    }

    #[test]
    fn test_listing_skips_unknown_kinds() {
        let listing: Listing = serde_json::from_value(json!({
            "kind": "Listing",
            "data": {
                "after": "t3_next",
                "children": [
                    { "kind": "t3", "data": { "id": "p1", "title": "hello", "url": "https://example.com" } },
                    { "kind": "t5", "data": { "display_name": "rust" } },
                    { "kind": "t1", "data": { "id": "c1", "body": "hi" } }
                ]
            }
        }))
        .unwrap();

        assert_eq!(listing.data.after.as_deref(), Some("t3_next"));
        let entries = listing.into_entries();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0], Entry::Submission(_)));
        assert!(matches!(entries[1], Entry::Comment(_)));
    }

    #[test]
    fn test_malformed_comment_is_dropped_and_siblings_survive() {
        let listing: Listing = serde_json::from_value(json!({
            "kind": "Listing",
            "data": {
                "children": [
                    { "kind": "t1", "data": { "id": "a", "body": "first" } },
                    { "kind": "t1", "data": { "id": "b", "body": null } },
                    { "kind": "t1", "data": { "id": "c", "body": "third" } }
                ]
            }
        }))
        .unwrap();

        let ids: Vec<String> = listing
            .into_comment_nodes()
            .into_iter()
            .map(|n| match n {
                CommentNode::Comment(c) => c.id,
                CommentNode::More(m) => m.id,
            })
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_malformed_nested_reply_keeps_parent() {
        let comment: Comment = serde_json::from_value(json!({
            "id": "c1",
            "body": "top",
            "replies": {
                "kind": "Listing",
                "data": {
                    "children": [
                        { "kind": "t1", "data": { "id": "bad", "score": "lots" } },
                        { "kind": "t1", "data": { "id": "good", "body": "ok" } }
                    ]
                }
            }
        }))
        .unwrap();

        assert_eq!(comment.body, "top");
        assert_eq!(comment.replies.len(), 1);
        assert!(matches!(&comment.replies[0], CommentNode::Comment(c) if c.id == "good"));
    }

    #[test]
    fn test_malformed_submission_is_dropped_from_page() {
        let listing: Listing = serde_json::from_value(json!({
            "kind": "Listing",
            "data": {
                "children": [
                    { "kind": "t3", "data": { "id": "p1", "title": "ok" } },
                    { "kind": "t3", "data": { "id": "p2", "title": ["not", "text"] } },
                    { "kind": "t3", "data": { "id": "p3", "title": "also ok" } }
                ]
            }
        }))
        .unwrap();

        let ids: Vec<String> = listing
            .into_entries()
            .into_iter()
            .map(|e| match e {
                Entry::Submission(s) => s.id,
                Entry::Comment(c) => c.id,
            })
            .collect();
        assert_eq!(ids, vec!["p1", "p3"]);
    }

    #[test]
    fn test_continue_thread_placeholder_is_not_expandable() {
        let more = MoreComments {
            id: "_".to_string(),
            parent_id: "t1_abc".to_string(),
            count: 0,
            children: vec!["_".to_string()],
        };
        assert!(!more.is_expandable());
    }

    #[test]
    fn test_iframe_embed_requires_iframe_markup() {
        let submission = Submission {
            media_embed: Some(MediaEmbed {
                content: Some("&lt;iframe src=\"https://gfycat.com/ifr/x\"&gt;".to_string()),
            }),
            ..Default::default()
        };
        assert!(submission.iframe_embed().is_some());

        let submission = Submission {
            media_embed: Some(MediaEmbed { content: None }),
            ..Default::default()
        };
        assert!(submission.iframe_embed().is_none());
    }
}
