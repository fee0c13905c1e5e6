//! Comment forest flattening and `comments.json`.
//!
//! [`flatten`] walks the forest breadth-first: every top-level comment comes
//! before any reply, and each level keeps the forest's reply order. For the
//! forest `[A(children: [B, C]), D]` the unbounded walk yields `A, D, B, C`
//! and a depth limit of `0` yields `A, D`.
//!
//! Collapsed "load more" placeholders that are still present when
//! flattening (expansion budget spent, or expansion not requested) are
//! skipped.

use serde::Serialize;
use std::collections::VecDeque;
use std::path::Path;

use super::json::write_pretty;
use crate::error::Result;
use crate::models::{Comment, CommentNode, Edited};

pub const COMMENTS_FILE: &str = "comments.json";

/// One comment as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub author: Option<String>,
    pub body: String,
    pub created_utc: i64,
    pub distinguished: Option<String>,
    pub downs: i64,
    pub edited: Edited,
    pub id: String,
    pub is_submitter: bool,
    pub link_id: String,
    pub parent_id: String,
    pub permalink: String,
    pub score: i64,
    pub stickied: bool,
    pub subreddit_name_prefixed: String,
    pub subreddit_id: String,
    pub total_awards_received: i64,
    pub ups: i64,
}

impl From<&Comment> for CommentRecord {
    fn from(c: &Comment) -> Self {
        Self {
            author: c.author_name().map(str::to_string),
            body: c.body.clone(),
            created_utc: c.created_utc as i64,
            distinguished: c.distinguished.clone(),
            downs: c.downs,
            edited: c.edited,
            id: c.id.clone(),
            is_submitter: c.is_submitter,
            link_id: c.link_id.clone(),
            parent_id: c.parent_id.clone(),
            permalink: c.permalink.clone(),
            score: c.score,
            stickied: c.stickied,
            subreddit_name_prefixed: c.subreddit_name_prefixed.clone(),
            subreddit_id: c.subreddit_id.clone(),
            total_awards_received: c.total_awards_received,
            ups: c.ups,
        }
    }
}

/// Breadth-first flatten of `forest`.
///
/// # Arguments
///
/// * `forest` - Top-level comment nodes; unexpanded placeholders are skipped
/// * `depth_limit` - `Some(d)` keeps comments at depth `0..=d` (top level is
///   depth 0); `None` keeps everything
///
/// # Returns
///
/// Records in breadth-first order: all top-level comments, then their
/// replies level by level.
pub fn flatten(forest: &[CommentNode], depth_limit: Option<usize>) -> Vec<CommentRecord> {
    let mut records = Vec::new();
    let mut queue: VecDeque<(usize, &CommentNode)> = forest.iter().map(|n| (0, n)).collect();

    while let Some((depth, node)) = queue.pop_front() {
        let CommentNode::Comment(comment) = node else {
            continue;
        };
        records.push(CommentRecord::from(comment.as_ref()));
        if depth_limit.is_none_or(|limit| depth < limit) {
            queue.extend(comment.replies.iter().map(|reply| (depth + 1, reply)));
        }
    }
    records
}

/// Write `<item_dir>/comments.json`.
pub async fn write_comments(records: &[CommentRecord], item_dir: &Path) -> Result<()> {
    write_pretty(records, &item_dir.join(COMMENTS_FILE)).await
}

/// Write a single comment record (user comment listings).
pub async fn write_comment(comment: &Comment, path: &Path) -> Result<()> {
    write_pretty(&CommentRecord::from(comment), path).await
}
