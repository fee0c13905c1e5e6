//! `submission.json`: the fixed metadata record of a submission.

use serde::Serialize;
use std::path::Path;

use super::json::write_pretty;
use crate::error::Result;
use crate::models::{Edited, Submission};

pub const SUBMISSION_FILE: &str = "submission.json";

/// Metadata written for every archived submission. Field order is the
/// on-disk order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRecord {
    /// `None` for deleted or suspended accounts.
    pub author: Option<String>,
    pub created_utc: i64,
    pub distinguished: Option<String>,
    pub downs: i64,
    pub edited: Edited,
    pub id: String,
    pub link_flair_text: Option<String>,
    pub locked: bool,
    pub num_comments: i64,
    pub num_crossposts: i64,
    pub permalink: String,
    pub selftext: String,
    pub selftext_html: Option<String>,
    pub send_replies: bool,
    pub spoiler: bool,
    pub stickied: bool,
    pub subreddit_name_prefixed: String,
    pub subreddit_id: String,
    pub subreddit_subscribers: Option<i64>,
    pub subreddit_type: String,
    pub title: String,
    pub total_awards_received: i64,
    pub ups: i64,
    pub upvote_ratio: f64,
    pub url: Option<String>,
}

impl From<&Submission> for SubmissionRecord {
    fn from(s: &Submission) -> Self {
        Self {
            author: s.author_name().map(str::to_string),
            created_utc: s.created_utc as i64,
            distinguished: s.distinguished.clone(),
            downs: s.downs,
            edited: s.edited,
            id: s.id.clone(),
            link_flair_text: s.link_flair_text.clone(),
            locked: s.locked,
            num_comments: s.num_comments,
            num_crossposts: s.num_crossposts,
            permalink: s.permalink.clone(),
            selftext: s.selftext.clone(),
            selftext_html: s.selftext_html.clone(),
            send_replies: s.send_replies,
            spoiler: s.spoiler,
            stickied: s.stickied,
            subreddit_name_prefixed: s.subreddit_name_prefixed.clone(),
            subreddit_id: s.subreddit_id.clone(),
            subreddit_subscribers: s.subreddit_subscribers,
            subreddit_type: s.subreddit_type.clone(),
            title: s.title.clone(),
            total_awards_received: s.total_awards_received,
            ups: s.ups,
            upvote_ratio: s.upvote_ratio,
            url: s.url.clone(),
        }
    }
}

/// Serialize a submission into its metadata record.
pub fn serialize(submission: &Submission) -> SubmissionRecord {
    SubmissionRecord::from(submission)
}

/// Write `<item_dir>/submission.json`.
pub async fn write_submission(submission: &Submission, item_dir: &Path) -> Result<()> {
    write_pretty(&serialize(submission), &item_dir.join(SUBMISSION_FILE)).await
}
