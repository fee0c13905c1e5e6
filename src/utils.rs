//! Utility functions for naming, string manipulation, and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - Directory and file naming for archived items
//! - String truncation for logging
//! - URL leaf and MIME subtype extraction
//! - File system validation for the output root

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;

/// Maximum number of title characters kept in an item directory name.
pub const MAX_TITLE_CHARS: usize = 32;

/// Width of the zero-padded sequence index.
pub const INDEX_WIDTH: usize = 3;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("static regex"));

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (backing off to a char
/// boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
    }
}

/// Replace every run of non-word characters with a single underscore and
/// cap the result at `max_chars` characters, marking the cut with `...`.
pub fn sanitize_name(text: &str, max_chars: usize) -> String {
    let cleaned = NON_WORD.replace_all(text, "_");
    if cleaned.chars().count() > max_chars {
        let mut truncated: String = cleaned.chars().take(max_chars).collect();
        truncated.push_str("...");
        truncated
    } else {
        cleaned.into_owned()
    }
}

/// Zero-padded sequence index (`7` -> `"007"`).
pub fn padded_index(index: usize) -> String {
    format!("{:0width$}", index, width = INDEX_WIDTH)
}

/// Directory name of an archived item: `<index>_<sanitized-title>`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(item_dir_name(3, "Hello, World!"), "003_Hello_World_");
/// ```
pub fn item_dir_name(index: usize, title: &str) -> String {
    format!("{}_{}", padded_index(index), sanitize_name(title, MAX_TITLE_CHARS))
}

/// Final path segment of a URL, query and fragment excluded.
///
/// Falls back to splitting the raw string when it does not parse as a URL.
pub fn url_leaf(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .unwrap_or_default()
            .to_string(),
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Strip the extension from a URL leaf (`abc.gifv` -> `abc`).
pub fn strip_extension(leaf: &str) -> &str {
    leaf.split('.').next().unwrap_or(leaf)
}

/// Subtype of a MIME type (`image/png` -> `png`, `video/mp4; codecs=..` -> `mp4`).
pub fn mime_subtype(mime: &str) -> Option<&str> {
    let (_, subtype) = mime.split_once('/')?;
    let subtype = subtype.split(';').next().unwrap_or_default().trim();
    (!subtype.is_empty()).then_some(subtype)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a scratch file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    // Try a small sync write using std fs (simpler error surface)
    let check_path = path.join("..__write_check__");
    stdfs::File::create(&check_path)?;
    let _ = stdfs::remove_file(&check_path);
    info!("Output directory is writable");
    Ok(())
}

/// Sibling of `dest` named `<file>.part`, where in-progress writes land.
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
