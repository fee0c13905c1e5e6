//! Pretty-printed JSON writer shared by every record file.
//!
//! Records are serialized in memory, written to `<file>.part` and renamed
//! into place, so a file under its final name is always complete.

use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tracing::{debug, error, instrument};

use crate::error::Result;
use crate::utils::part_path;

/// Serialize `value` as pretty-printed JSON into `path`, creating the
/// parent directory when needed.
///
/// # Arguments
///
/// * `value` - The record (or slice of records) to serialize
/// * `path` - Final location of the file; an existing file is replaced
///
/// # Returns
///
/// `Ok(())` once the file is in place, or an error if serialization,
/// directory creation, writing or the final rename fails. On error no
/// `.part` file is left behind.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn write_pretty<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }

    let bytes = json.len();
    let part = part_path(path);
    let written = match fs::write(&part, json).await {
        Ok(()) => fs::rename(&part, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        let _ = fs::remove_file(&part).await;
        return Err(e.into());
    }
    debug!(bytes, "Wrote JSON file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_pretty_creates_parent() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("a").join("b.json");
        write_pretty(&json!({ "k": [1, 2] }), &path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains('\n'));
        let back: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back["k"][1], 2);
    }

    #[tokio::test]
    async fn test_write_pretty_replaces_file_and_leaves_no_part() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("submission.json");
        write_pretty(&json!({ "v": 1 }), &path).await.unwrap();
        write_pretty(&json!({ "v": 2 }), &path).await.unwrap();

        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back["v"], 2);
        assert!(!temp.path().join("submission.json.part").exists());
        let names: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn test_write_pretty_into_directory_fails_cleanly() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("taken");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("inner"), b"x").unwrap();

        assert!(write_pretty(&json!([]), &path).await.is_err());
        assert!(!temp.path().join("taken.part").exists());
    }
}
