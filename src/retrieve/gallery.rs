//! Reddit-hosted galleries.
//!
//! Items come from `gallery_data` (order) and `media_metadata` (MIME type and
//! source URL), falling back to the first crosspost parent. Each item is
//! saved as `<media_id>.<subtype>`; a failing item is logged and counted,
//! and the remaining items are still fetched.

use std::path::Path;
use tracing::{debug, warn};

use super::{Retrieved, Retriever};
use crate::error::{Error, Result};
use crate::models::Submission;
use crate::utils::{mime_subtype, truncate_for_log};

impl Retriever {
    pub(super) async fn retrieve_gallery(
        &self,
        submission: &Submission,
        dest: &Path,
        skip_videos: bool,
    ) -> Result<Retrieved> {
        let items = submission
            .gallery_items()
            .ok_or_else(|| Error::MissingPayload("gallery_data/media_metadata".to_string()))?;
        debug!(count = items.len(), "Gallery resolved");

        let mut retrieved = Retrieved::default();
        for (position, item) in items.iter().enumerate() {
            let mime = item.mime_type.as_deref().unwrap_or_default();
            let is_video = mime.starts_with("video/");
            if !is_video && !mime.starts_with("image/") {
                debug!(position, media_id = %item.media_id, mime, "Skipping gallery item of unknown type");
                continue;
            }
            if is_video && skip_videos {
                debug!(position, media_id = %item.media_id, "Skipping gallery video");
                continue;
            }

            let fetched = match (mime_subtype(mime), item.source_url.as_deref()) {
                (Some(ext), Some(url)) => {
                    let file_name = format!("{}.{ext}", item.media_id);
                    self.download_into(url, dest, &file_name).await
                }
                _ => Err(Error::MissingPayload(format!(
                    "source of gallery item {}",
                    item.media_id
                ))),
            };
            match fetched {
                Ok((path, bytes)) => retrieved.record(path, bytes),
                Err(e) => {
                    warn!(
                        position,
                        media_id = %item.media_id,
                        error = %truncate_for_log(&e.to_string(), 300),
                        "Gallery item failed"
                    );
                    retrieved.failed_items += 1;
                }
            }
        }
        Ok(retrieved)
    }
}
