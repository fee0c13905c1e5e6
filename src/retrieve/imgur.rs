//! Album-host albums and single hosted images.

use std::path::Path;
use tracing::{debug, warn};

use super::{Retrieved, Retriever};
use crate::error::{Error, Result};
use crate::imgur::album_id;
use crate::utils::{mime_subtype, padded_index, strip_extension, truncate_for_log, url_leaf};

impl Retriever {
    /// Each image is saved as `<index>_<link leaf>`. An album the host
    /// refuses or reports as holding no images is empty, not failed; an
    /// unreachable host fails the retrieval.
    pub(super) async fn retrieve_album(&self, url: &str, dest: &Path) -> Result<Retrieved> {
        let id = album_id(url).ok_or_else(|| Error::MissingPayload(format!("no album id in {url}")))?;
        let mut retrieved = Retrieved::default();

        let count = self.imgur.album_image_count(id).await?;
        if count == 0 {
            debug!(album = id, "Album is empty");
            return Ok(retrieved);
        }

        let images = self.imgur.album_images(id).await?;
        debug!(album = id, count, listed = images.len(), "Album resolved");
        for (i, image) in images.iter().enumerate() {
            let file_name = format!("{}_{}", padded_index(i), url_leaf(&image.link));
            match self.download_into(&image.link, dest, &file_name).await {
                Ok((path, bytes)) => retrieved.record(path, bytes),
                Err(e) => {
                    warn!(
                        position = i,
                        link = %image.link,
                        error = %truncate_for_log(&e.to_string(), 300),
                        "Album image failed"
                    );
                    retrieved.failed_items += 1;
                }
            }
        }
        Ok(retrieved)
    }

    /// Saved as `<image id>.<subtype>` from the canonical link.
    pub(super) async fn retrieve_single_image(&self, url: &str, dest: &Path) -> Result<Retrieved> {
        let leaf = url_leaf(url);
        let id = strip_extension(&leaf);
        if id.is_empty() {
            return Err(Error::MissingPayload(format!("no image id in {url}")));
        }

        let meta = self.imgur.image_meta(id).await?;
        if meta.link.is_empty() {
            return Err(Error::MissingPayload(format!("no link for image {id}")));
        }
        let ext = mime_subtype(&meta.mime_type)
            .map(str::to_string)
            .or_else(|| url_leaf(&meta.link).rsplit_once('.').map(|(_, e)| e.to_string()))
            .unwrap_or_else(|| "jpg".to_string());

        let (path, bytes) = self.download_into(&meta.link, dest, &format!("{id}.{ext}")).await?;
        let mut retrieved = Retrieved::default();
        retrieved.record(path, bytes);
        Ok(retrieved)
    }
}
