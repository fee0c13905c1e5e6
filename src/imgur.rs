//! Album-host (Imgur v3) API client.
//!
//! Three read-only endpoints, all authenticated with a static
//! `Authorization: Client-ID <id>` header:
//! - `/3/album/<id>`: album descriptor, used for the image count
//! - `/3/album/<id>/images`: the album's images in display order
//! - `/3/image/<id>`: canonical link and MIME type of a single image

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{Error, Result};
use crate::http::Fetcher;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AlbumInfo {
    images_count: u64,
}

/// One image of an album.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlbumImage {
    pub link: String,
}

/// Metadata of a single hosted image or video.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImageMeta {
    pub link: String,
    /// MIME type, e.g. `image/png` or `video/mp4`.
    #[serde(rename = "type")]
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct ImgurClient {
    fetcher: Fetcher,
    base_url: Url,
    headers: HeaderMap,
}

impl ImgurClient {
    pub fn new(fetcher: Fetcher, base_url: &str, client_id: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Client-ID {client_id}"))
            .map_err(|e| Error::Config(format!("invalid imgur client id: {e}")))?;
        headers.insert(AUTHORIZATION, value);
        Ok(Self {
            fetcher,
            base_url: Url::parse(base_url)?,
            headers,
        })
    }

    fn endpoint(&self, path: &str) -> Result<String> {
        Ok(self.base_url.join(path)?.to_string())
    }

    /// Number of images in an album.
    ///
    /// # Returns
    ///
    /// `Ok(0)` when the host answers with a non-success status (deleted or
    /// private albums); transport and decoding failures are returned as errors.
    #[instrument(level = "debug", skip(self))]
    pub async fn album_image_count(&self, album_id: &str) -> Result<u64> {
        let url = self.endpoint(&format!("/3/album/{album_id}"))?;
        match self
            .fetcher
            .get_json::<Envelope<AlbumInfo>>(&url, &self.headers)
            .await
        {
            Ok(envelope) => Ok(envelope.data.images_count),
            Err(Error::Http { status, .. }) => {
                debug!(status, "Album lookup refused; treating as empty");
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    /// Images of an album in display order.
    #[instrument(level = "debug", skip(self))]
    pub async fn album_images(&self, album_id: &str) -> Result<Vec<AlbumImage>> {
        let url = self.endpoint(&format!("/3/album/{album_id}/images"))?;
        let envelope: Envelope<Vec<AlbumImage>> = self.fetcher.get_json(&url, &self.headers).await?;
        Ok(envelope.data)
    }

    /// Canonical link and MIME type of a single image.
    #[instrument(level = "debug", skip(self))]
    pub async fn image_meta(&self, image_id: &str) -> Result<ImageMeta> {
        let url = self.endpoint(&format!("/3/image/{image_id}"))?;
        let envelope: Envelope<ImageMeta> = self.fetcher.get_json(&url, &self.headers).await?;
        Ok(envelope.data)
    }
}

/// Album id from an album URL (`imgur.com/a/<id>` or `imgur.com/gallery/<id>`).
pub fn album_id(url: &str) -> Option<&str> {
    let rest = ["imgur.com/a/", "imgur.com/gallery/"]
        .iter()
        .find_map(|marker| url.split_once(marker).map(|(_, rest)| rest))?;
    let id = rest.split(['/', '?', '#']).next().unwrap_or_default();
    (!id.is_empty()).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::test_fetcher;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> ImgurClient {
        ImgurClient::new(test_fetcher(), &server.uri(), "abc123").unwrap()
    }

    #[test]
    fn test_album_id() {
        assert_eq!(album_id("https://imgur.com/a/AbCdE"), Some("AbCdE"));
        assert_eq!(album_id("https://imgur.com/gallery/XyZ/"), Some("XyZ"));
        assert_eq!(album_id("https://imgur.com/a/q1?x=1"), Some("q1"));
        assert_eq!(album_id("https://imgur.com/a/"), None);
        assert_eq!(album_id("https://imgur.com/AbCdE"), None);
    }

    #[tokio::test]
    async fn test_album_count_sends_client_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/album/AbCdE"))
            .and(header("authorization", "Client-ID abc123"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "images_count": 4 } })),
            )
            .mount(&server)
            .await;

        assert_eq!(client(&server).await.album_image_count("AbCdE").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_album_count_non_200_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert_eq!(client(&server).await.album_image_count("gone").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_album_count_unreachable_host_is_error() {
        let client = ImgurClient::new(test_fetcher(), "http://127.0.0.1:9", "abc123").unwrap();
        let result = client.album_image_count("AbCdE").await;
        assert!(matches!(result, Err(Error::Network(_))), "{result:?}");
    }

    #[tokio::test]
    async fn test_album_count_malformed_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let result = client(&server).await.album_image_count("AbCdE").await;
        assert!(matches!(result, Err(Error::Json(_))), "{result:?}");
    }

    #[tokio::test]
    async fn test_image_meta() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/image/xyz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "id": "xyz", "link": "https://i.imgur.com/xyz.mp4", "type": "video/mp4" }
            })))
            .mount(&server)
            .await;

        let meta = client(&server).await.image_meta("xyz").await.unwrap();
        assert_eq!(meta.link, "https://i.imgur.com/xyz.mp4");
        assert_eq!(meta.mime_type, "video/mp4");
    }
}
