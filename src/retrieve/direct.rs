//! Direct media links: one GET, saved under the URL's leaf name.

use std::path::Path;

use super::{Retrieved, Retriever};
use crate::error::{Error, Result};
use crate::utils::url_leaf;

impl Retriever {
    pub(super) async fn retrieve_direct(&self, url: &str, dest: &Path) -> Result<Retrieved> {
        let leaf = url_leaf(url);
        if leaf.is_empty() {
            return Err(Error::MissingPayload(format!("no file name in {url}")));
        }
        let (path, bytes) = self.download_into(url, dest, &leaf).await?;
        let mut retrieved = Retrieved::default();
        retrieved.record(path, bytes);
        Ok(retrieved)
    }
}

#[cfg(test)]
mod tests {
    use crate::classify::{Category, MediaKind};
    use crate::config::HttpSettings;
    use crate::error::Error;
    use crate::http::Fetcher;
    use crate::imgur::ImgurClient;
    use crate::models::Submission;
    use crate::retrieve::tests::test_retriever;
    use crate::retrieve::{RetrievalOutcome, Retriever};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_direct_image_saved_under_leaf_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pics/cat.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"meow".to_vec()))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("files");
        let post = Submission {
            url: Some(format!("{}/pics/cat.jpg?width=640", server.uri())),
            ..Default::default()
        };

        let outcome = test_retriever(&server.uri())
            .retrieve(Category::DirectMedia(MediaKind::Image), &post, &dest, false)
            .await;

        let RetrievalOutcome::Done(retrieved) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(retrieved.bytes_written, 4);
        assert_eq!(std::fs::read(dest.join("cat.jpg")).unwrap(), b"meow");
    }

    #[tokio::test]
    async fn test_direct_404_is_reported_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let post = Submission {
            url: Some(format!("{}/gone.png", server.uri())),
            ..Default::default()
        };
        let outcome = test_retriever(&server.uri())
            .retrieve(Category::DirectMedia(MediaKind::Image), &post, temp.path(), false)
            .await;
        assert!(outcome.is_failed());
    }

    #[tokio::test]
    async fn test_slow_server_times_out_as_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let settings = HttpSettings {
            timeout_secs: 1,
            max_retries: 0,
            base_delay_ms: 1,
        };
        let fetcher = Fetcher::new(&settings, "reddit_archiver-tests").unwrap();
        let imgur = ImgurClient::new(fetcher.clone(), &server.uri(), "test-client").unwrap();
        let retriever = Retriever::new(fetcher, imgur, None, None);

        let temp = tempfile::tempdir().unwrap();
        let post = Submission {
            url: Some(format!("{}/slow.jpg", server.uri())),
            ..Default::default()
        };
        let outcome = retriever
            .retrieve(Category::DirectMedia(MediaKind::Image), &post, temp.path(), false)
            .await;

        let RetrievalOutcome::Failed(Error::Network(e)) = outcome else {
            panic!("expected a network failure, got {outcome:?}");
        };
        assert!(e.is_timeout());
        assert!(!temp.path().join("slow.jpg").exists());
        assert!(!temp.path().join("slow.jpg.part").exists());
    }
}
