//! Reddit-hosted (`v.redd.it`) videos.
//!
//! Video and audio are served as separate DASH tracks. The video track comes
//! from `media.reddit_video.fallback_url`; the audio track lives next to it
//! at `<url>/DASH_audio.mp4` and is missing for silent clips. When both are
//! present they are muxed into `<id>.mp4`; the separate tracks are kept.

use std::path::Path;
use tracing::debug;

use super::{Retrieved, Retriever};
use crate::error::{Error, Result};
use crate::models::Submission;

const AUDIO_SUFFIX: &str = "DASH_audio.mp4";

/// Media id of a `v.redd.it/<id>` URL.
fn media_id(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("v.redd.it/")?;
    let id = rest.split(['/', '?', '#']).next().unwrap_or_default();
    (!id.is_empty()).then_some(id)
}

impl Retriever {
    pub(super) async fn retrieve_reddit_video(
        &self,
        submission: &Submission,
        dest: &Path,
    ) -> Result<Retrieved> {
        let url = submission.link();
        let id = media_id(url)
            .ok_or_else(|| Error::MissingPayload(format!("no video id in {url}")))?;
        let video = submission.reddit_video();
        let video_url = video
            .and_then(|v| v.fallback_url.as_deref())
            .ok_or_else(|| Error::MissingPayload("media.reddit_video.fallback_url".to_string()))?;

        let mut retrieved = Retrieved::default();
        let (video_path, bytes) = self
            .download_into(video_url, dest, &format!("{id}_video.mp4"))
            .await?;
        retrieved.record(video_path.clone(), bytes);

        if video.and_then(|v| v.has_audio) == Some(false) {
            debug!("Video reports no audio track");
            return Ok(retrieved);
        }

        let audio_url = format!("{}/{AUDIO_SUFFIX}", url.trim_end_matches('/'));
        let audio_path = match self
            .download_into(&audio_url, dest, &format!("{id}_audio.mp4"))
            .await
        {
            Ok((path, bytes)) => {
                retrieved.record(path.clone(), bytes);
                path
            }
            Err(e) => {
                debug!(error = %e, "No audio track; keeping video only");
                return Ok(retrieved);
            }
        };

        let muxer = self.muxer.as_ref().ok_or_else(|| {
            Error::ExternalTool("ffmpeg not available; kept separate video and audio".to_string())
        })?;
        let output = dest.join(format!("{id}.mp4"));
        muxer.mux(&video_path, &audio_path, &output).await?;
        let bytes = tokio::fs::metadata(&output).await?.len();
        retrieved.record(output, bytes);
        Ok(retrieved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Category;
    use crate::retrieve::RetrievalOutcome;
    use crate::external::Muxer;
    use crate::http::tests::test_fetcher;
    use crate::imgur::ImgurClient;
    use crate::retrieve::tests::test_retriever;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn video_post(base: &str) -> Submission {
        serde_json::from_value(json!({
            "url": format!("{base}/v.redd.it/abc123"),
            "media": { "reddit_video": { "fallback_url": format!("{base}/v.redd.it/abc123/DASH_720.mp4") } }
        }))
        .unwrap()
    }

    struct BrokenMuxer;

    #[async_trait]
    impl Muxer for BrokenMuxer {
        async fn mux(&self, _video: &Path, _audio: &Path, _output: &Path) -> Result<()> {
            Err(Error::ExternalTool("ffmpeg exited with status 1".to_string()))
        }
    }

    fn retriever_with_muxer(muxer: Option<Arc<dyn Muxer>>) -> Retriever {
        let imgur = ImgurClient::new(test_fetcher(), "http://127.0.0.1:9", "test-client").unwrap();
        Retriever::new(test_fetcher(), imgur, None, muxer)
    }

    async fn serve_both_tracks(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v.redd.it/abc123/DASH_720.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"VV".to_vec()))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v.redd.it/abc123/DASH_audio.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"AA".to_vec()))
            .mount(server)
            .await;
    }

    #[test]
    fn test_media_id() {
        assert_eq!(media_id("https://v.redd.it/abc123"), Some("abc123"));
        assert_eq!(media_id("https://v.redd.it/abc123/"), Some("abc123"));
        assert_eq!(media_id("https://example.com/x"), None);
    }

    #[tokio::test]
    async fn test_video_and_audio_are_muxed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v.redd.it/abc123/DASH_720.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"VV".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v.redd.it/abc123/DASH_audio.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"AA".to_vec()))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let outcome = test_retriever(&server.uri())
            .retrieve(Category::RedditVideo, &video_post(&server.uri()), temp.path(), false)
            .await;

        let RetrievalOutcome::Done(retrieved) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(retrieved.files.len(), 3);
        assert_eq!(std::fs::read(temp.path().join("abc123.mp4")).unwrap(), b"VVAA");
        assert!(temp.path().join("abc123_video.mp4").exists());
    }

    #[tokio::test]
    async fn test_silent_video_keeps_video_track() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v.redd.it/abc123/DASH_720.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"VV".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v.redd.it/abc123/DASH_audio.mp4"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let outcome = test_retriever(&server.uri())
            .retrieve(Category::RedditVideo, &video_post(&server.uri()), temp.path(), false)
            .await;

        let RetrievalOutcome::Done(retrieved) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(retrieved.files, vec![temp.path().join("abc123_video.mp4")]);
        assert!(!temp.path().join("abc123.mp4").exists());
    }

    #[tokio::test]
    async fn test_video_without_audio_skips_audio_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v.redd.it/abc123/DASH_720.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"VV".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v.redd.it/abc123/DASH_audio.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"AA".to_vec()))
            .expect(0)
            .mount(&server)
            .await;

        let base = server.uri();
        let post: Submission = serde_json::from_value(json!({
            "url": format!("{base}/v.redd.it/abc123"),
            "media": { "reddit_video": {
                "fallback_url": format!("{base}/v.redd.it/abc123/DASH_720.mp4"),
                "has_audio": false
            } }
        }))
        .unwrap();

        let temp = tempfile::tempdir().unwrap();
        let outcome = test_retriever(&base)
            .retrieve(Category::RedditVideo, &post, temp.path(), false)
            .await;

        let RetrievalOutcome::Done(retrieved) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(retrieved.files, vec![temp.path().join("abc123_video.mp4")]);
    }

    #[tokio::test]
    async fn test_missing_media_descriptor_fails() {
        let temp = tempfile::tempdir().unwrap();
        let post = Submission {
            url: Some("https://v.redd.it/abc123".to_string()),
            ..Default::default()
        };
        let outcome = test_retriever("http://127.0.0.1:9")
            .retrieve(Category::RedditVideo, &post, temp.path(), false)
            .await;
        assert!(matches!(outcome, RetrievalOutcome::Failed(Error::MissingPayload(_))));
    }

    #[tokio::test]
    async fn test_mux_failure_fails_and_keeps_tracks() {
        let server = MockServer::start().await;
        serve_both_tracks(&server).await;

        let temp = tempfile::tempdir().unwrap();
        let outcome = retriever_with_muxer(Some(Arc::new(BrokenMuxer)))
            .retrieve(Category::RedditVideo, &video_post(&server.uri()), temp.path(), false)
            .await;

        assert!(matches!(outcome, RetrievalOutcome::Failed(Error::ExternalTool(_))), "{outcome:?}");
        assert_eq!(std::fs::read(temp.path().join("abc123_video.mp4")).unwrap(), b"VV");
        assert!(temp.path().join("abc123_audio.mp4").exists());
        assert!(!temp.path().join("abc123.mp4").exists());
    }

    #[tokio::test]
    async fn test_missing_muxer_fails_and_keeps_tracks() {
        let server = MockServer::start().await;
        serve_both_tracks(&server).await;

        let temp = tempfile::tempdir().unwrap();
        let outcome = retriever_with_muxer(None)
            .retrieve(Category::RedditVideo, &video_post(&server.uri()), temp.path(), false)
            .await;

        assert!(matches!(outcome, RetrievalOutcome::Failed(Error::ExternalTool(_))), "{outcome:?}");
        assert!(temp.path().join("abc123_video.mp4").exists());
    }
}
