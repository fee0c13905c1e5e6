//! Shared HTTP client with exponential backoff retry logic.
//!
//! Every network call of the archiver goes through [`Fetcher`], which wraps a
//! single `reqwest::Client` (explicit timeout, user agent, redirects followed)
//! and a [`RetryPolicy`]. Only transient failures are retried; a 404 fails
//! immediately.
//!
//! # Retry Strategy
//!
//! The delay between retries follows this formula:
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```
//!
//! # Downloads
//!
//! [`Fetcher::download`] streams the body into `<file>.part` and renames it
//! once complete, so an interrupted run never leaves a truncated file under
//! the final name.

use futures::StreamExt;
use rand::{Rng, rng};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

use crate::config::HttpSettings;
use crate::error::{Error, Result};
use crate::utils::part_path;

/// Backoff parameters for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: Duration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.base_delay.saturating_mul(1 << shift).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis(),
                            error = %e,
                            what,
                            "Request exhausted retries"
                        );
                        return Err(e);
                    }

                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = self.delay_for(attempt) + Duration::from_millis(jitter_ms);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        what,
                        "Request failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Shared HTTP client used by every collaborator.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(settings: &HttpSettings, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            client,
            retry: RetryPolicy::new(settings.max_retries, settings.base_delay()),
        })
    }

    async fn send(&self, url: &str, headers: &HeaderMap) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// GET returning the body text and the final URL after redirects.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<(String, String)> {
        let headers = &HeaderMap::new();
        self.retry
            .run(url, || async move {
                let response = self.send(url, headers).await?;
                let final_url = response.url().to_string();
                Ok((final_url, response.text().await?))
            })
            .await
    }

    /// GET a JSON document with extra request headers.
    #[instrument(level = "debug", skip(self, headers))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, headers: &HeaderMap) -> Result<T> {
        self.retry
            .run(url, || async move {
                let response = self.send(url, headers).await?;
                let bytes = response.bytes().await?;
                Ok(serde_json::from_slice(&bytes)?)
            })
            .await
    }

    /// GET returning the `Content-Type` header of the response, if any.
    #[instrument(level = "debug", skip(self))]
    pub async fn content_type(&self, url: &str) -> Result<Option<String>> {
        let headers = &HeaderMap::new();
        self.retry
            .run(url, || async move {
                let response = self.send(url, headers).await?;
                Ok(response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string))
            })
            .await
    }

    /// Stream `url` into `dest`, returning the number of bytes written.
    #[instrument(level = "debug", skip(self), fields(dest = %dest.display()))]
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let t0 = Instant::now();
        let headers = &HeaderMap::new();
        let part = part_path(dest);
        let part_ref = part.as_path();
        let written = self
            .retry
            .run(url, || async move {
                let response = self.send(url, headers).await?;
                let mut file = tokio::fs::File::create(part_ref).await?;
                let mut stream = response.bytes_stream();
                let mut written = 0u64;
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    file.write_all(&chunk).await?;
                    written += chunk.len() as u64;
                }
                file.flush().await?;
                Ok(written)
            })
            .await;

        match written {
            Ok(bytes) => {
                tokio::fs::rename(&part, dest).await?;
                debug!(bytes, elapsed_ms = t0.elapsed().as_millis(), "Download complete");
                Ok(bytes)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Fetcher with no retries and a short timeout.
    pub(crate) fn test_fetcher() -> Fetcher {
        let settings = HttpSettings {
            timeout_secs: 5,
            max_retries: 0,
            base_delay_ms: 1,
        };
        Fetcher::new(&settings, "reddit_archiver-tests").unwrap()
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let result: Result<()> = policy
            .run("test", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Http {
                        url: "u".to_string(),
                        status: 404,
                    })
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let result = policy
            .run("test", || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::Http {
                            url: "u".to_string(),
                            status: 503,
                        })
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_download_writes_whole_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("a.jpg");
        let bytes = test_fetcher()
            .download(&format!("{}/media/a.jpg", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(bytes, 10);
        assert_eq!(std::fs::read(&dest).unwrap(), b"jpeg-bytes");
        assert!(!temp.path().join("a.jpg.part").exists());
    }

    #[tokio::test]
    async fn test_download_404_leaves_nothing_behind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("missing.png");
        let err = test_fetcher()
            .download(&format!("{}/missing.png", server.uri()), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Http { status: 404, .. }));
        assert!(!dest.exists());
        assert!(!temp.path().join("missing.png.part").exists());
    }
}
