//! On-disk configuration loading.
//!
//! The archiver reads a YAML file (by default `~/.saveddit/user_config.yaml`)
//! holding the album-host client credential and a few tuning knobs. When the
//! file does not exist a template is written and loading fails, so the user
//! can fill in credentials before any listing is fetched.
//!
//! ```yaml
//! imgur_client_id: "0123456789abcde"
//! user_agent: "reddit_archiver/0.1"
//! concurrency: 1
//! more_comments_budget: 32
//! http:
//!   timeout_secs: 30
//!   max_retries: 3
//!   base_delay_ms: 500
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};

/// Default Reddit endpoint for public JSON listings.
pub const DEFAULT_REDDIT_BASE_URL: &str = "https://www.reddit.com";

/// Default Imgur API endpoint.
pub const DEFAULT_IMGUR_BASE_URL: &str = "https://api.imgur.com";

/// Archiver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Client id sent as `Authorization: Client-ID <id>` to the Imgur API.
    pub imgur_client_id: String,
    /// User agent for every outgoing request.
    pub user_agent: String,
    pub reddit_base_url: String,
    pub imgur_base_url: String,
    /// Number of items processed concurrently within one listing.
    pub concurrency: usize,
    /// Maximum number of "load more comments" expansions per submission.
    pub more_comments_budget: usize,
    pub http: HttpSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            imgur_client_id: String::new(),
            user_agent: format!("reddit_archiver/{}", env!("CARGO_PKG_VERSION")),
            reddit_base_url: DEFAULT_REDDIT_BASE_URL.to_string(),
            imgur_base_url: DEFAULT_IMGUR_BASE_URL.to_string(),
            concurrency: 1,
            more_comments_budget: 32,
            http: HttpSettings::default(),
        }
    }
}

/// Timeout and retry settings shared by every HTTP call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub base_delay_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 500,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl AppConfig {
    /// Default config location: `~/.saveddit/user_config.yaml`.
    pub fn default_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".saveddit").join("user_config.yaml"))
            .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))
    }

    /// Load the config file, writing a template and failing if it is missing.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            Self::write_template(path).await?;
            return Err(Error::Config(format!(
                "no configuration file found; created {}, edit it with valid credentials",
                path.display()
            )));
        }
        let text = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = serde_yaml::from_str(&text)?;
        info!("Loaded configuration");
        Ok(config)
    }

    async fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let template = serde_yaml::to_string(&AppConfig::default())?;
        tokio::fs::write(path, template).await?;
        warn!(path = %path.display(), "Wrote configuration template");
        Ok(())
    }

    /// Apply a command-line/env override of the album-host credential.
    pub fn with_imgur_client_id(mut self, client_id: Option<String>) -> Self {
        if let Some(id) = client_id {
            self.imgur_client_id = id;
        }
        self
    }

    /// Reject configurations that cannot run: missing credential, zero workers.
    pub fn validate(&self) -> Result<()> {
        if self.imgur_client_id.trim().is_empty() {
            return Err(Error::Config(
                "`imgur_client_id` is empty; set it in the config file or pass --imgur-client-id"
                    .to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("`concurrency` must be at least 1".to_string()));
        }
        url::Url::parse(&self.reddit_base_url)?;
        url::Url::parse(&self.imgur_base_url)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_writes_template_and_fails() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join(".saveddit").join("user_config.yaml");

        let err = AppConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(path.exists());

        // The template parses back and fails validation on the empty credential
        let config = AppConfig::load(&path).await.unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.yaml");
        tokio::fs::write(&path, "imgur_client_id: abc123\nhttp:\n  timeout_secs: 5\n")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.imgur_client_id, "abc123");
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.reddit_base_url, DEFAULT_REDDIT_BASE_URL);
        config.validate().unwrap();
    }

    #[test]
    fn test_cli_override_of_client_id() {
        let config = AppConfig::default().with_imgur_client_id(Some("from-env".to_string()));
        assert_eq!(config.imgur_client_id, "from-env");
        config.validate().unwrap();

        let config = AppConfig::default().with_imgur_client_id(None);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = AppConfig {
            imgur_client_id: "id".to_string(),
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
