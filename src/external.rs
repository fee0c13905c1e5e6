//! External tools: the generic video extractor and the stream multiplexer.
//!
//! Both are traits so the retrieval strategies can be exercised with fakes.
//! The real implementations shell out to binaries found on `PATH`:
//! [`YtDlp`] (`yt-dlp`) and [`Ffmpeg`] (`ffmpeg`). A missing binary
//! disables the capability instead of failing the run.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Stream-format preference handed to the extractor: known high-quality
/// video ids merged with the best audio, then whatever is best.
pub const FORMAT_PREFERENCE: &str = "299+bestaudio/298+bestaudio/137+bestaudio/136+bestaudio/best";

/// Output template; the extractor chooses `<id>.<ext>`.
pub const OUTPUT_TEMPLATE: &str = "%(id)s.%(ext)s";

/// Extractor key reported for pages no dedicated extractor handles.
const GENERIC_EXTRACTOR: &str = "Generic";

/// Generic video extractor.
#[async_trait]
pub trait VideoExtractor: Send + Sync {
    /// Whether a dedicated (non-generic) extractor can handle `url`.
    async fn supports(&self, url: &str) -> bool;

    /// Download `url` into `dest_dir`, returning the written files. A URL
    /// no extractor supports yields an empty list rather than an error.
    async fn download(&self, url: &str, dest_dir: &Path, format: &str) -> Result<Vec<PathBuf>>;
}

/// Combines a video and an audio track into one file.
#[async_trait]
pub trait Muxer: Send + Sync {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;
}

/// [`VideoExtractor`] backed by the `yt-dlp` binary.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary_path: PathBuf,
}

impl YtDlp {
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Locate `yt-dlp` on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }
}

#[async_trait]
impl VideoExtractor for YtDlp {
    #[instrument(level = "debug", skip(self))]
    async fn supports(&self, url: &str) -> bool {
        let output = Command::new(&self.binary_path)
            .args(["--simulate", "--no-playlist", "--no-warnings"])
            .args(["--print", "extractor_key"])
            .arg(url)
            .output()
            .await;
        match output {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let key = stdout.lines().next().unwrap_or_default().trim();
                debug!(extractor = key, "Extractor lookup finished");
                !key.is_empty() && key != GENERIC_EXTRACTOR
            }
            Ok(_) => false,
            Err(e) => {
                debug!(error = %e, "Extractor lookup could not run");
                false
            }
        }
    }

    #[instrument(level = "debug", skip(self, dest_dir), fields(dest = %dest_dir.display()))]
    async fn download(&self, url: &str, dest_dir: &Path, format: &str) -> Result<Vec<PathBuf>> {
        let output = Command::new(&self.binary_path)
            .args(["-f", format])
            .args(["--no-overwrites", "--continue", "--no-progress", "--quiet"])
            .arg("-o")
            .arg(dest_dir.join(OUTPUT_TEMPLATE))
            .args(["--print", "after_move:filepath"])
            .arg(url)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to execute yt-dlp: {e}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            if stderr.contains("Unsupported URL") {
                debug!("No extractor supports this URL");
                return Ok(Vec::new());
            }
            return Err(Error::ExternalTool(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect())
    }
}

/// [`Muxer`] backed by the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary_path: PathBuf,
}

impl Ffmpeg {
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Locate `ffmpeg` on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }
}

#[async_trait]
impl Muxer for Ffmpeg {
    #[instrument(level = "debug", skip_all, fields(output = %output.display()))]
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let result = Command::new(&self.binary_path)
            .args(["-y", "-loglevel", "error"])
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-c", "copy"])
            .arg(output)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to execute ffmpeg: {e}")))?;

        if result.status.success() {
            Ok(())
        } else {
            Err(Error::ExternalTool(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )))
        }
    }
}
