//! External media tooling.
//!
//! Everything that shells out lives behind the [`MediaOps`] trait so the
//! pipeline can be driven in tests without yt-dlp or ffmpeg installed. The
//! production implementation is [`ExternalMediaOps`]; command construction
//! and output parsing live in the `ytdlp` and `ffmpeg` submodules.

pub mod ffmpeg;
pub mod ytdlp;

use crate::formats::{FormatSpec, QualityTarget};
use async_trait::async_trait;
use fetchmill_config::Config;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Metadata for a single media item, as reported by the prober.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub duration_secs: Option<f64>,
    pub uploader: Option<String>,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
}

/// A playlist resolved into its entry URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistExpansion {
    pub title: String,
    /// Entry URLs in playlist order, uncapped.
    pub entries: Vec<String>,
    /// Entry count as reported by the host, before any cap.
    pub total_count: usize,
}

/// A downloaded item sitting on local disk.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedMedia {
    pub path: PathBuf,
    pub title: Option<String>,
    pub duration_secs: Option<f64>,
}

/// Per-fetch knobs passed down from the submission.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Absolute path prefix for the download; the tool appends the native
    /// extension of whatever it saves.
    pub output_stem: PathBuf,
    pub quality: QualityTarget,
    pub bitrate: Option<String>,
}

/// Failures from the external tools.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("yt-dlp exited with status {0}")]
    FetchFailed(i32),
    #[error("yt-dlp terminated by signal")]
    FetchTerminated,
    #[error("ffmpeg exited with status {0}")]
    TranscodeFailed(i32),
    #[error("ffmpeg terminated by signal")]
    TranscodeTerminated,
    #[error("{tool} timed out after {timeout_secs}s")]
    Timeout { tool: &'static str, timeout_secs: u64 },
    #[error("url did not expand into playlist entries")]
    NotAPlaylist,
    #[error("could not parse {tool} output: {detail}")]
    Parse { tool: &'static str, detail: String },
    #[error("download reported success but produced no file")]
    MissingOutput,
    #[error("io error running external tool: {0}")]
    Io(#[from] std::io::Error),
}

/// Operations the pipeline needs from the outside world.
#[async_trait]
pub trait MediaOps: Send + Sync {
    /// Probe a URL for metadata without downloading. Doubles as the
    /// reachability check at submission time.
    async fn probe(&self, url: &str) -> Result<MediaMetadata, MediaError>;

    /// Resolve a playlist URL into its entries.
    async fn expand_playlist(&self, url: &str) -> Result<PlaylistExpansion, MediaError>;

    /// Download one item to local disk.
    async fn fetch(
        &self,
        url: &str,
        spec: &FormatSpec,
        options: &FetchOptions,
    ) -> Result<FetchedMedia, MediaError>;

    /// Convert a local file into the target format.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        spec: &FormatSpec,
        bitrate: Option<&str>,
    ) -> Result<(), MediaError>;
}

/// Production implementation backed by the yt-dlp and ffmpeg binaries.
#[derive(Debug, Clone)]
pub struct ExternalMediaOps {
    ytdlp_bin: String,
    ffmpeg_bin: String,
    fetch_timeout: Duration,
    transcode_timeout: Duration,
}

impl ExternalMediaOps {
    pub fn new(config: &Config) -> Self {
        Self {
            ytdlp_bin: config.tools.ytdlp_bin.clone(),
            ffmpeg_bin: config.tools.ffmpeg_bin.clone(),
            fetch_timeout: Duration::from_secs(config.limits.fetch_timeout_secs),
            transcode_timeout: Duration::from_secs(config.limits.transcode_timeout_secs),
        }
    }
}

#[async_trait]
impl MediaOps for ExternalMediaOps {
    async fn probe(&self, url: &str) -> Result<MediaMetadata, MediaError> {
        ytdlp::run_probe(&self.ytdlp_bin, url, self.fetch_timeout).await
    }

    async fn expand_playlist(&self, url: &str) -> Result<PlaylistExpansion, MediaError> {
        ytdlp::run_playlist_probe(&self.ytdlp_bin, url, self.fetch_timeout).await
    }

    async fn fetch(
        &self,
        url: &str,
        spec: &FormatSpec,
        options: &FetchOptions,
    ) -> Result<FetchedMedia, MediaError> {
        ytdlp::run_fetch(&self.ytdlp_bin, url, spec, options, self.fetch_timeout).await
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        spec: &FormatSpec,
        bitrate: Option<&str>,
    ) -> Result<(), MediaError> {
        ffmpeg::run_transcode(
            &self.ffmpeg_bin,
            input,
            output,
            spec,
            bitrate,
            self.transcode_timeout,
        )
        .await
    }
}
