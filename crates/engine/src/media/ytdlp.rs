//! yt-dlp integration.
//!
//! Command builders are pure and synchronous so tests can inspect the exact
//! argument lists; the `run_*` functions wrap them in an async child process
//! with a hard timeout. Downloads land under a caller-chosen path stem and
//! are located afterwards by a directory scan, because yt-dlp picks the file
//! extension itself.

use crate::formats::{FormatSpec, MediaKind, QualityTarget};
use crate::media::{FetchOptions, FetchedMedia, MediaError, MediaMetadata, PlaylistExpansion};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tokio::time::timeout;

/// Build the metadata probe command for a single item.
///
/// Runs `yt-dlp -J --no-playlist --no-warnings <url>`; the JSON on stdout is
/// parsed by [`parse_metadata`].
pub fn build_probe_command(ytdlp_bin: &str, url: &str) -> Command {
    let mut cmd = Command::new(ytdlp_bin);
    cmd.arg("-J");
    cmd.arg("--no-playlist");
    cmd.arg("--no-warnings");
    cmd.arg(url);
    cmd
}

/// Build the flat playlist probe command.
///
/// `--flat-playlist` lists entries without resolving each one, which keeps
/// expansion cheap even for large playlists.
pub fn build_playlist_command(ytdlp_bin: &str, url: &str) -> Command {
    let mut cmd = Command::new(ytdlp_bin);
    cmd.arg("-J");
    cmd.arg("--flat-playlist");
    cmd.arg("--no-warnings");
    cmd.arg(url);
    cmd
}

/// Build the download command for one item.
///
/// The output template is `<stem>.%(ext)s`, so yt-dlp appends the native
/// extension of whatever it saves. `--write-info-json` produces a
/// `<stem>.info.json` sidecar carrying the title, read and removed after the
/// download.
///
/// For audio formats the bitrate, when given, turns on audio extraction at
/// the requested quality; without a bitrate the best audio source is saved
/// as-is and any needed conversion happens in the transcode step. For video
/// formats the quality target selects the source rendition.
pub fn build_fetch_command(
    ytdlp_bin: &str,
    url: &str,
    spec: &FormatSpec,
    options: &FetchOptions,
) -> Command {
    let mut cmd = Command::new(ytdlp_bin);
    cmd.arg("-o")
        .arg(format!("{}.%(ext)s", options.output_stem.display()));
    cmd.arg("--no-playlist");
    cmd.arg("--no-warnings");
    cmd.arg("--write-info-json");

    match spec.kind {
        MediaKind::Audio => {
            cmd.arg("-f").arg("bestaudio/best");
            if let Some(bitrate) = options.bitrate.as_deref() {
                cmd.arg("--extract-audio");
                cmd.arg("--audio-format").arg(spec.name);
                cmd.arg("--audio-quality").arg(audio_quality_value(bitrate));
            }
        }
        MediaKind::Video => {
            cmd.arg("-f").arg(format_selector(options.quality));
        }
    }

    cmd.arg(url);
    cmd
}

/// yt-dlp format selector for a video quality target.
fn format_selector(quality: QualityTarget) -> String {
    match quality {
        QualityTarget::Best => "best".to_string(),
        QualityTarget::Worst => "worst".to_string(),
        QualityTarget::Height(height) => format!("best[height<={}]", height),
    }
}

/// Audio quality value for a bitrate token: "192k" becomes "192", depth
/// tokens like "24bit" pass through unchanged.
fn audio_quality_value(bitrate: &str) -> String {
    bitrate.replace('k', "")
}

/// Raw yt-dlp JSON structures for parsing.
mod info_json {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct RawInfo {
        pub title: Option<String>,
        pub duration: Option<f64>,
        pub uploader: Option<String>,
        pub thumbnail: Option<String>,
        pub description: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawPlaylist {
        pub title: Option<String>,
        pub entries: Option<Vec<Option<RawEntry>>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawEntry {
        pub id: Option<String>,
        pub url: Option<String>,
    }
}

/// Parse single-item probe output into metadata.
pub fn parse_metadata(json_str: &str) -> Result<MediaMetadata, MediaError> {
    let raw: info_json::RawInfo = serde_json::from_str(json_str).map_err(|e| MediaError::Parse {
        tool: "yt-dlp",
        detail: e.to_string(),
    })?;

    Ok(MediaMetadata {
        title: raw.title,
        duration_secs: raw.duration,
        uploader: raw.uploader,
        thumbnail: raw.thumbnail,
        description: raw.description,
    })
}

/// Parse flat playlist output into entry URLs.
///
/// Entries carrying a `url` are taken as-is. Entries carrying only an `id`
/// can be resolved into a watch URL for YouTube sources; on other hosts such
/// entries are skipped. A payload without an `entries` key is how yt-dlp
/// reports a single item, so that maps to [`MediaError::NotAPlaylist`] and
/// the caller falls back to treating the URL as one item.
pub fn parse_playlist(json_str: &str, source_url: &str) -> Result<PlaylistExpansion, MediaError> {
    let raw: info_json::RawPlaylist =
        serde_json::from_str(json_str).map_err(|e| MediaError::Parse {
            tool: "yt-dlp",
            detail: e.to_string(),
        })?;

    let raw_entries = raw.entries.ok_or(MediaError::NotAPlaylist)?;

    let mut entries = Vec::new();
    for entry in raw_entries.into_iter().flatten() {
        if let Some(url) = entry.url {
            entries.push(url);
        } else if let Some(id) = entry.id {
            if source_url.contains("youtube") {
                entries.push(format!("https://www.youtube.com/watch?v={}", id));
            }
        }
    }

    let total_count = entries.len();
    Ok(PlaylistExpansion {
        title: raw.title.unwrap_or_else(|| "Playlist".to_string()),
        entries,
        total_count,
    })
}

/// Probe a URL for metadata.
pub async fn run_probe(
    ytdlp_bin: &str,
    url: &str,
    limit: Duration,
) -> Result<MediaMetadata, MediaError> {
    let output = run_with_timeout(build_probe_command(ytdlp_bin, url), limit).await?;
    parse_metadata(&String::from_utf8_lossy(&output.stdout))
}

/// Expand a playlist URL into its entries.
pub async fn run_playlist_probe(
    ytdlp_bin: &str,
    url: &str,
    limit: Duration,
) -> Result<PlaylistExpansion, MediaError> {
    let output = run_with_timeout(build_playlist_command(ytdlp_bin, url), limit).await?;
    parse_playlist(&String::from_utf8_lossy(&output.stdout), url)
}

/// Download one item and locate the file it produced.
pub async fn run_fetch(
    ytdlp_bin: &str,
    url: &str,
    spec: &FormatSpec,
    options: &FetchOptions,
    limit: Duration,
) -> Result<FetchedMedia, MediaError> {
    run_with_timeout(build_fetch_command(ytdlp_bin, url, spec, options), limit).await?;

    let path = find_download(&options.output_stem)
        .await?
        .ok_or(MediaError::MissingOutput)?;
    let (title, duration_secs) = match consume_info_json(&options.output_stem).await {
        Some(metadata) => (metadata.title, metadata.duration_secs),
        None => (None, None),
    };

    Ok(FetchedMedia { path, title, duration_secs })
}

/// Locate the downloaded file for a path stem.
///
/// yt-dlp substitutes the extension itself, so the actual filename is found
/// by scanning the stem's directory for prefix matches. Sidecar and partial
/// files are excluded; with several matches the lexicographically first one
/// wins.
pub async fn find_download(output_stem: &Path) -> Result<Option<PathBuf>, MediaError> {
    let dir = match output_stem.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = match output_stem.file_name().and_then(|name| name.to_str()) {
        Some(prefix) => prefix,
        None => return Ok(None),
    };

    let mut matches = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = match name.to_str() {
            Some(name) => name,
            None => continue,
        };
        if name.starts_with(prefix) && !name.ends_with(".info.json") && !name.ends_with(".part") {
            matches.push(entry.path());
        }
    }

    matches.sort();
    Ok(matches.into_iter().next())
}

/// Read and delete the `<stem>.info.json` sidecar, if the download wrote one.
async fn consume_info_json(output_stem: &Path) -> Option<MediaMetadata> {
    let mut sidecar = output_stem.as_os_str().to_os_string();
    sidecar.push(".info.json");
    let sidecar = PathBuf::from(sidecar);

    let contents = tokio::fs::read_to_string(&sidecar).await.ok()?;
    let _ = tokio::fs::remove_file(&sidecar).await;
    parse_metadata(&contents).ok()
}

/// Run a command as an async child process with a hard timeout. The child is
/// killed if the future is dropped or the timeout fires.
async fn run_with_timeout(
    cmd: Command,
    limit: Duration,
) -> Result<std::process::Output, MediaError> {
    let mut cmd = tokio::process::Command::from(cmd);
    cmd.kill_on_drop(true);

    let output = timeout(limit, cmd.output())
        .await
        .map_err(|_| MediaError::Timeout {
            tool: "yt-dlp",
            timeout_secs: limit.as_secs(),
        })??;

    if output.status.success() {
        Ok(output)
    } else {
        match output.status.code() {
            Some(code) => Err(MediaError::FetchFailed(code)),
            None => Err(MediaError::FetchTerminated),
        }
    }
}
