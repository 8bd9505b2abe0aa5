//! ffmpeg transcode commands.
//!
//! Argument lists are derived from the format catalog: audio formats map to
//! an `-acodec` plus an optional `-ab` bitrate, video formats to a
//! `-vcodec`/`-acodec` pair plus any fixed extra arguments the format
//! carries.

use crate::formats::{FormatSpec, MediaKind};
use crate::media::MediaError;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Pick the audio codec for a format. The "24bit" depth token switches PCM
/// output to the 24-bit encoder; every other case uses the catalog codec.
fn audio_codec_for(spec: &FormatSpec, bitrate: Option<&str>) -> &'static str {
    if spec.audio_codec == "pcm_s16le" && bitrate == Some("24bit") {
        return "pcm_s24le";
    }
    spec.audio_codec
}

/// Build the transcode command for one file.
///
/// The shape is `ffmpeg -i <input> -y <codec args> <output>`. Formats with a
/// default bitrate always get an `-ab` argument, using the default when the
/// submission did not pick one; formats without a default (wav, flac) never
/// do.
pub fn build_transcode_command(
    ffmpeg_bin: &str,
    input: &Path,
    output: &Path,
    spec: &FormatSpec,
    bitrate: Option<&str>,
) -> Command {
    let mut cmd = Command::new(ffmpeg_bin);
    cmd.arg("-i").arg(input);
    cmd.arg("-y");

    match spec.kind {
        MediaKind::Audio => {
            cmd.arg("-acodec").arg(audio_codec_for(spec, bitrate));
            if let Some(default) = spec.default_bitrate {
                cmd.arg("-ab").arg(bitrate.unwrap_or(default));
            }
        }
        MediaKind::Video => {
            if let Some(video_codec) = spec.video_codec {
                cmd.arg("-vcodec").arg(video_codec);
            }
            cmd.arg("-acodec").arg(spec.audio_codec);
            for arg in spec.extra_video_args {
                cmd.arg(arg);
            }
        }
    }

    cmd.arg(output);
    cmd
}

/// Transcode a file, killing ffmpeg if it outlives the timeout.
pub async fn run_transcode(
    ffmpeg_bin: &str,
    input: &Path,
    output: &Path,
    spec: &FormatSpec,
    bitrate: Option<&str>,
    limit: Duration,
) -> Result<(), MediaError> {
    let mut cmd = tokio::process::Command::from(build_transcode_command(
        ffmpeg_bin, input, output, spec, bitrate,
    ));
    cmd.kill_on_drop(true);

    let result = timeout(limit, cmd.output())
        .await
        .map_err(|_| MediaError::Timeout {
            tool: "ffmpeg",
            timeout_secs: limit.as_secs(),
        })??;

    if result.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&result.stderr);
    warn!(
        input = %input.display(),
        format = spec.name,
        stderr = %stderr.trim(),
        "ffmpeg transcode failed"
    );

    match result.status.code() {
        Some(code) => Err(MediaError::TranscodeFailed(code)),
        None => Err(MediaError::TranscodeTerminated),
    }
}
