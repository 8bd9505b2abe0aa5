//! Output format catalog.
//!
//! Static table of every conversion target the service accepts, with the
//! codec and quality options each one supports. Lookups drive both the fetch
//! option construction and the ffmpeg argument construction; the table never
//! changes after startup.

use serde_json::{json, Value};

/// Broad media category of an output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Audio-only output (extracts the best audio stream).
    Audio,
    /// Video output (keeps the video stream).
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// One entry in the format catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    /// Format name as submitted by callers, also the output file extension.
    pub name: &'static str,
    pub kind: MediaKind,
    /// ffmpeg audio codec. For wav this is the 16-bit default; a "24bit"
    /// bitrate token switches it at command build time.
    pub audio_codec: &'static str,
    /// ffmpeg video codec, None for audio-only formats.
    pub video_codec: Option<&'static str>,
    /// Extra ffmpeg args appended after the codecs (preset/crf tuning).
    pub extra_video_args: &'static [&'static str],
    /// Accepted bitrate tokens for audio formats (bit depth tokens for wav).
    pub bitrates: &'static [&'static str],
    /// Bitrate applied when the caller did not request one. None means the
    /// format takes no bitrate flag at all (wav, flac, video formats).
    pub default_bitrate: Option<&'static str>,
    /// Accepted quality tokens for video formats.
    pub qualities: &'static [&'static str],
}

/// Every format the service can produce.
const FORMATS: &[FormatSpec] = &[
    FormatSpec {
        name: "mp3",
        kind: MediaKind::Audio,
        audio_codec: "libmp3lame",
        video_codec: None,
        extra_video_args: &[],
        bitrates: &["128k", "192k", "256k", "320k"],
        default_bitrate: Some("192k"),
        qualities: &[],
    },
    FormatSpec {
        name: "mp4",
        kind: MediaKind::Video,
        audio_codec: "aac",
        video_codec: Some("libx264"),
        extra_video_args: &["-preset", "medium", "-crf", "23"],
        bitrates: &[],
        default_bitrate: None,
        qualities: &["360p", "480p", "720p", "1080p"],
    },
    FormatSpec {
        name: "wav",
        kind: MediaKind::Audio,
        audio_codec: "pcm_s16le",
        video_codec: None,
        extra_video_args: &[],
        bitrates: &["16bit", "24bit"],
        default_bitrate: None,
        qualities: &[],
    },
    FormatSpec {
        name: "aac",
        kind: MediaKind::Audio,
        audio_codec: "aac",
        video_codec: None,
        extra_video_args: &[],
        bitrates: &["96k", "128k", "192k", "256k"],
        default_bitrate: Some("128k"),
        qualities: &[],
    },
    FormatSpec {
        name: "webm",
        kind: MediaKind::Video,
        audio_codec: "libopus",
        video_codec: Some("libvpx-vp9"),
        extra_video_args: &[],
        bitrates: &[],
        default_bitrate: None,
        qualities: &["360p", "480p", "720p", "1080p"],
    },
    FormatSpec {
        name: "m4a",
        kind: MediaKind::Audio,
        audio_codec: "aac",
        video_codec: None,
        extra_video_args: &[],
        bitrates: &["128k", "192k", "256k"],
        default_bitrate: Some("128k"),
        qualities: &[],
    },
    FormatSpec {
        name: "flac",
        kind: MediaKind::Audio,
        audio_codec: "flac",
        video_codec: None,
        extra_video_args: &[],
        bitrates: &["lossless"],
        default_bitrate: None,
        qualities: &[],
    },
    FormatSpec {
        name: "mkv",
        kind: MediaKind::Video,
        audio_codec: "aac",
        video_codec: Some("libx264"),
        extra_video_args: &[],
        bitrates: &[],
        default_bitrate: None,
        qualities: &["480p", "720p", "1080p", "4k"],
    },
];

/// Look up a format by name. Names are matched exactly; callers lowercase
/// user input before reaching this point.
pub fn lookup(name: &str) -> Option<&'static FormatSpec> {
    FORMATS.iter().find(|spec| spec.name == name)
}

/// The full catalog, in declaration order.
pub fn all() -> &'static [FormatSpec] {
    FORMATS
}

/// Catalog rendered as the JSON shape the formats endpoint serves:
/// `{name: {type, codec, bitrates|qualities}}`.
pub fn catalog_listing() -> Value {
    let mut map = serde_json::Map::new();
    for spec in FORMATS {
        let entry = match spec.kind {
            MediaKind::Audio => json!({
                "type": spec.kind.to_string(),
                "codec": spec.name,
                "bitrates": spec.bitrates,
            }),
            MediaKind::Video => json!({
                "type": spec.kind.to_string(),
                "codec": spec.name,
                "qualities": spec.qualities,
            }),
        };
        map.insert(spec.name.to_string(), entry);
    }
    Value::Object(map)
}

/// Resolved meaning of a video quality token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTarget {
    Best,
    Worst,
    /// Cap the stream height at this many pixels.
    Height(u32),
}

/// Parse a quality token ("best", "worst", "720p", "4k") into a target.
/// Unrecognized tokens fall back to Best rather than failing the job.
pub fn parse_quality(token: &str) -> QualityTarget {
    match token {
        "best" => QualityTarget::Best,
        "worst" => QualityTarget::Worst,
        "4k" => QualityTarget::Height(2160),
        other => match other.strip_suffix('p').and_then(|h| h.parse::<u32>().ok()) {
            Some(height) => QualityTarget::Height(height),
            None => QualityTarget::Best,
        },
    }
}
