//! Startup checks.
//!
//! Preflight verification that the external tools are runnable before the
//! server starts accepting submissions:
//! - yt-dlp availability check
//! - ffmpeg availability check, with the detected version logged

use fetchmill_config::Config;
use std::process::Command;
use thiserror::Error;
use tracing::info;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("yt-dlp not available: {0}")]
    YtdlpUnavailable(String),

    #[error("ffmpeg not available: {0}")]
    FfmpegUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Check if yt-dlp is available by running `yt-dlp --version`
pub fn check_ytdlp_available(ytdlp_bin: &str) -> Result<(), StartupError> {
    let output = Command::new(ytdlp_bin)
        .arg("--version")
        .output()
        .map_err(|e| {
            StartupError::YtdlpUnavailable(format!(
                "{} --version failed; is yt-dlp installed and in PATH? Error: {}",
                ytdlp_bin, e
            ))
        })?;

    if !output.status.success() {
        return Err(StartupError::YtdlpUnavailable(format!(
            "{} --version failed; is yt-dlp installed and in PATH?",
            ytdlp_bin
        )));
    }

    let version = String::from_utf8_lossy(&output.stdout);
    info!(version = %version.trim(), "yt-dlp available");
    Ok(())
}

/// Parse FFmpeg version string and extract major version number
///
/// Handles various FFmpeg version formats:
/// - Standard: "ffmpeg version 6.1 ..."
/// - N-prefixed: "ffmpeg version n6.1-... ..."
pub fn parse_ffmpeg_version(version_output: &str) -> Option<u32> {
    let version_line = version_output
        .lines()
        .find(|line| line.to_lowercase().contains("ffmpeg version"))?;

    let version_part = version_line
        .to_lowercase()
        .split("ffmpeg version")
        .nth(1)?
        .trim()
        .split_whitespace()
        .next()?
        .to_string();

    // Handle n-prefixed versions (e.g., "n6.1-...")
    let version_str = version_part.trim_start_matches('n');

    // Extract major version (before first '.' or '-')
    let major_str = version_str.split(|c| c == '.' || c == '-').next()?;

    major_str.parse().ok()
}

/// Check if ffmpeg is available by running `ffmpeg -version`
///
/// Any parseable version is accepted; the major version is only logged so an
/// aging install shows up in the startup output.
pub fn check_ffmpeg_available(ffmpeg_bin: &str) -> Result<(), StartupError> {
    let output = Command::new(ffmpeg_bin)
        .arg("-version")
        .output()
        .map_err(|e| {
            StartupError::FfmpegUnavailable(format!(
                "{} -version failed; is ffmpeg installed and in PATH? Error: {}",
                ffmpeg_bin, e
            ))
        })?;

    if !output.status.success() {
        return Err(StartupError::FfmpegUnavailable(format!(
            "{} -version failed; is ffmpeg installed and in PATH?",
            ffmpeg_bin
        )));
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    match parse_ffmpeg_version(&version_output) {
        Some(major) => info!(major_version = major, "ffmpeg available"),
        None => info!("ffmpeg available, version not recognized"),
    }

    Ok(())
}

/// Run all startup checks in order
///
/// Checks are run in the following order:
/// 1. yt-dlp availability
/// 2. ffmpeg availability
pub fn run_startup_checks(config: &Config) -> Result<(), StartupError> {
    check_ytdlp_available(&config.tools.ytdlp_bin)?;
    check_ffmpeg_available(&config.tools.ffmpeg_bin)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // *For any* FFmpeg version string, standard or n-prefixed, single line
    // or multiline, the parser extracts the major version number.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_ffmpeg_version_parsing_standard(
            major in 1u32..20,
            minor in 0u32..10,
            patch in 0u32..10,
        ) {
            let version_output = format!(
                "ffmpeg version {}.{}.{} Copyright (c) 2000-2024 the FFmpeg developers",
                major, minor, patch
            );

            let parsed = parse_ffmpeg_version(&version_output);
            prop_assert_eq!(
                parsed, Some(major),
                "Should parse major version {} from '{}'",
                major, version_output
            );
        }

        #[test]
        fn prop_ffmpeg_version_parsing_n_prefixed(
            major in 1u32..20,
            minor in 0u32..10,
            git_hash in "[a-f0-9]{7}",
        ) {
            let version_output = format!(
                "ffmpeg version n{}.{}-123-g{} Copyright (c) 2000-2024",
                major, minor, git_hash
            );

            let parsed = parse_ffmpeg_version(&version_output);
            prop_assert_eq!(
                parsed, Some(major),
                "Should parse major version {} from n-prefixed '{}'",
                major, version_output
            );
        }

        #[test]
        fn prop_ffmpeg_version_parsing_multiline(
            major in 1u32..20,
            minor in 0u32..10,
        ) {
            let version_output = format!(
                "ffmpeg version {}.{} Copyright (c) 2000-2024\nbuilt with gcc 12.2.0\nconfiguration: --enable-gpl",
                major, minor
            );

            let parsed = parse_ffmpeg_version(&version_output);
            prop_assert_eq!(
                parsed, Some(major),
                "Should parse major version {} from multiline output",
                major
            );
        }
    }

    #[test]
    fn test_parse_ffmpeg_version_standard() {
        let output = "ffmpeg version 6.1 Copyright (c) 2000-2024";
        assert_eq!(parse_ffmpeg_version(output), Some(6));
    }

    #[test]
    fn test_parse_ffmpeg_version_n_prefixed() {
        let output = "ffmpeg version n6.1-123-gabcdef Copyright (c) 2000-2024";
        assert_eq!(parse_ffmpeg_version(output), Some(6));
    }

    #[test]
    fn test_parse_ffmpeg_version_with_minor() {
        let output = "ffmpeg version 7.1.2 Copyright (c) 2000-2024";
        assert_eq!(parse_ffmpeg_version(output), Some(7));
    }

    #[test]
    fn test_parse_ffmpeg_version_multiline() {
        let output = r#"ffmpeg version n6.0-5-g1234567 Copyright (c) 2000-2024
built with gcc 12.2.0
configuration: --enable-gpl"#;
        assert_eq!(parse_ffmpeg_version(output), Some(6));
    }

    #[test]
    fn test_parse_ffmpeg_version_invalid() {
        assert_eq!(parse_ffmpeg_version("not ffmpeg output"), None);
        assert_eq!(parse_ffmpeg_version(""), None);
    }

    #[test]
    fn test_missing_binaries_are_reported() {
        let result = check_ytdlp_available("/nonexistent/fetchmill-test-ytdlp");
        assert!(matches!(result, Err(StartupError::YtdlpUnavailable(_))));

        let result = check_ffmpeg_available("/nonexistent/fetchmill-test-ffmpeg");
        assert!(matches!(result, Err(StartupError::FfmpegUnavailable(_))));
    }
}
