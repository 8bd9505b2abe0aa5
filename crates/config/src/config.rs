//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Filesystem paths used by the service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// Directory for fetched temporaries, converted outputs, and archives
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("/tmp/fetchmill")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
        }
    }
}

/// Operational limits for job processing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitsConfig {
    /// Maximum playlist entries expanded per job (default 50)
    #[serde(default = "default_playlist_max_entries")]
    pub playlist_max_entries: usize,
    /// Timeout for a single fetch in seconds (default 600)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Timeout for a single transcode in seconds (default 600)
    #[serde(default = "default_transcode_timeout_secs")]
    pub transcode_timeout_secs: u64,
}

fn default_playlist_max_entries() -> usize {
    50
}

fn default_fetch_timeout_secs() -> u64 {
    600
}

fn default_transcode_timeout_secs() -> u64 {
    600
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            playlist_max_entries: default_playlist_max_entries(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            transcode_timeout_secs: default_transcode_timeout_secs(),
        }
    }
}

/// External tool binaries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    /// yt-dlp binary name or path (default "yt-dlp")
    #[serde(default = "default_ytdlp_bin")]
    pub ytdlp_bin: String,
    /// ffmpeg binary name or path (default "ffmpeg")
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,
}

fn default_ytdlp_bin() -> String {
    "yt-dlp".to_string()
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_bin: default_ytdlp_bin(),
            ffmpeg_bin: default_ffmpeg_bin(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Bind address for the HTTP API (default "127.0.0.1:7878")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:7878".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - FETCHMILL_TEMP_DIR -> paths.temp_dir
    /// - FETCHMILL_PLAYLIST_MAX_ENTRIES -> limits.playlist_max_entries
    /// - FETCHMILL_FETCH_TIMEOUT_SECS -> limits.fetch_timeout_secs
    /// - FETCHMILL_TRANSCODE_TIMEOUT_SECS -> limits.transcode_timeout_secs
    /// - FETCHMILL_YTDLP_BIN -> tools.ytdlp_bin
    /// - FETCHMILL_FFMPEG_BIN -> tools.ffmpeg_bin
    /// - FETCHMILL_BIND_ADDR -> server.bind_addr
    pub fn apply_env_overrides(&mut self) {
        // FETCHMILL_TEMP_DIR
        if let Ok(val) = env::var("FETCHMILL_TEMP_DIR") {
            if !val.is_empty() {
                self.paths.temp_dir = PathBuf::from(val);
            }
        }

        // FETCHMILL_PLAYLIST_MAX_ENTRIES
        if let Ok(val) = env::var("FETCHMILL_PLAYLIST_MAX_ENTRIES") {
            if let Ok(max) = val.parse::<usize>() {
                self.limits.playlist_max_entries = max;
            }
        }

        // FETCHMILL_FETCH_TIMEOUT_SECS
        if let Ok(val) = env::var("FETCHMILL_FETCH_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.limits.fetch_timeout_secs = secs;
            }
        }

        // FETCHMILL_TRANSCODE_TIMEOUT_SECS
        if let Ok(val) = env::var("FETCHMILL_TRANSCODE_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.limits.transcode_timeout_secs = secs;
            }
        }

        // FETCHMILL_YTDLP_BIN
        if let Ok(val) = env::var("FETCHMILL_YTDLP_BIN") {
            if !val.is_empty() {
                self.tools.ytdlp_bin = val;
            }
        }

        // FETCHMILL_FFMPEG_BIN
        if let Ok(val) = env::var("FETCHMILL_FFMPEG_BIN") {
            if !val.is_empty() {
                self.tools.ffmpeg_bin = val;
            }
        }

        // FETCHMILL_BIND_ADDR
        if let Ok(val) = env::var("FETCHMILL_BIND_ADDR") {
            if !val.is_empty() {
                self.server.bind_addr = val;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }
}
