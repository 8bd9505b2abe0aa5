//! Job record and lifecycle states.
//!
//! A job tracks one submission from acceptance to its terminal state. The
//! record is the single source of truth the status endpoint reads, so every
//! mutation goes through the helper methods here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Lifecycle state of a job.
///
/// `Processing` carries the 1-based item position and the working set size;
/// the composite string form ("processing_2_of_5") exists only at the
/// serialization boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted, pipeline not yet running.
    Starting,
    /// Working on item `current` of `total`.
    Processing { current: usize, total: usize },
    /// Finished with an output available.
    Completed,
    /// Finished without an output.
    Error,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Starting
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Starting => write!(f, "starting"),
            JobStatus::Processing { current, total } => {
                write!(f, "processing_{}_of_{}", current, total)
            }
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// Error returned when a status string does not parse.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unrecognized job status: {0}")]
pub struct ParseStatusError(String);

impl FromStr for JobStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starting" => Ok(JobStatus::Starting),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            other => {
                let parse = || {
                    let rest = other.strip_prefix("processing_")?;
                    let (current, total) = rest.split_once("_of_")?;
                    let current = current.parse().ok()?;
                    let total = total.parse().ok()?;
                    Some(JobStatus::Processing { current, total })
                };
                parse().ok_or_else(|| ParseStatusError(s.to_string()))
            }
        }
    }
}

impl Serialize for JobStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Whether the finished output is a single file or a zip of several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Single,
    Archive,
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputKind::Single => write!(f, "single"),
            OutputKind::Archive => write!(f, "archive"),
        }
    }
}

/// Details recorded when a single submitted URL expanded into a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistInfo {
    pub title: String,
    /// Full entry count before the expansion cap was applied.
    pub entry_count: usize,
}

/// State of one submission, shared between the pipeline task and pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job identifier (UUID).
    pub id: String,
    pub status: JobStatus,
    /// Display progress percentage in [0, 100], never decreasing.
    pub progress: f32,
    /// Failure reason, set only alongside `JobStatus::Error`.
    pub error: Option<String>,
    /// URLs exactly as submitted.
    pub source_urls: Vec<String>,
    /// 0-based index of the item currently in flight.
    pub current_index: usize,
    /// Size of the working set after any playlist expansion.
    pub total_items: usize,
    pub playlist: Option<PlaylistInfo>,
    /// Final artifact path, set only alongside `JobStatus::Completed`.
    pub output_path: Option<PathBuf>,
    pub output_kind: Option<OutputKind>,
    /// Items that made it all the way through fetch and transcode.
    pub processed_count: usize,
    /// Result title: the item title for one file, "<n> files" for several.
    pub display_title: Option<String>,
    /// Unix timestamp (milliseconds) when the job was created.
    pub created_at: i64,
    /// Unix timestamp (milliseconds) when the record was last updated.
    pub updated_at: i64,
}

impl JobRecord {
    /// Create a fresh record for a submission. `urls` must be non-empty;
    /// the orchestrator enforces that before allocating an id.
    pub fn new(id: String, source_urls: Vec<String>) -> Self {
        let now = current_timestamp_ms();
        let total_items = source_urls.len();
        Self {
            id,
            status: JobStatus::Starting,
            progress: 0.0,
            error: None,
            source_urls,
            current_index: 0,
            total_items,
            playlist: None,
            output_path: None,
            output_kind: None,
            processed_count: 0,
            display_title: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the record's updated_at timestamp to now.
    pub fn touch(&mut self) {
        self.updated_at = current_timestamp_ms();
    }

    /// Set the job status and update timestamp.
    pub fn set_status(&mut self, status: JobStatus) {
        self.status = status;
        self.touch();
    }

    /// Raise the display progress. Values are clamped to [0, 100] and the
    /// progress never moves backwards, so recomputed estimates cannot make
    /// the display regress.
    pub fn set_progress(&mut self, value: f32) {
        self.progress = value.clamp(0.0, 100.0).max(self.progress);
        self.touch();
    }

    /// Mark the job as failed with a reason.
    pub fn fail(&mut self, reason: &str) {
        self.status = JobStatus::Error;
        self.error = Some(reason.to_string());
        self.touch();
    }

    /// Mark the job as completed with its output artifact.
    pub fn complete(
        &mut self,
        output_path: PathBuf,
        output_kind: OutputKind,
        processed_count: usize,
        display_title: String,
    ) {
        self.status = JobStatus::Completed;
        self.output_path = Some(output_path);
        self.output_kind = Some(output_kind);
        self.processed_count = processed_count;
        self.display_title = Some(display_title);
        self.set_progress(100.0);
    }

    /// Check if the job is in a terminal state (completed or error).
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Error)
    }

    /// Check if the job is still being worked on.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
fn current_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
