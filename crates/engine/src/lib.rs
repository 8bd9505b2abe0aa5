//! Fetchmill engine
//!
//! Background engine that fetches remote media, transcodes it into the
//! requested format, and tracks every job through an in-memory store.

pub mod api;
pub mod archive;
pub mod formats;
pub mod job;
pub mod media;
pub mod orchestrator;
pub mod playlist;
pub mod startup;
pub mod store;

pub use fetchmill_config as config;
pub use fetchmill_config::Config;

pub use api::{create_router, run_server, ServerError};
pub use archive::{create_archive, ArchiveEntrySource, ArchiveError};
pub use formats::{lookup, parse_quality, FormatSpec, MediaKind, QualityTarget};
pub use job::{JobRecord, JobStatus, OutputKind, PlaylistInfo};
pub use media::{
    ExternalMediaOps, FetchOptions, FetchedMedia, MediaError, MediaMetadata, MediaOps,
    PlaylistExpansion,
};
pub use orchestrator::{Orchestrator, SubmitError, SubmitRequest};
pub use playlist::looks_like_playlist;
pub use startup::{
    check_ffmpeg_available, check_ytdlp_available, parse_ffmpeg_version, run_startup_checks,
    StartupError,
};
pub use store::{JobStore, SharedJobs};
