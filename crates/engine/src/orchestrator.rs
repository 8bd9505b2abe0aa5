//! Job orchestration.
//!
//! `submit` allocates a job id, records it in the store and spawns the
//! pipeline as a detached task, so acceptance returns immediately and the
//! caller polls the store for progress. The pipeline expands playlists,
//! fetches and converts each item in turn, and packages multi-item results
//! into a zip. A failing item is logged and skipped; the job only fails as a
//! whole when nothing survives.

use crate::archive::{self, ArchiveEntrySource, ArchiveError};
use crate::formats::{self, FormatSpec, QualityTarget};
use crate::job::{JobRecord, JobStatus, OutputKind, PlaylistInfo};
use crate::media::{FetchOptions, MediaError, MediaMetadata, MediaOps};
use crate::playlist;
use crate::store::JobStore;
use fetchmill_config::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

/// One submission, as accepted by the request layer.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub urls: Vec<String>,
    /// Target format name, already lowercased.
    pub format: String,
    /// Video quality token ("best", "worst", "720p").
    pub quality: String,
    /// Audio bitrate token ("192k", "24bit").
    pub bitrate: Option<String>,
}

/// Rejections issued before a job id is allocated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("a submission needs at least one url")]
    EmptySubmission,
}

/// Terminal pipeline failures. The rendered message becomes the job's error
/// field, so the wording here is part of the status surface.
#[derive(Debug, Error)]
enum PipelineError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("No files were successfully processed")]
    NoFilesProcessed,
    #[error("Conversion failed: {0}")]
    Archive(#[from] ArchiveError),
    #[error("Conversion failed: {0}")]
    ArchiveTask(String),
    #[error("Conversion failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-item failures. These never fail the job directly.
#[derive(Debug, Error)]
enum ItemError {
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One item that made it through fetch and conversion.
struct ProcessedItem {
    path: PathBuf,
    title: String,
    duration_secs: Option<f64>,
}

/// Shared engine handle. Cloning is cheap; all clones drive the same store.
#[derive(Clone)]
pub struct Orchestrator {
    store: JobStore,
    media: Arc<dyn MediaOps>,
    temp_dir: PathBuf,
    playlist_max_entries: usize,
}

impl Orchestrator {
    pub fn new(media: Arc<dyn MediaOps>, config: &Config) -> Self {
        Self {
            store: JobStore::new(),
            media,
            temp_dir: config.paths.temp_dir.clone(),
            playlist_max_entries: config.limits.playlist_max_entries,
        }
    }

    /// Accept a submission and start its pipeline in the background.
    /// Returns the new job id as soon as the record is visible in the store.
    pub async fn submit(&self, request: SubmitRequest) -> Result<String, SubmitError> {
        if request.urls.is_empty() {
            return Err(SubmitError::EmptySubmission);
        }

        let job_id = Uuid::new_v4().to_string();
        self.store
            .insert(JobRecord::new(job_id.clone(), request.urls.clone()))
            .await;

        info!(
            job_id = %job_id,
            urls = request.urls.len(),
            format = %request.format,
            "job accepted"
        );

        let engine = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            engine.run_job(id, request).await;
        });

        Ok(job_id)
    }

    /// Current snapshot of a job's record.
    pub async fn get_status(&self, job_id: &str) -> Option<JobRecord> {
        self.store.snapshot(job_id).await
    }

    /// Path to the finished artifact. None until the job completes.
    pub async fn get_output_path(&self, job_id: &str) -> Option<PathBuf> {
        let record = self.store.snapshot(job_id).await?;
        if record.status == JobStatus::Completed {
            record.output_path
        } else {
            None
        }
    }

    /// Remove a job's artifact from disk and drop its record.
    ///
    /// Jobs without an output, active or failed, keep their record so their
    /// state stays pollable. Unknown ids are a no-op.
    pub async fn cleanup(&self, job_id: &str) {
        let record = match self.store.snapshot(job_id).await {
            Some(record) => record,
            None => return,
        };
        let output_path = match record.output_path {
            Some(path) => path,
            None => return,
        };

        match tokio::fs::remove_file(&output_path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "could not remove output file");
                return;
            }
        }

        self.store.remove(job_id).await;
        info!(job_id = %job_id, "cleaned up job");
    }

    /// Catalog of producible formats, in the wire listing shape.
    pub fn list_formats(&self) -> serde_json::Value {
        formats::catalog_listing()
    }

    /// Check that a URL is well formed and resolvable. Structure first, so a
    /// plain typo never costs a probe, then the prober has the final say.
    pub async fn validate_url(&self, url: &str) -> bool {
        let has_host = match Url::parse(url) {
            Ok(parsed) => parsed.host_str().map_or(false, |host| !host.is_empty()),
            Err(_) => false,
        };
        if !has_host {
            return false;
        }
        self.media.probe(url).await.is_ok()
    }

    /// Metadata for one item, if the prober can resolve it.
    pub async fn probe(&self, url: &str) -> Option<MediaMetadata> {
        self.media.probe(url).await.ok()
    }

    async fn run_job(&self, job_id: String, request: SubmitRequest) {
        if let Err(err) = self.run_pipeline(&job_id, request).await {
            error!(job_id = %job_id, error = %err, "job failed");
            self.store
                .update(&job_id, |record| record.fail(&err.to_string()))
                .await;
        }
    }

    async fn run_pipeline(&self, job_id: &str, request: SubmitRequest) -> Result<(), PipelineError> {
        let mut items = request.urls.clone();

        // A lone playlist URL becomes its entries; expansion failure demotes
        // the URL back to a single item.
        if items.len() == 1 && playlist::looks_like_playlist(&items[0]) {
            match self.media.expand_playlist(&items[0]).await {
                Ok(expansion) => {
                    let title = expansion.title;
                    let total_count = expansion.total_count;
                    let mut entries = expansion.entries;
                    entries.truncate(self.playlist_max_entries);
                    let entry_total = entries.len();

                    info!(
                        job_id = %job_id,
                        title = %title,
                        entries = entry_total,
                        total = total_count,
                        "expanded playlist"
                    );

                    self.store
                        .update(job_id, move |record| {
                            record.playlist = Some(PlaylistInfo {
                                title,
                                entry_count: total_count,
                            });
                            record.total_items = entry_total;
                            record.touch();
                        })
                        .await;
                    items = entries;
                }
                Err(err) => {
                    warn!(
                        job_id = %job_id,
                        error = %err,
                        "playlist expansion failed, treating url as single item"
                    );
                }
            }
        }

        let spec = formats::lookup(&request.format)
            .ok_or_else(|| PipelineError::UnsupportedFormat(request.format.clone()))?;
        let quality = formats::parse_quality(&request.quality);

        tokio::fs::create_dir_all(&self.temp_dir).await?;

        let total = items.len();
        let mut processed: Vec<ProcessedItem> = Vec::new();

        for (index, url) in items.iter().enumerate() {
            self.store
                .update(job_id, |record| {
                    record.current_index = index;
                    record.set_status(JobStatus::Processing {
                        current: index + 1,
                        total,
                    });
                    record.set_progress(item_progress(index, total));
                })
                .await;

            match self
                .process_item(job_id, index, total, url, spec, quality, request.bitrate.as_deref())
                .await
            {
                Ok(item) => processed.push(item),
                Err(err) => {
                    warn!(
                        job_id = %job_id,
                        url = %url,
                        item = index + 1,
                        error = %err,
                        "item failed, continuing"
                    );
                }
            }
        }

        if processed.is_empty() {
            return Err(PipelineError::NoFilesProcessed);
        }

        let processed_count = processed.len();
        let total_media_secs: f64 = processed
            .iter()
            .filter_map(|item| item.duration_secs)
            .sum();
        let (output_path, output_kind, display_title) = if processed_count > 1 {
            let zip_path = self.temp_dir.join(format!("{}_archive.zip", job_id));
            let sources: Vec<ArchiveEntrySource> = processed
                .iter()
                .map(|item| ArchiveEntrySource {
                    path: item.path.clone(),
                    title: item.title.clone(),
                })
                .collect();

            let target = zip_path.clone();
            tokio::task::spawn_blocking(move || archive::create_archive(&sources, &target))
                .await
                .map_err(|err| PipelineError::ArchiveTask(err.to_string()))??;

            (zip_path, OutputKind::Archive, format!("{} files", processed_count))
        } else {
            let item = processed.pop().ok_or(PipelineError::NoFilesProcessed)?;
            (item.path, OutputKind::Single, item.title)
        };

        self.store
            .update(job_id, move |record| {
                record.complete(output_path, output_kind, processed_count, display_title);
            })
            .await;

        info!(
            job_id = %job_id,
            processed = processed_count,
            media_secs = total_media_secs,
            "job completed"
        );
        Ok(())
    }

    /// Fetch and convert one item. The resulting file is named by job id and
    /// item index so nothing a job writes can collide with another job.
    async fn process_item(
        &self,
        job_id: &str,
        index: usize,
        total: usize,
        url: &str,
        spec: &'static FormatSpec,
        quality: QualityTarget,
        bitrate: Option<&str>,
    ) -> Result<ProcessedItem, ItemError> {
        let stem = self.temp_dir.join(format!("{}_temp_{}", job_id, index));
        let output_path = self
            .temp_dir
            .join(format!("{}_output_{}.{}", job_id, index, spec.name));

        let options = FetchOptions {
            output_stem: stem.clone(),
            quality,
            bitrate: bitrate.map(String::from),
        };
        let fetched = self.media.fetch(url, spec, &options).await?;

        self.store
            .update(job_id, |record| {
                record.set_progress(item_progress(index, total) + 20.0);
            })
            .await;

        if needs_transcode(&fetched.path, spec.name) {
            self.media
                .transcode(&fetched.path, &output_path, spec, bitrate)
                .await?;
        } else {
            // Already in the target container, move it into place
            rename_or_copy(&fetched.path, &output_path).await?;
        }

        self.sweep_temp_files(&stem, &output_path).await?;

        Ok(ProcessedItem {
            path: output_path,
            title: fetched
                .title
                .unwrap_or_else(|| format!("Unknown_{}", index + 1)),
            duration_secs: fetched.duration_secs,
        })
    }

    /// Remove leftover download files for one item's path stem.
    async fn sweep_temp_files(&self, stem: &Path, keep: &Path) -> Result<(), std::io::Error> {
        let prefix = match stem.file_name().and_then(|name| name.to_str()) {
            Some(prefix) => prefix,
            None => return Ok(()),
        };

        let mut entries = tokio::fs::read_dir(&self.temp_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(name) => name,
                None => continue,
            };
            if name.starts_with(prefix) && entry.path() != keep {
                let _ = tokio::fs::remove_file(entry.path()).await;
            }
        }
        Ok(())
    }
}

/// Display progress at the start of item `index` out of `total`. The first
/// ten percent covers acceptance and expansion, eighty percent is spread
/// over the items, and the last ten is packaging and completion.
fn item_progress(index: usize, total: usize) -> f32 {
    if total == 0 {
        return 10.0;
    }
    (index as f32 / total as f32) * 80.0 + 10.0
}

/// A download whose extension already matches the target needs no ffmpeg
/// pass. Comparison is case-insensitive.
fn needs_transcode(input: &Path, target_format: &str) -> bool {
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    ext.as_deref() != Some(target_format)
}

/// Move a file, falling back to copy-and-delete when rename fails, as it
/// does across filesystem boundaries.
async fn rename_or_copy(from: &Path, to: &Path) -> Result<(), std::io::Error> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(_) => {
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::testing::{FetchScript, ScriptedMedia};
    use crate::media::PlaylistExpansion;
    use proptest::prelude::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn make_config(temp: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.temp_dir = temp.path().to_path_buf();
        config
    }

    fn make_orchestrator(media: Arc<ScriptedMedia>, temp: &TempDir) -> Orchestrator {
        Orchestrator::new(media, &make_config(temp))
    }

    fn make_request(urls: &[&str], format: &str) -> SubmitRequest {
        SubmitRequest {
            urls: urls.iter().map(|url| url.to_string()).collect(),
            format: format.to_string(),
            quality: "best".to_string(),
            bitrate: None,
        }
    }

    async fn wait_for_terminal(orchestrator: &Orchestrator, job_id: &str) -> JobRecord {
        for _ in 0..400 {
            if let Some(record) = orchestrator.get_status(job_id).await {
                if record.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {} did not reach a terminal state", job_id);
    }

    fn archive_entry_names(path: &Path) -> Vec<String> {
        let file = std::fs::File::open(path).unwrap();
        let archive = zip::ZipArchive::new(file).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_url_list() {
        let temp = TempDir::new().unwrap();
        let orchestrator = make_orchestrator(ScriptedMedia::new(), &temp);

        let result = orchestrator.submit(make_request(&[], "mp3")).await;
        assert_eq!(result, Err(SubmitError::EmptySubmission));
    }

    #[tokio::test]
    async fn test_submit_returns_uuid_and_visible_record() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.deliver("https://example.com/a", "webm", "My Song");
        let orchestrator = make_orchestrator(media, &temp);

        let job_id = orchestrator
            .submit(make_request(&["https://example.com/a"], "mp3"))
            .await
            .unwrap();

        assert!(Uuid::parse_str(&job_id).is_ok());
        assert!(orchestrator.get_status(&job_id).await.is_some());
    }

    #[tokio::test]
    async fn test_single_item_success() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.deliver("https://example.com/a", "webm", "My Song");
        let orchestrator = make_orchestrator(media, &temp);

        let job_id = orchestrator
            .submit(make_request(&["https://example.com/a"], "mp3"))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;

        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.progress, 100.0);
        assert_eq!(record.processed_count, 1);
        assert_eq!(record.output_kind, Some(OutputKind::Single));
        assert_eq!(record.display_title.as_deref(), Some("My Song"));
        assert!(record.error.is_none());

        let expected = temp.path().join(format!("{}_output_0.mp3", job_id));
        assert_eq!(record.output_path, Some(expected.clone()));
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn test_transcode_path_replaces_download() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.deliver("https://example.com/a", "webm", "Track");
        let orchestrator = make_orchestrator(media, &temp);

        let job_id = orchestrator
            .submit(make_request(&["https://example.com/a"], "mp3"))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;

        let output = record.output_path.unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "transcoded media");
        // The webm download is swept once converted
        assert!(!temp.path().join(format!("{}_temp_0.webm", job_id)).exists());
    }

    #[tokio::test]
    async fn test_extension_match_skips_transcode() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.deliver("https://example.com/a", "mp3", "Track");
        let orchestrator = make_orchestrator(media, &temp);

        let job_id = orchestrator
            .submit(make_request(&["https://example.com/a"], "mp3"))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;

        // Renamed into place, not re-encoded
        let output = record.output_path.unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "scripted media");
        assert!(!temp.path().join(format!("{}_temp_0.mp3", job_id)).exists());
    }

    #[tokio::test]
    async fn test_unsupported_format_fails_before_any_fetch() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        let orchestrator = make_orchestrator(media.clone(), &temp);

        let job_id = orchestrator
            .submit(make_request(&["https://example.com/a"], "mp5"))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;

        assert_eq!(record.status, JobStatus::Error);
        assert_eq!(record.error.as_deref(), Some("Unsupported format: mp5"));
        assert!(media.fetch_calls().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failures_produce_archive_of_survivors() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.deliver("https://example.com/a", "webm", "Song A");
        media.script("https://example.com/b", FetchScript::Fail);
        media.deliver("https://example.com/c", "webm", "Song C");
        let orchestrator = make_orchestrator(media, &temp);

        let job_id = orchestrator
            .submit(make_request(
                &[
                    "https://example.com/a",
                    "https://example.com/b",
                    "https://example.com/c",
                ],
                "mp3",
            ))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;

        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.processed_count, 2);
        assert_eq!(record.output_kind, Some(OutputKind::Archive));
        assert_eq!(record.display_title.as_deref(), Some("2 files"));

        let zip_path = temp.path().join(format!("{}_archive.zip", job_id));
        assert_eq!(record.output_path, Some(zip_path.clone()));
        assert_eq!(
            archive_entry_names(&zip_path),
            vec!["001_Song A.mp3", "002_Song C.mp3"]
        );

        // Itemized outputs are folded into the archive
        assert!(!temp.path().join(format!("{}_output_0.mp3", job_id)).exists());
        assert!(!temp.path().join(format!("{}_output_2.mp3", job_id)).exists());
    }

    #[tokio::test]
    async fn test_all_items_failing_errors_the_job() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.script("https://example.com/a", FetchScript::Fail);
        media.script("https://example.com/b", FetchScript::Fail);
        let orchestrator = make_orchestrator(media, &temp);

        let job_id = orchestrator
            .submit(make_request(
                &["https://example.com/a", "https://example.com/b"],
                "mp3",
            ))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;

        assert_eq!(record.status, JobStatus::Error);
        assert_eq!(
            record.error.as_deref(),
            Some("No files were successfully processed")
        );
        assert!(record.output_path.is_none());
        assert!(record.progress < 100.0);
    }

    #[tokio::test]
    async fn test_failed_transcode_counts_as_item_failure() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.script(
            "https://example.com/bad",
            FetchScript::DeliverUntranscodable { ext: "webm".to_string() },
        );
        media.deliver("https://example.com/good", "webm", "Survivor");
        let orchestrator = make_orchestrator(media, &temp);

        let job_id = orchestrator
            .submit(make_request(
                &["https://example.com/bad", "https://example.com/good"],
                "mp3",
            ))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;

        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.processed_count, 1);
        assert_eq!(record.output_kind, Some(OutputKind::Single));
        assert_eq!(record.display_title.as_deref(), Some("Survivor"));
    }

    #[tokio::test]
    async fn test_missing_title_falls_back_to_item_number() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.script(
            "https://example.com/untitled",
            FetchScript::Deliver { ext: "webm".to_string(), title: None },
        );
        let orchestrator = make_orchestrator(media, &temp);

        let job_id = orchestrator
            .submit(make_request(&["https://example.com/untitled"], "mp3"))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;

        assert_eq!(record.display_title.as_deref(), Some("Unknown_1"));
    }

    #[tokio::test]
    async fn test_playlist_url_expands_into_entries() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.script_playlist(PlaylistExpansion {
            title: "Road Mix".to_string(),
            entries: vec![
                "https://example.com/e1".to_string(),
                "https://example.com/e2".to_string(),
            ],
            total_count: 7,
        });
        media.deliver("https://example.com/e1", "webm", "First");
        media.deliver("https://example.com/e2", "webm", "Second");
        let orchestrator = make_orchestrator(media.clone(), &temp);

        let job_id = orchestrator
            .submit(make_request(
                &["https://example.com/playlist?list=PL1"],
                "mp3",
            ))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;

        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(
            record.playlist,
            Some(PlaylistInfo { title: "Road Mix".to_string(), entry_count: 7 })
        );
        assert_eq!(record.total_items, 2);
        assert_eq!(record.output_kind, Some(OutputKind::Archive));
        assert_eq!(
            media.fetch_calls(),
            vec!["https://example.com/e1", "https://example.com/e2"]
        );
    }

    #[tokio::test]
    async fn test_playlist_entries_are_capped() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        let entries: Vec<String> = (0..5)
            .map(|n| format!("https://example.com/e{}", n))
            .collect();
        media.script_playlist(PlaylistExpansion {
            title: "Big Mix".to_string(),
            entries: entries.clone(),
            total_count: 5,
        });
        for entry in &entries {
            media.deliver(entry, "webm", "Entry");
        }

        let mut config = make_config(&temp);
        config.limits.playlist_max_entries = 2;
        let orchestrator = Orchestrator::new(media.clone(), &config);

        let job_id = orchestrator
            .submit(make_request(&["https://example.com/sets/big"], "mp3"))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;

        assert_eq!(record.total_items, 2);
        assert_eq!(record.playlist.as_ref().map(|p| p.entry_count), Some(5));
        assert_eq!(media.fetch_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_expansion_falls_back_to_single_item() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        // No scripted expansion, so the probe reports a single item
        media.deliver("https://example.com/watch?v=a&list=PL1", "webm", "Solo");
        let orchestrator = make_orchestrator(media.clone(), &temp);

        let job_id = orchestrator
            .submit(make_request(
                &["https://example.com/watch?v=a&list=PL1"],
                "mp3",
            ))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;

        assert_eq!(record.status, JobStatus::Completed);
        assert!(record.playlist.is_none());
        assert_eq!(record.output_kind, Some(OutputKind::Single));
        assert_eq!(
            media.fetch_calls(),
            vec!["https://example.com/watch?v=a&list=PL1"]
        );
    }

    #[tokio::test]
    async fn test_empty_expansion_leaves_nothing_to_process() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.script_playlist(PlaylistExpansion {
            title: "Empty".to_string(),
            entries: Vec::new(),
            total_count: 0,
        });
        let orchestrator = make_orchestrator(media, &temp);

        let job_id = orchestrator
            .submit(make_request(&["https://example.com/album/empty"], "mp3"))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;

        assert_eq!(record.status, JobStatus::Error);
        assert_eq!(
            record.error.as_deref(),
            Some("No files were successfully processed")
        );
    }

    #[tokio::test]
    async fn test_multi_url_submissions_are_never_expanded() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.script_playlist(PlaylistExpansion {
            title: "Should Not Be Used".to_string(),
            entries: vec!["https://example.com/elsewhere".to_string()],
            total_count: 1,
        });
        media.deliver("https://example.com/sets/a", "webm", "A");
        media.deliver("https://example.com/b", "webm", "B");
        let orchestrator = make_orchestrator(media.clone(), &temp);

        let job_id = orchestrator
            .submit(make_request(
                &["https://example.com/sets/a", "https://example.com/b"],
                "mp3",
            ))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;

        assert!(record.playlist.is_none());
        assert_eq!(
            media.fetch_calls(),
            vec!["https://example.com/sets/a", "https://example.com/b"]
        );
    }

    #[tokio::test]
    async fn test_get_output_path_requires_completion() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.script("https://example.com/a", FetchScript::Fail);
        let orchestrator = make_orchestrator(media, &temp);

        let job_id = orchestrator
            .submit(make_request(&["https://example.com/a"], "mp3"))
            .await
            .unwrap();
        wait_for_terminal(&orchestrator, &job_id).await;
        assert_eq!(orchestrator.get_output_path(&job_id).await, None);

        // A record that has a path but is not completed yet exposes nothing
        let mut staged = JobRecord::new("staged".to_string(), vec!["https://x".to_string()]);
        staged.output_path = Some(temp.path().join("staged_output_0.mp3"));
        orchestrator.store.insert(staged).await;
        assert_eq!(orchestrator.get_output_path("staged").await, None);

        assert_eq!(orchestrator.get_output_path("unknown").await, None);
    }

    #[tokio::test]
    async fn test_cleanup_removes_artifact_and_record() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.deliver("https://example.com/a", "webm", "Track");
        let orchestrator = make_orchestrator(media, &temp);

        let job_id = orchestrator
            .submit(make_request(&["https://example.com/a"], "mp3"))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;
        let output = record.output_path.unwrap();
        assert!(output.exists());

        orchestrator.cleanup(&job_id).await;
        assert!(!output.exists());
        assert!(orchestrator.get_status(&job_id).await.is_none());

        // Running it again is harmless
        orchestrator.cleanup(&job_id).await;
    }

    #[tokio::test]
    async fn test_cleanup_survives_already_deleted_artifact() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.deliver("https://example.com/a", "webm", "Track");
        let orchestrator = make_orchestrator(media, &temp);

        let job_id = orchestrator
            .submit(make_request(&["https://example.com/a"], "mp3"))
            .await
            .unwrap();
        let record = wait_for_terminal(&orchestrator, &job_id).await;
        std::fs::remove_file(record.output_path.unwrap()).unwrap();

        orchestrator.cleanup(&job_id).await;
        assert!(orchestrator.get_status(&job_id).await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_jobs_without_output() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.script("https://example.com/a", FetchScript::Fail);
        let orchestrator = make_orchestrator(media, &temp);

        let job_id = orchestrator
            .submit(make_request(&["https://example.com/a"], "mp3"))
            .await
            .unwrap();
        wait_for_terminal(&orchestrator, &job_id).await;

        orchestrator.cleanup(&job_id).await;
        // Failed jobs stay pollable
        assert!(orchestrator.get_status(&job_id).await.is_some());

        let active = JobRecord::new("active".to_string(), vec!["https://x".to_string()]);
        orchestrator.store.insert(active).await;
        orchestrator.cleanup("active").await;
        assert!(orchestrator.get_status("active").await.is_some());
    }

    #[tokio::test]
    async fn test_validate_url_requires_scheme_and_host() {
        let temp = TempDir::new().unwrap();
        let orchestrator = make_orchestrator(ScriptedMedia::new(), &temp);

        assert!(orchestrator.validate_url("https://example.com/watch?v=1").await);
        assert!(!orchestrator.validate_url("notaurl").await);
        assert!(!orchestrator.validate_url("").await);
        assert!(!orchestrator.validate_url("mailto:user@example.com").await);
        assert!(!orchestrator.validate_url("file:///tmp/x").await);
    }

    #[tokio::test]
    async fn test_validate_url_defers_to_prober() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.refuse_probe("https://unreachable.example.com/x");
        let orchestrator = make_orchestrator(media, &temp);

        assert!(!orchestrator.validate_url("https://unreachable.example.com/x").await);
    }

    #[tokio::test]
    async fn test_probe_surfaces_metadata() {
        let temp = TempDir::new().unwrap();
        let media = ScriptedMedia::new();
        media.refuse_probe("https://unreachable.example.com/x");
        let orchestrator = make_orchestrator(media, &temp);

        let metadata = orchestrator.probe("https://example.com/ok").await.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Example Media"));
        assert!(orchestrator.probe("https://unreachable.example.com/x").await.is_none());
    }

    #[tokio::test]
    async fn test_list_formats_shape() {
        let temp = TempDir::new().unwrap();
        let orchestrator = make_orchestrator(ScriptedMedia::new(), &temp);

        let listing = orchestrator.list_formats();
        assert!(listing.get("mp3").is_some());
        assert_eq!(listing["mp3"]["type"], "audio");
    }

    #[test]
    fn test_item_progress_spread() {
        assert_eq!(item_progress(0, 1), 10.0);
        assert_eq!(item_progress(0, 4), 10.0);
        assert_eq!(item_progress(1, 4), 30.0);
        assert_eq!(item_progress(2, 4), 50.0);
        assert_eq!(item_progress(3, 4), 70.0);
    }

    #[test]
    fn test_needs_transcode_extension_compare() {
        assert!(needs_transcode(Path::new("/tmp/a.webm"), "mp3"));
        assert!(!needs_transcode(Path::new("/tmp/a.mp3"), "mp3"));
        assert!(!needs_transcode(Path::new("/tmp/a.MP3"), "mp3"));
        assert!(needs_transcode(Path::new("/tmp/noext"), "mp3"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // *For any* item position, the starting progress stays within the
        // band reserved for item work, and later items start further along.
        #[test]
        fn prop_item_progress_band(total in 1usize..200, index in 0usize..200) {
            prop_assume!(index < total);
            let progress = item_progress(index, total);

            prop_assert!(progress >= 10.0);
            prop_assert!(progress < 90.0);
            if index + 1 < total {
                prop_assert!(item_progress(index + 1, total) > progress);
            }
        }
    }
}
