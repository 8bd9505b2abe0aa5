//! HTTP request layer.
//!
//! A thin JSON surface over the orchestrator: submissions come in on
//! `/convert`, everything else reads or disposes of job state. Handlers hold
//! no state of their own beyond the shared [`Orchestrator`] handle.

use crate::job::{JobRecord, JobStatus, OutputKind, PlaylistInfo};
use crate::orchestrator::{Orchestrator, SubmitError, SubmitRequest};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use thiserror::Error;
use tokio_util::io::ReaderStream;
use tracing::info;

/// Errors that can occur when running the api server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
}

fn default_format() -> String {
    "mp3".to_string()
}

fn default_quality() -> String {
    "best".to_string()
}

/// Body of a POST /convert submission. A single `url` takes precedence over
/// the batch `urls` list.
#[derive(Debug, Deserialize)]
struct ConvertRequest {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    urls: Vec<String>,
    #[serde(default = "default_format")]
    format: String,
    #[serde(default = "default_quality")]
    quality: String,
    #[serde(default)]
    bitrate: Option<String>,
}

/// Wire form of a job record. Server-local paths stay out of it; clients get
/// at the artifact through the download endpoint instead.
#[derive(Debug, Serialize)]
struct StatusResponse {
    job_id: String,
    status: JobStatus,
    progress: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    current_index: usize,
    total_items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    playlist: Option<PlaylistInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_kind: Option<OutputKind>,
    processed_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

impl From<JobRecord> for StatusResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.id,
            status: record.status,
            progress: record.progress,
            error: record.error,
            current_index: record.current_index,
            total_items: record.total_items,
            playlist: record.playlist,
            output_kind: record.output_kind,
            processed_count: record.processed_count,
            title: record.display_title,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InfoQuery {
    url: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// The submitted URL set: one trimmed `url`, or the `urls` list with blank
/// entries dropped.
fn collect_urls(request: &ConvertRequest) -> Vec<String> {
    let single = request.url.as_deref().map(str::trim).unwrap_or("");
    if !single.is_empty() {
        return vec![single.to_string()];
    }
    request
        .urls
        .iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .map(String::from)
        .collect()
}

/// Handler for POST /convert. Validates every URL before a job id is
/// allocated, so a rejected submission leaves no record behind.
async fn convert(
    State(orchestrator): State<Orchestrator>,
    Json(payload): Json<ConvertRequest>,
) -> Response {
    let urls = collect_urls(&payload);
    if urls.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "URL or URLs are required");
    }

    for url in &urls {
        if !orchestrator.validate_url(url).await {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid or unsupported URL: {}", url),
            );
        }
    }

    let request = SubmitRequest {
        urls,
        format: payload.format.to_lowercase(),
        quality: payload.quality,
        bitrate: payload.bitrate,
    };

    match orchestrator.submit(request).await {
        Ok(job_id) => Json(json!({
            "success": true,
            "job_id": job_id,
            "message": "Conversion started successfully"
        }))
        .into_response(),
        Err(SubmitError::EmptySubmission) => {
            error_response(StatusCode::BAD_REQUEST, "URL or URLs are required")
        }
    }
}

/// Handler for GET /status/:job_id
async fn job_status(
    State(orchestrator): State<Orchestrator>,
    Path(job_id): Path<String>,
) -> Response {
    match orchestrator.get_status(&job_id).await {
        Some(record) => Json(StatusResponse::from(record)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "not_found", "error": "Job not found" })),
        )
            .into_response(),
    }
}

/// Handler for GET /download/:job_id. Streams the finished artifact from
/// disk as an attachment named after the file; archives can run well past
/// what a request should buffer in memory.
async fn download(
    State(orchestrator): State<Orchestrator>,
    Path(job_id): Path<String>,
) -> Response {
    let path = match orchestrator.get_output_path(&job_id).await {
        Some(path) => path,
        None => return error_response(StatusCode::NOT_FOUND, "File not found or expired"),
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(_) => return error_response(StatusCode::NOT_FOUND, "File not found or expired"),
    };

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());

    let body = Body::from_stream(ReaderStream::new(file));

    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

/// Handler for POST /cleanup/:job_id
async fn cleanup_job(
    State(orchestrator): State<Orchestrator>,
    Path(job_id): Path<String>,
) -> Json<Value> {
    orchestrator.cleanup(&job_id).await;
    Json(json!({ "success": true }))
}

/// Handler for GET /formats
async fn formats_catalog(State(orchestrator): State<Orchestrator>) -> Json<Value> {
    Json(json!({ "success": true, "formats": orchestrator.list_formats() }))
}

/// Handler for GET /info?url=
async fn media_info(
    State(orchestrator): State<Orchestrator>,
    Query(query): Query<InfoQuery>,
) -> Response {
    match orchestrator.probe(&query.url).await {
        Some(metadata) => Json(json!({
            "title": metadata.title.unwrap_or_else(|| "Unknown".to_string()),
            "duration": format_duration(metadata.duration_secs),
            "uploader": metadata.uploader.unwrap_or_else(|| "Unknown".to_string()),
            "thumbnail": metadata.thumbnail,
            "description": metadata.description.unwrap_or_default(),
        }))
        .into_response(),
        None => error_response(
            StatusCode::BAD_REQUEST,
            &format!("Invalid or unsupported URL: {}", query.url),
        ),
    }
}

/// Render a duration in seconds as "MM:SS", or "HH:MM:SS" from one hour up.
/// Missing or zero durations come out as "Unknown".
fn format_duration(duration_secs: Option<f64>) -> String {
    let duration = match duration_secs {
        Some(duration) if duration > 0.0 => duration,
        _ => return "Unknown".to_string(),
    };

    let total = duration as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Creates the axum Router with all api endpoints
pub fn create_router(orchestrator: Orchestrator) -> Router {
    Router::new()
        .route("/convert", post(convert))
        .route("/status/:job_id", get(job_status))
        .route("/download/:job_id", get(download))
        .route("/cleanup/:job_id", post(cleanup_job))
        .route("/formats", get(formats_catalog))
        .route("/info", get(media_info))
        .with_state(orchestrator)
}

/// Runs the api server on the given address until it shuts down.
pub async fn run_server(orchestrator: Orchestrator, addr: SocketAddr) -> Result<(), ServerError> {
    let app = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "api listening");
    axum::serve(listener, app).await?;

    Ok(())
}
