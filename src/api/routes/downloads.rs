//! Download job handlers.

use super::{ExtractRequest, StartDownloadRequest, StartDownloadResponse};
use crate::api::AppState;
use crate::types::JobId;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// GET /downloads - List active jobs
#[utoipa::path(
    get,
    path = "/api/v1/downloads",
    tag = "downloads",
    responses(
        (status = 200, description = "Jobs that have not reached a terminal state", body = Vec<crate::types::Job>)
    )
)]
pub async fn list_active_downloads(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.downloader.list_active())
}

/// GET /downloads/all - List every job
#[utoipa::path(
    get,
    path = "/api/v1/downloads/all",
    tag = "downloads",
    responses(
        (status = 200, description = "Every job known to this process, in creation order", body = Vec<crate::types::Job>)
    )
)]
pub async fn list_all_downloads(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.downloader.list_jobs())
}

/// POST /downloads - Start a download
#[utoipa::path(
    post,
    path = "/api/v1/downloads",
    tag = "downloads",
    request_body = StartDownloadRequest,
    responses(
        (status = 201, description = "Job created", body = StartDownloadResponse),
        (status = 404, description = "Named provider not registered", body = crate::error::ApiError),
        (status = 409, description = "Job id already in use", body = crate::error::ApiError),
        (status = 422, description = "No provider serves the URL's host", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<StartDownloadRequest>,
) -> Response {
    let id = request.id.unwrap_or_else(JobId::generate);

    match state
        .downloader
        .start_with_id(
            id,
            &request.url,
            request.filename.as_deref(),
            request.provider.as_deref(),
        )
        .await
    {
        Ok(id) => (StatusCode::CREATED, Json(StartDownloadResponse { id })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /downloads/:id - Get a single job
#[utoipa::path(
    get,
    path = "/api/v1/downloads/{id}",
    tag = "downloads",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job snapshot", body = crate::types::Job),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn get_download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.downloader.query(&JobId::new(id)) {
        Ok(job) => Json(job).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /downloads/:id - Cancel a download
#[utoipa::path(
    delete,
    path = "/api/v1/downloads/{id}",
    tag = "downloads",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 204, description = "Download cancelled"),
        (status = 404, description = "Job not found", body = crate::error::ApiError),
        (status = 409, description = "Job already finished", body = crate::error::ApiError)
    )
)]
pub async fn cancel_download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.downloader.cancel(&JobId::new(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /downloads/:id/extract - Extract the job's archive
#[utoipa::path(
    post,
    path = "/api/v1/downloads/{id}/extract",
    tag = "downloads",
    params(
        ("id" = String, Path, description = "Job ID used to report extraction progress")
    ),
    request_body = ExtractRequest,
    responses(
        (status = 202, description = "Extraction started; progress arrives as extraction-progress events"),
        (status = 404, description = "No archive known for the job", body = crate::error::ApiError),
        (status = 409, description = "An extraction for this job is already running", body = crate::error::ApiError),
        (status = 422, description = "Unsupported archive format", body = crate::error::ApiError)
    )
)]
pub async fn extract_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ExtractRequest>,
) -> Response {
    let id = JobId::new(id);

    let archive = match request.archive_path {
        Some(path) => path,
        None => match state.downloader.archive_path_for(&id).await {
            Ok(path) => path,
            Err(e) => return e.into_response(),
        },
    };

    match state
        .downloader
        .extract(&id, &archive, &request.output_dir)
        .await
    {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "id": id,
                "archive_path": archive,
                "output_dir": request.output_dir,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /downloads/:id/extraction - Extraction status
#[utoipa::path(
    get,
    path = "/api/v1/downloads/{id}/extraction",
    tag = "downloads",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Latest extraction tracked for the job", body = crate::types::Job),
        (status = 404, description = "No extraction for this job", body = crate::error::ApiError)
    )
)]
pub async fn get_extraction(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.downloader.extraction_status(&JobId::new(id)) {
        Ok(job) => Json(job).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /downloads/:id/persist - Retry writing the game record
#[utoipa::path(
    post,
    path = "/api/v1/downloads/{id}/persist",
    tag = "downloads",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Record stored", body = crate::types::GameRecord),
        (status = 404, description = "Job not found", body = crate::error::ApiError),
        (status = 409, description = "Job has not completed", body = crate::error::ApiError),
        (status = 500, description = "Store still failing", body = crate::error::ApiError)
    )
)]
pub async fn retry_persist(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.downloader.retry_persist(&JobId::new(id)).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => e.into_response(),
    }
}
