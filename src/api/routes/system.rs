//! System handlers: health, OpenAPI, events, shutdown.

use super::EventsQuery;
use crate::api::AppState;
use crate::types::JobId;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::StreamExt;

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "active_jobs": state.downloader.list_active().len(),
        "plugins": state.downloader.registry().len(),
    }))
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/api/v1/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI 3.1 specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}

/// GET /events - Server-sent events stream
///
/// Each SSE event is named after the event (`download-progress`, `download-complete`,
/// `download-error`, `cancel-download`, `extraction-progress`) and carries its
/// JSON payload as data.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "system",
    params(EventsQuery),
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream")
    )
)]
pub async fn event_stream(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let subscription = match query.job_id.filter(|id| !id.is_empty()) {
        Some(id) => state.downloader.subscribe_job(&JobId::new(id)),
        None => state.downloader.subscribe(),
    };
    tracing::debug!(topic = ?subscription.topic(), "SSE client connected");

    // Indeterminate progress has no wire form and is skipped
    let sse_stream = subscription.filter_map(|event| {
        let payload = event.wire_payload()?;
        Some(Ok(SseEvent::default()
            .event(event.wire_name())
            .data(payload.to_string())))
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

/// POST /shutdown - Graceful shutdown
///
/// Cancels running downloads and stops accepting work. The process itself keeps
/// running; the embedding application decides when to exit.
#[utoipa::path(
    post,
    path = "/api/v1/shutdown",
    tag = "system",
    responses(
        (status = 202, description = "Shutdown initiated")
    )
)]
pub async fn shutdown(State(state): State<AppState>) -> impl IntoResponse {
    // Respond first, drain in the background
    tokio::spawn(async move {
        if let Err(e) = state.downloader.shutdown().await {
            tracing::error!(error = %e, "Error during graceful shutdown");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({"status": "shutdown initiated"})),
    )
}
