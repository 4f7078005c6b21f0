//! Game library handlers.

use super::{LaunchConfigRequest, ManualDownloadRequest};
use crate::api::AppState;
use crate::types::JobId;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /games - List saved games
#[utoipa::path(
    get,
    path = "/api/v1/games",
    tag = "games",
    responses(
        (status = 200, description = "Saved games, oldest first", body = Vec<crate::types::GameRecord>),
        (status = 500, description = "Store unavailable", body = crate::error::ApiError)
    )
)]
pub async fn list_games(State(state): State<AppState>) -> Response {
    match state.downloader.saved_games().await {
        Ok(games) => Json(games).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /games/:id - Get a saved game
#[utoipa::path(
    get,
    path = "/api/v1/games/{id}",
    tag = "games",
    params(
        ("id" = String, Path, description = "Job ID the game was downloaded under")
    ),
    responses(
        (status = 200, description = "Saved game", body = crate::types::GameRecord),
        (status = 404, description = "No such game", body = crate::error::ApiError)
    )
)]
pub async fn get_game(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.downloader.game(&JobId::new(id)).await {
        Ok(game) => Json(game).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /games/manual - Register a manually downloaded file
#[utoipa::path(
    post,
    path = "/api/v1/games/manual",
    tag = "games",
    request_body = ManualDownloadRequest,
    responses(
        (status = 201, description = "Record created", body = crate::types::GameRecord),
        (status = 404, description = "File does not exist", body = crate::error::ApiError)
    )
)]
pub async fn register_manual_download(
    State(state): State<AppState>,
    Json(request): Json<ManualDownloadRequest>,
) -> Response {
    let id = request.id.unwrap_or_else(JobId::generate);

    match state
        .downloader
        .register_manual_download(&id, &request.filename, &request.path)
        .await
    {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// PUT /games/:id/launch-config - Save launch settings
#[utoipa::path(
    put,
    path = "/api/v1/games/{id}/launch-config",
    tag = "games",
    params(
        ("id" = String, Path, description = "Job ID the game was downloaded under")
    ),
    request_body = LaunchConfigRequest,
    responses(
        (status = 200, description = "Updated game", body = crate::types::GameRecord),
        (status = 404, description = "No such game", body = crate::error::ApiError)
    )
)]
pub async fn save_launch_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<LaunchConfigRequest>,
) -> Response {
    match state
        .downloader
        .save_launch_config(
            &JobId::new(id),
            &request.launch_config,
            request.icon_path.as_deref(),
        )
        .await
    {
        Ok(record) => Json(record).into_response(),
        Err(e) => e.into_response(),
    }
}
