//! Provider management handlers.

use crate::api::AppState;
use crate::plugins::ProviderDescriptor;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /plugins - List registered providers
#[utoipa::path(
    get,
    path = "/api/v1/plugins",
    tag = "plugins",
    responses(
        (status = 200, description = "Providers in registration order", body = Vec<ProviderDescriptor>)
    )
)]
pub async fn list_plugins(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.downloader.get_all_plugins())
}

/// POST /plugins - Install a provider manifest
#[utoipa::path(
    post,
    path = "/api/v1/plugins",
    tag = "plugins",
    request_body = ProviderDescriptor,
    responses(
        (status = 201, description = "Provider registered", body = ProviderDescriptor),
        (status = 409, description = "Provider id already registered", body = crate::error::ApiError),
        (status = 422, description = "Invalid manifest", body = crate::error::ApiError)
    )
)]
pub async fn install_plugin(
    State(state): State<AppState>,
    Json(descriptor): Json<ProviderDescriptor>,
) -> Response {
    match state.downloader.install_plugin(descriptor) {
        Ok(installed) => (StatusCode::CREATED, Json(installed)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /plugins/:id - Remove a provider
#[utoipa::path(
    delete,
    path = "/api/v1/plugins/{id}",
    tag = "plugins",
    params(
        ("id" = String, Path, description = "Provider ID")
    ),
    responses(
        (status = 200, description = "Provider removed", body = ProviderDescriptor),
        (status = 404, description = "Provider not found", body = crate::error::ApiError)
    )
)]
pub async fn remove_plugin(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.downloader.remove_plugin(&id) {
        Ok(removed) => Json(removed).into_response(),
        Err(e) => e.into_response(),
    }
}
