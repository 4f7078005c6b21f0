//! REST API server module
//!
//! Exposes job control, plugin management, the game library and a Server-Sent
//! Events stream of progress under `/api/v1`, documented with OpenAPI.

use crate::{Config, Downloader, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Prefix every route is mounted under
pub const API_PREFIX: &str = "/api/v1";

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Downloads
/// - `GET /downloads` - List active jobs
/// - `GET /downloads/all` - List every job known to this process
/// - `POST /downloads` - Start a download
/// - `GET /downloads/:id` - Get a single job
/// - `DELETE /downloads/:id` - Cancel a download
/// - `POST /downloads/:id/extract` - Extract the job's archive
/// - `GET /downloads/:id/extraction` - Extraction status
/// - `POST /downloads/:id/persist` - Retry writing the game record
///
/// ## Plugins
/// - `GET /plugins` - List registered providers
/// - `POST /plugins` - Install a provider manifest
/// - `DELETE /plugins/:id` - Remove a provider
///
/// ## Games
/// - `GET /games` - List saved games
/// - `POST /games/manual` - Register a manually downloaded file
/// - `GET /games/:id` - Get a saved game
/// - `PUT /games/:id/launch-config` - Save launch settings
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
/// - `GET /events` - Server-sent events stream (`?job_id=` to watch one job)
/// - `POST /shutdown` - Graceful shutdown
pub fn create_router(downloader: Arc<Downloader>, config: Arc<Config>) -> Router {
    let state = AppState::new(downloader, config.clone());

    let api = Router::new()
        // Downloads
        .route("/downloads", get(routes::list_active_downloads))
        .route("/downloads", post(routes::start_download))
        .route("/downloads/all", get(routes::list_all_downloads))
        .route("/downloads/:id", get(routes::get_download))
        .route("/downloads/:id", delete(routes::cancel_download))
        .route("/downloads/:id/extract", post(routes::extract_download))
        .route("/downloads/:id/extraction", get(routes::get_extraction))
        .route("/downloads/:id/persist", post(routes::retry_persist))
        // Plugins
        .route("/plugins", get(routes::list_plugins))
        .route("/plugins", post(routes::install_plugin))
        .route("/plugins/:id", delete(routes::remove_plugin))
        // Games
        .route("/games", get(routes::list_games))
        .route("/games/manual", post(routes::register_manual_download))
        .route("/games/:id", get(routes::get_game))
        .route("/games/:id/launch-config", put(routes::save_launch_config))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream))
        .route("/shutdown", post(routes::shutdown));

    let router = Router::new().nest(API_PREFIX, api);

    // Swagger UI reads the spec from the endpoint above
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the listener fails or the task is aborted.
///
/// # Example
///
/// ```no_run
/// use arcade_dl::{Config, Downloader};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let downloader = Arc::new(Downloader::new((*config).clone()).await?);
///
/// // Blocks until the server stops
/// arcade_dl::api::start_api_server(downloader, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(downloader: Arc<Downloader>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.server.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(downloader, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
