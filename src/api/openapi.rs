//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the arcade-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the arcade-dl REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "arcade-dl REST API",
        version = "0.1.0",
        description = "Start and cancel downloads, manage providers and extract archives, with live progress over Server-Sent Events",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790/api/v1", description = "Local development server")
    ),
    paths(
        // Downloads
        crate::api::routes::list_active_downloads,
        crate::api::routes::list_all_downloads,
        crate::api::routes::start_download,
        crate::api::routes::get_download,
        crate::api::routes::cancel_download,
        crate::api::routes::extract_download,
        crate::api::routes::get_extraction,
        crate::api::routes::retry_persist,

        // Plugins
        crate::api::routes::list_plugins,
        crate::api::routes::install_plugin,
        crate::api::routes::remove_plugin,

        // Games
        crate::api::routes::list_games,
        crate::api::routes::get_game,
        crate::api::routes::register_manual_download,
        crate::api::routes::save_launch_config,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
        crate::api::routes::shutdown,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::JobId,
        crate::types::JobKind,
        crate::types::JobStatus,
        crate::types::Job,
        crate::types::ArchiveType,
        crate::types::LaunchMethod,
        crate::types::LaunchConfig,
        crate::types::GameRecord,
        crate::types::EventKind,
        crate::types::Event,

        // Provider manifests
        crate::plugins::ProviderDescriptor,
        crate::plugins::ProviderType,
        crate::plugins::PluginFunction,
        crate::plugins::ScriptLanguage,

        // Config types from config.rs
        crate::config::Config,
        crate::config::DownloadConfig,
        crate::config::ExtractionConfig,
        crate::config::PluginConfig,
        crate::config::EventConfig,
        crate::config::PersistenceConfig,
        crate::config::ServerIntegrationConfig,
        crate::config::ApiConfig,
        crate::config::FileCollisionAction,

        // API request/response types from routes
        crate::api::routes::StartDownloadRequest,
        crate::api::routes::StartDownloadResponse,
        crate::api::routes::ExtractRequest,
        crate::api::routes::ManualDownloadRequest,
        crate::api::routes::LaunchConfigRequest,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "downloads", description = "Download jobs - Start, cancel, inspect and extract"),
        (name = "plugins", description = "Providers - List, install and remove host plugins"),
        (name = "games", description = "Game library - Saved downloads and their launch settings"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events, shutdown"),
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_has_every_route() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&str> = spec.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/api/v1/downloads",
            "/api/v1/downloads/all",
            "/api/v1/downloads/{id}",
            "/api/v1/downloads/{id}/extract",
            "/api/v1/plugins",
            "/api/v1/plugins/{id}",
            "/api/v1/games",
            "/api/v1/games/manual",
            "/api/v1/games/{id}/launch-config",
            "/api/v1/events",
            "/api/v1/health",
        ] {
            assert!(paths.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_openapi_spec_has_components() {
        let components = ApiDoc::openapi().components.unwrap();

        for schema in ["Job", "GameRecord", "ProviderDescriptor", "Event", "ApiError"] {
            assert!(
                components.schemas.contains_key(schema),
                "missing schema {}",
                schema
            );
        }
    }

    #[test]
    fn test_openapi_spec_tags_and_info() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "arcade-dl REST API");

        let tags = spec.tags.unwrap();
        let tag_names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tag_names, vec!["downloads", "plugins", "games", "system"]);
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = serde_json::to_value(ApiDoc::openapi()).expect("Should serialize to JSON");
        let version = json.get("openapi").and_then(|v| v.as_str()).unwrap();
        assert!(version.starts_with("3."), "Should use OpenAPI 3.x version");
    }
}
