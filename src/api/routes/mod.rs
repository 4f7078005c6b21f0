//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`downloads`] - Starting, cancelling, inspecting and extracting jobs
//! - [`plugins`] - Provider management
//! - [`games`] - The saved game library
//! - [`system`] - Health, events, OpenAPI, shutdown

use crate::types::{JobId, LaunchConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod downloads;
mod games;
mod plugins;
mod system;

pub use downloads::*;
pub use games::*;
pub use plugins::*;
pub use system::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Request body for POST /downloads
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct StartDownloadRequest {
    /// URL to download
    pub url: String,
    /// Destination filename; derived from the response or URL when omitted
    #[serde(default)]
    pub filename: Option<String>,
    /// Provider id to use instead of resolving by host
    #[serde(default)]
    pub provider: Option<String>,
    /// Caller-chosen job id
    #[serde(default)]
    pub id: Option<JobId>,
}

/// Response for POST /downloads
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct StartDownloadResponse {
    /// Id of the created job
    pub id: JobId,
}

/// Request body for POST /downloads/:id/extract
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ExtractRequest {
    /// Archive to unpack; defaults to the job's downloaded file
    #[serde(default)]
    pub archive_path: Option<PathBuf>,
    /// Directory to unpack into
    pub output_dir: PathBuf,
}

/// Request body for POST /games/manual
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ManualDownloadRequest {
    /// Id to record the file under; generated when omitted
    #[serde(default)]
    pub id: Option<JobId>,
    /// Display filename
    pub filename: String,
    /// Location of the file on disk
    pub path: PathBuf,
}

/// Request body for PUT /games/:id/launch-config
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct LaunchConfigRequest {
    /// Launch settings
    #[serde(flatten)]
    pub launch_config: LaunchConfig,
    /// Icon shown in the library
    #[serde(default)]
    pub icon_path: Option<PathBuf>,
}

/// Query parameters for GET /events
#[derive(Debug, Default, Deserialize, Serialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// Only stream events for this job
    #[serde(default)]
    pub job_id: Option<String>,
}
