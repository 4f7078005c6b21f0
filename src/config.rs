//! Configuration types for arcade-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Smallest accepted transfer chunk
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;

/// Download behavior configuration (directories, chunking, concurrency)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Directory for in-flight `.part` files (default: "./temp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Bytes buffered before each write and progress event (default: 256 KiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum concurrently running transfers (None = unbounded)
    #[serde(default)]
    pub max_concurrent_downloads: Option<usize>,

    /// User-Agent sent by the direct HTTP provider
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// TCP connect timeout for the direct HTTP provider (default: 30s)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// File collision handling
    #[serde(default)]
    pub file_collision: FileCollisionAction,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            temp_dir: default_temp_dir(),
            chunk_size: default_chunk_size(),
            max_concurrent_downloads: None,
            user_agent: default_user_agent(),
            connect_timeout: default_connect_timeout(),
            file_collision: FileCollisionAction::default(),
        }
    }
}

/// Archive extraction configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ExtractionConfig {
    /// Maximum depth for nested archive extraction (default: 0, nested archives are left alone)
    #[serde(default)]
    pub max_recursion_depth: u32,

    /// File extensions to treat as archives when looking for nested archives
    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 0,
            archive_extensions: default_archive_extensions(),
        }
    }
}

/// Provider plugin configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PluginConfig {
    /// Directory scanned for `*.json` manifests at startup
    #[serde(default)]
    pub plugins_dir: Option<PathBuf>,

    /// Host patterns served by the built-in direct HTTP provider
    #[serde(default)]
    pub direct_hosts: Vec<String>,

    /// Whether to search PATH for plugin interpreters and external binaries (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Upper bound on a single plugin invocation (default: 1 hour)
    #[serde(default = "default_plugin_timeout", with = "duration_serde")]
    pub plugin_timeout: Duration,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            plugins_dir: None,
            direct_hosts: Vec::new(),
            search_path: true,
            plugin_timeout: default_plugin_timeout(),
        }
    }
}

/// Progress bus configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EventConfig {
    /// Undelivered events per subscriber before a backlog warning is logged (default: 1000)
    #[serde(default = "default_backlog_warn_threshold")]
    pub backlog_warn_threshold: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            backlog_warn_threshold: default_backlog_warn_threshold(),
        }
    }
}

/// File collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename (default)
    #[default]
    Rename,
    /// Overwrite existing file
    Overwrite,
    /// Fail the job, keep existing
    Skip,
}

/// Main configuration for [`Downloader`](crate::Downloader)
///
/// Fields are organized into sub-configs:
/// - [`download`](DownloadConfig) - directories, chunking, concurrency
/// - [`extraction`](ExtractionConfig) - nested archive handling
/// - [`plugins`](PluginConfig) - manifest directory, direct hosts, plugin timeouts
/// - [`events`](EventConfig) - subscriber backlog warnings
/// - [`persistence`](PersistenceConfig) - database location
/// - [`server`](ServerIntegrationConfig) - REST API
///
/// `download`, `extraction` and `server` are flattened so their fields sit at the
/// top level of the serialized form.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Archive extraction
    #[serde(flatten)]
    pub extraction: ExtractionConfig,

    /// Provider plugins
    #[serde(default)]
    pub plugins: PluginConfig,

    /// Progress bus
    #[serde(default)]
    pub events: EventConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// API and external server integration
    #[serde(flatten)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Temporary directory
    pub fn temp_dir(&self) -> &PathBuf {
        &self.download.temp_dir
    }

    /// Reject settings the downloader cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.chunk_size < MIN_CHUNK_SIZE {
            return Err(Error::Config {
                message: format!(
                    "chunk_size must be at least {} bytes, got {}",
                    MIN_CHUNK_SIZE, self.download.chunk_size
                ),
                key: Some("chunk_size".to_string()),
            });
        }

        if self.download.max_concurrent_downloads == Some(0) {
            return Err(Error::Config {
                message: "max_concurrent_downloads must be greater than zero when set".to_string(),
                key: Some("max_concurrent_downloads".to_string()),
            });
        }

        for pattern in &self.plugins.direct_hosts {
            if !crate::plugins::is_valid_host_pattern(&pattern.trim().to_ascii_lowercase()) {
                return Err(Error::Config {
                    message: format!("invalid direct host pattern '{}'", pattern),
                    key: Some("plugins.direct_hosts".to_string()),
                });
            }
        }

        Ok(())
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./arcade-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./temp")
}

fn default_chunk_size() -> usize {
    256 * 1024
}

fn default_user_agent() -> String {
    format!("arcade-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./arcade-dl.db")
}

fn default_true() -> bool {
    true
}

fn default_archive_extensions() -> Vec<String> {
    vec!["rar".into(), "zip".into(), "7z".into()]
}

fn default_plugin_timeout() -> Duration {
    Duration::from_secs(3600)
}

fn default_backlog_warn_threshold() -> usize {
    1000
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
