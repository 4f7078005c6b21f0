//! Error types for arcade-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Job, Transfer, Extraction, Storage)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//! - Context information (job ID, provider, host, file path)

use crate::types::{JobId, JobStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for arcade-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for arcade-dl
///
/// Errors raised while *creating* work (resolution, validation, lookups) are returned
/// directly to the caller. Errors raised while a job *executes* are captured on the job
/// and published as a terminal event instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.chunk_size")
        key: Option<String>,
    },

    /// Persistence operation failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// SQLx database error
    #[error("storage error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Job lookup or state transition error
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// Transfer failure (network, HTTP status, provider, write)
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Archive extraction failure
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// No registered provider can serve the URL's host
    #[error("no provider registered for host '{host}' ({url})")]
    NoProvider {
        /// The URL that could not be resolved
        url: String,
        /// The hostname parsed from the URL (empty if the URL had none)
        host: String,
    },

    /// A provider with the same id is already registered
    #[error("provider '{id}' is already registered")]
    DuplicateProvider {
        /// The conflicting provider id
        id: String,
    },

    /// Provider descriptor failed validation
    #[error("invalid provider manifest: {reason}")]
    InvalidManifest {
        /// Why the manifest was rejected
        reason: String,
    },

    /// Provider id not registered
    #[error("provider '{id}' not found")]
    PluginNotFound {
        /// The provider id that was not found
        id: String,
    },

    /// Out-of-process provider failed to run or returned unusable output
    #[error("plugin error: {0}")]
    Plugin(String),

    /// Archive format cannot be determined from its extension
    #[error("unsupported archive format: {path}")]
    UnsupportedFormat {
        /// The archive path whose extension is not supported
        path: PathBuf,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic lookup failure
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Persistence-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Job lookup and state-machine errors
#[derive(Debug, Error)]
pub enum JobError {
    /// Job id unknown to this process
    #[error("job {id} not found")]
    NotFound {
        /// The job ID that was not found
        id: JobId,
    },

    /// Job already reached a terminal state
    #[error("job {id} is already {status}")]
    AlreadyTerminal {
        /// The job ID
        id: JobId,
        /// The terminal status it holds
        status: JobStatus,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} job {id} in state {current_state}")]
    InvalidState {
        /// The job ID
        id: JobId,
        /// The operation that was attempted (e.g., "extract", "retry_persist")
        operation: String,
        /// The state that prevents the operation
        current_state: String,
    },
}

/// Errors raised while moving bytes from a provider to disk
#[derive(Debug, Error)]
pub enum TransferError {
    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// The requested URL
        url: String,
        /// The HTTP status code
        status: u16,
    },

    /// Byte stream broke off mid-transfer
    #[error("stream interrupted: {reason}")]
    Interrupted {
        /// Underlying cause
        reason: String,
    },

    /// Writing or finalizing the output file failed
    #[error("failed to write {path}: {reason}")]
    Write {
        /// The file being written
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// Provider reported a failure
    #[error("provider '{provider}' failed: {reason}")]
    Provider {
        /// Provider id
        provider: String,
        /// Underlying cause
        reason: String,
    },

    /// Provider claimed a result file that does not exist
    #[error("provider output {path} does not exist")]
    MissingOutput {
        /// The path reported by the provider
        path: PathBuf,
    },

    /// Destination already occupied and the collision policy forbids replacing it
    #[error("file collision at {path}: {reason}")]
    FileCollision {
        /// The path where the collision occurred
        path: PathBuf,
        /// The reason for the collision (e.g., "file already exists")
        reason: String,
    },

    /// Destination path could not be derived
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The invalid path
        path: PathBuf,
        /// The reason the path is invalid
        reason: String,
    },
}

/// Archive extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Archive is corrupt, truncated or uses an unsupported codec
    #[error("extraction failed for {archive}: {reason}")]
    Failed {
        /// The archive file that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// An entry tried to escape the output directory
    #[error("path traversal in {archive}: entry {entry} escapes the output directory")]
    PathTraversal {
        /// The archive containing the entry
        archive: PathBuf,
        /// The offending entry name
        entry: String,
    },
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "job_not_found",
///     "message": "job error: job 3f2c not found",
///     "details": {
///       "job_id": "3f2c"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "no_provider")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context (job_id, plugin_id, host, path)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Config { .. } => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::PluginNotFound { .. } => 404,
            Error::Job(JobError::NotFound { .. }) => 404,
            Error::Storage(StorageError::NotFound(_)) => 404,

            // 409 Conflict
            Error::DuplicateProvider { .. } => 409,
            Error::Job(JobError::AlreadyTerminal { .. }) => 409,
            Error::Job(JobError::InvalidState { .. }) => 409,
            Error::Transfer(TransferError::FileCollision { .. }) => 409,

            // 422 Unprocessable Entity
            Error::NoProvider { .. } => 422,
            Error::InvalidManifest { .. } => 422,
            Error::UnsupportedFormat { .. } => 422,
            Error::Extraction(_) => 422,
            Error::Transfer(TransferError::InvalidPath { .. }) => 422,

            // 500 Internal Server Error
            Error::Storage(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - upstream host or plugin failed
            Error::Transfer(_) => 502,
            Error::Network(_) => 502,
            Error::Plugin(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Storage(StorageError::NotFound(_)) => "record_not_found",
            Error::Storage(_) => "storage_error",
            Error::Sqlx(_) => "storage_error",
            Error::Job(e) => match e {
                JobError::NotFound { .. } => "job_not_found",
                JobError::AlreadyTerminal { .. } => "already_terminal",
                JobError::InvalidState { .. } => "invalid_state",
            },
            Error::Transfer(e) => match e {
                TransferError::HttpStatus { .. } => "http_status",
                TransferError::Interrupted { .. } => "transfer_interrupted",
                TransferError::Write { .. } => "write_failed",
                TransferError::Provider { .. } => "provider_failed",
                TransferError::MissingOutput { .. } => "missing_output",
                TransferError::FileCollision { .. } => "file_collision",
                TransferError::InvalidPath { .. } => "invalid_path",
            },
            Error::Extraction(e) => match e {
                ExtractionError::Failed { .. } => "extraction_failed",
                ExtractionError::PathTraversal { .. } => "path_traversal",
            },
            Error::NoProvider { .. } => "no_provider",
            Error::DuplicateProvider { .. } => "duplicate_provider",
            Error::InvalidManifest { .. } => "invalid_manifest",
            Error::PluginNotFound { .. } => "plugin_not_found",
            Error::Plugin(_) => "plugin_error",
            Error::UnsupportedFormat { .. } => "unsupported_format",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Job(JobError::NotFound { id }) => Some(serde_json::json!({
                "job_id": id,
            })),
            Error::Job(JobError::AlreadyTerminal { id, status }) => Some(serde_json::json!({
                "job_id": id,
                "status": status,
            })),
            Error::Job(JobError::InvalidState {
                id,
                operation,
                current_state,
            }) => Some(serde_json::json!({
                "job_id": id,
                "operation": operation,
                "current_state": current_state,
            })),
            Error::NoProvider { url, host } => Some(serde_json::json!({
                "url": url,
                "host": host,
            })),
            Error::DuplicateProvider { id } | Error::PluginNotFound { id } => {
                Some(serde_json::json!({
                    "plugin_id": id,
                }))
            }
            Error::UnsupportedFormat { path } => Some(serde_json::json!({
                "path": path,
            })),
            Error::Transfer(TransferError::FileCollision { path, .. }) => {
                Some(serde_json::json!({
                    "path": path,
                }))
            }
            Error::Extraction(ExtractionError::Failed { archive, .. }) => {
                Some(serde_json::json!({
                    "archive": archive,
                }))
            }
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
