//! Core types shared across the library

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Unique identifier for a job
///
/// Either supplied by the caller or generated as a v4 UUID. Download and extraction
/// work for the same item share the id so that all of its events correlate.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a JobId from a caller-supplied string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for JobId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for JobId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for JobId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// What a job does
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Fetch a resource through a provider
    Download,
    /// Unpack a completed archive
    Extraction,
}

/// Job status
///
/// `Pending -> Running -> {Completed | Failed | Cancelled}`; terminal states are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, transfer task not yet running
    Pending,
    /// Transfer or extraction in progress
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Stopped on request
    Cancelled,
}

impl JobStatus {
    /// Whether no further transitions can occur
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Lowercase name, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a job
///
/// Invariants: `path` is set iff `status == Completed`; `error` is set iff
/// `status == Failed`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Job {
    /// Job id
    pub id: JobId,
    /// Download or extraction
    pub kind: JobKind,
    /// Source URL (downloads only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Display/destination filename, never empty
    pub filename: String,
    /// Provider that serves the transfer (downloads only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Current status
    pub status: JobStatus,
    /// Progress percentage (0.0 to 100.0), non-decreasing while running
    pub progress: f32,
    /// Bytes (downloads) or entries (extractions) processed so far
    pub processed: u64,
    /// Total bytes or entries, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Result path: the downloaded file, or the extraction output directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the transfer completed but its record could not be written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_error: Option<String>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// New pending download job
    pub fn download(id: JobId, url: String, filename: String, provider_id: String) -> Self {
        Self {
            id,
            kind: JobKind::Download,
            url: Some(url),
            filename,
            provider_id: Some(provider_id),
            status: JobStatus::Pending,
            progress: 0.0,
            processed: 0,
            total: None,
            path: None,
            error: None,
            persist_error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Completed download rebuilt from its stored record
    pub fn restored(record: &GameRecord) -> Self {
        Self {
            id: record.id.clone(),
            kind: JobKind::Download,
            url: None,
            filename: record.filename.clone(),
            provider_id: None,
            status: JobStatus::Completed,
            progress: 100.0,
            processed: 0,
            total: None,
            path: Some(record.path.clone()),
            error: None,
            persist_error: None,
            created_at: record.downloaded_at,
            finished_at: Some(record.downloaded_at),
        }
    }

    /// New running extraction job for `archive`
    pub fn extraction(id: JobId, archive: &std::path::Path) -> Self {
        let filename = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| archive.display().to_string());

        Self {
            id,
            kind: JobKind::Extraction,
            url: None,
            filename,
            provider_id: None,
            status: JobStatus::Running,
            progress: 0.0,
            processed: 0,
            total: None,
            path: None,
            error: None,
            persist_error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Archive type detected by file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// RAR archive (.rar, .r00)
    Rar,
    /// 7-Zip archive (.7z)
    SevenZip,
    /// ZIP archive (.zip)
    Zip,
}

/// How a saved game is launched
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMethod {
    /// Execute the binary directly
    Direct,
    /// Run through a Python interpreter
    Python,
    /// Run through Wine
    Wine,
    /// Run `custom_command`
    Custom,
}

/// Launch settings stored alongside a game record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LaunchConfig {
    /// Executable or script to start
    pub executable_path: String,
    /// Launch strategy
    pub launch_method: LaunchMethod,
    /// Command line used with [`LaunchMethod::Custom`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_command: Option<String>,
}

/// Durable record of a completed download
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GameRecord {
    /// Job id that produced the record
    pub id: JobId,
    /// File name on disk
    pub filename: String,
    /// Absolute path of the downloaded file
    pub path: PathBuf,
    /// Whether the archive has been extracted
    pub extracted: bool,
    /// Extraction output directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_path: Option<PathBuf>,
    /// When the download completed
    pub downloaded_at: DateTime<Utc>,
    /// Launch settings, set by the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_config: Option<LaunchConfig>,
    /// Icon shown by the library view
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<PathBuf>,
}

impl GameRecord {
    /// Fresh, unextracted record for a completed file
    pub fn completed(id: JobId, filename: String, path: PathBuf) -> Self {
        Self {
            id,
            filename,
            path,
            extracted: false,
            extracted_path: None,
            downloaded_at: Utc::now(),
            launch_config: None,
            icon_path: None,
        }
    }
}

/// Coarse classification of an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Intermediate progress
    Progress,
    /// Terminal: success
    Completed,
    /// Terminal: failure
    Failed,
    /// Terminal: cancelled
    Cancelled,
}

/// Event published on the progress bus
///
/// For a given job, subscribers observe `progress*` followed by exactly one terminal
/// event per unit of work (download, then optionally extraction).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Download progress update
    DownloadProgress {
        /// Job id
        id: JobId,
        /// Percentage (0.0 to 100.0); `None` when the total size is unknown
        progress: Option<f32>,
        /// Bytes written so far
        downloaded_bytes: u64,
        /// Total size from the provider, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        total_bytes: Option<u64>,
    },

    /// Download finished and the file is in place
    DownloadComplete {
        /// Job id
        id: JobId,
        /// Final file name
        filename: String,
        /// Final path
        path: PathBuf,
    },

    /// Download failed
    DownloadError {
        /// Job id
        id: JobId,
        /// Human-readable message
        error: String,
    },

    /// Download was cancelled
    DownloadCancelled {
        /// Job id
        id: JobId,
    },

    /// Extraction progress update
    ExtractionProgress {
        /// Job id
        id: JobId,
        /// Percentage (0.0 to 100.0); `None` when the entry count is unknown
        progress: Option<f32>,
    },

    /// Extraction finished
    ExtractionComplete {
        /// Job id
        id: JobId,
        /// Directory the archive was unpacked into
        output_dir: PathBuf,
    },

    /// Extraction failed
    ExtractionFailed {
        /// Job id
        id: JobId,
        /// Human-readable message
        error: String,
    },
}

impl Event {
    /// Job the event belongs to
    pub fn job_id(&self) -> &JobId {
        match self {
            Event::DownloadProgress { id, .. }
            | Event::DownloadComplete { id, .. }
            | Event::DownloadError { id, .. }
            | Event::DownloadCancelled { id }
            | Event::ExtractionProgress { id, .. }
            | Event::ExtractionComplete { id, .. }
            | Event::ExtractionFailed { id, .. } => id,
        }
    }

    /// Progress, completed, failed or cancelled
    pub fn kind(&self) -> EventKind {
        match self {
            Event::DownloadProgress { .. } | Event::ExtractionProgress { .. } => {
                EventKind::Progress
            }
            Event::DownloadComplete { .. } | Event::ExtractionComplete { .. } => {
                EventKind::Completed
            }
            Event::DownloadError { .. } | Event::ExtractionFailed { .. } => EventKind::Failed,
            Event::DownloadCancelled { .. } => EventKind::Cancelled,
        }
    }

    /// Whether this is the last event of its unit of work
    pub fn is_terminal(&self) -> bool {
        self.kind() != EventKind::Progress
    }

    /// Event name used by the view layer
    pub fn wire_name(&self) -> &'static str {
        match self {
            Event::DownloadProgress { .. } => "download-progress",
            Event::DownloadComplete { .. } => "download-complete",
            Event::DownloadError { .. } => "download-error",
            Event::DownloadCancelled { .. } => "cancel-download",
            Event::ExtractionProgress { .. }
            | Event::ExtractionComplete { .. }
            | Event::ExtractionFailed { .. } => "extraction-progress",
        }
    }

    /// Payload shape expected by the view layer for [`Event::wire_name`]
    ///
    /// The view layer reads `progress` as a number, so indeterminate progress
    /// has no wire form and yields `None`.
    pub fn wire_payload(&self) -> Option<serde_json::Value> {
        use serde_json::json;

        let payload = match self {
            Event::DownloadProgress { progress: None, .. } => return None,
            Event::DownloadProgress {
                id,
                progress: Some(progress),
                ..
            } => json!({
                "id": id,
                "progress": progress,
            }),
            Event::DownloadComplete { id, filename, path } => json!({
                "id": id,
                "filename": filename,
                "path": path,
            }),
            Event::DownloadError { id, error } => json!({
                "id": id,
                "error": error,
            }),
            Event::DownloadCancelled { id } => json!({
                "download_id": id,
            }),
            Event::ExtractionProgress { progress: None, .. } => return None,
            Event::ExtractionProgress {
                id,
                progress: Some(progress),
            } => json!({
                "downloadId": id,
                "status": "extracting",
                "progress": progress,
            }),
            Event::ExtractionComplete { id, .. } => json!({
                "downloadId": id,
                "status": "completed",
                "progress": 100.0,
            }),
            Event::ExtractionFailed { id, error } => json!({
                "downloadId": id,
                "status": "failed",
                "progress": 0.0,
                "error": error,
            }),
        };
        Some(payload)
    }
}
