//! Database layer for arcade-dl
//!
//! SQLite persistence for game records (completed downloads) and runtime state.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`games`] - Game record upserts and lookups
//! - [`state`] - Runtime state (shutdown tracking)
//!
//! Every write goes through a single writer lock and is committed with
//! `synchronous = FULL` before the call returns; reads run concurrently on the pool.

use crate::error::{Error, StorageError};
use crate::types::{GameRecord, JobId, LaunchConfig};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;
use tokio::sync::Mutex;

mod games;
mod migrations;
mod state;

/// Game record row as stored
#[derive(Debug, Clone, FromRow)]
pub struct GameRow {
    /// Job id that produced the record
    pub id: String,
    /// File name on disk
    pub filename: String,
    /// Path of the downloaded file
    pub path: String,
    /// Whether the archive has been extracted
    pub extracted: bool,
    /// Extraction output directory
    pub extracted_path: Option<String>,
    /// Unix timestamp of completion
    pub downloaded_at: i64,
    /// Launch config as JSON
    pub launch_config: Option<String>,
    /// Icon path
    pub icon_path: Option<String>,
}

impl TryFrom<GameRow> for GameRecord {
    type Error = Error;

    fn try_from(row: GameRow) -> Result<Self, Self::Error> {
        let launch_config = row
            .launch_config
            .as_deref()
            .map(serde_json::from_str::<LaunchConfig>)
            .transpose()
            .map_err(|e| {
                Error::Storage(StorageError::QueryFailed(format!(
                    "Corrupt launch config for game {}: {}",
                    row.id, e
                )))
            })?;

        Ok(GameRecord {
            id: JobId(row.id),
            filename: row.filename,
            path: PathBuf::from(row.path),
            extracted: row.extracted,
            extracted_path: row.extracted_path.map(PathBuf::from),
            downloaded_at: DateTime::<Utc>::from_timestamp(row.downloaded_at, 0)
                .unwrap_or_default(),
            launch_config,
            icon_path: row.icon_path.map(PathBuf::from),
        })
    }
}

/// Database handle for arcade-dl
pub struct Database {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
