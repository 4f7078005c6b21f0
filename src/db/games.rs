//! Game records: the durable trace of completed downloads.

use crate::error::StorageError;
use crate::types::{GameRecord, JobId, LaunchConfig};
use crate::{Error, Result};
use std::path::Path;

use super::{Database, GameRow};

const SELECT_GAME: &str = r#"
    SELECT id, filename, path, extracted, extracted_path, downloaded_at, launch_config, icon_path
    FROM games
"#;

impl Database {
    /// Insert or replace a game record
    pub async fn upsert_game(&self, record: &GameRecord) -> Result<()> {
        let launch_config = record
            .launch_config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now = chrono::Utc::now().timestamp();

        let _writer = self.write_lock.lock().await;
        sqlx::query(
            r#"
            INSERT INTO games (
                id, filename, path, extracted, extracted_path,
                downloaded_at, launch_config, icon_path, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                path = excluded.path,
                extracted = excluded.extracted,
                extracted_path = excluded.extracted_path,
                downloaded_at = excluded.downloaded_at,
                launch_config = excluded.launch_config,
                icon_path = excluded.icon_path,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.id.as_str())
        .bind(&record.filename)
        .bind(record.path.to_string_lossy().into_owned())
        .bind(record.extracted)
        .bind(
            record
                .extracted_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        )
        .bind(record.downloaded_at.timestamp())
        .bind(launch_config)
        .bind(
            record
                .icon_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Storage(StorageError::QueryFailed(format!(
                "Failed to upsert game {}: {}",
                record.id, e
            )))
        })?;

        Ok(())
    }

    /// Get a game record by id
    pub async fn get_game(&self, id: &JobId) -> Result<Option<GameRecord>> {
        let row = sqlx::query_as::<_, GameRow>(&format!("{} WHERE id = ?", SELECT_GAME))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Storage(StorageError::QueryFailed(format!(
                    "Failed to get game {}: {}",
                    id, e
                )))
            })?;

        row.map(GameRecord::try_from).transpose()
    }

    /// List all game records, oldest download first
    pub async fn list_games(&self) -> Result<Vec<GameRecord>> {
        let rows = sqlx::query_as::<_, GameRow>(&format!(
            "{} ORDER BY downloaded_at ASC, rowid ASC",
            SELECT_GAME
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Storage(StorageError::QueryFailed(format!(
                "Failed to list games: {}",
                e
            )))
        })?;

        rows.into_iter().map(GameRecord::try_from).collect()
    }

    /// Mark a game as extracted into `output_dir`
    ///
    /// Returns `false` if no record exists for `id`.
    pub async fn mark_extracted(&self, id: &JobId, output_dir: &Path) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let _writer = self.write_lock.lock().await;
        let result = sqlx::query(
            r#"
            UPDATE games
            SET extracted = 1, extracted_path = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(output_dir.to_string_lossy().into_owned())
        .bind(now)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Storage(StorageError::QueryFailed(format!(
                "Failed to mark game {} extracted: {}",
                id, e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Store launch settings, and the icon when one is given
    ///
    /// Returns `false` if no record exists for `id`.
    pub async fn set_launch_config(
        &self,
        id: &JobId,
        launch_config: &LaunchConfig,
        icon_path: Option<&Path>,
    ) -> Result<bool> {
        let config_json = serde_json::to_string(launch_config)?;
        let now = chrono::Utc::now().timestamp();

        let _writer = self.write_lock.lock().await;
        let result = sqlx::query(
            r#"
            UPDATE games
            SET launch_config = ?, icon_path = COALESCE(?, icon_path), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(config_json)
        .bind(icon_path.map(|p| p.to_string_lossy().into_owned()))
        .bind(now)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Storage(StorageError::QueryFailed(format!(
                "Failed to save launch config for game {}: {}",
                id, e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }
}
