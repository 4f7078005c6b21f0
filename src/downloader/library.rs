//! Game library and plugin management.

use crate::error::{Error, JobError, Result};
use crate::plugins::ProviderDescriptor;
use crate::types::{GameRecord, Job, JobId, JobStatus, LaunchConfig};
use std::path::Path;

use super::Downloader;

impl Downloader {
    /// Record a file that was downloaded outside the core (e.g. through a browser)
    ///
    /// The file must exist. The record is stored like one produced by a completed
    /// download, and the job shows up in [`list_jobs`](Self::list_jobs).
    pub async fn register_manual_download(
        &self,
        id: &JobId,
        filename: &str,
        path: &Path,
    ) -> Result<GameRecord> {
        if !path.is_file() {
            return Err(Error::NotFound(format!("file {}", path.display())));
        }

        let record = GameRecord::completed(id.clone(), filename.to_string(), path.to_path_buf());
        self.db.upsert_game(&record).await?;
        self.jobs.restore_download(Job::restored(&record));

        tracing::info!(job_id = %id, path = %path.display(), "manual download registered");
        Ok(record)
    }

    /// Store launch settings (and optionally an icon) for a saved game
    ///
    /// Fails with [`Error::NotFound`] if there is no record for `id`.
    pub async fn save_launch_config(
        &self,
        id: &JobId,
        launch_config: &LaunchConfig,
        icon_path: Option<&Path>,
    ) -> Result<GameRecord> {
        if !self
            .db
            .set_launch_config(id, launch_config, icon_path)
            .await?
        {
            return Err(Error::NotFound(format!("game {}", id)));
        }

        self.game(id).await
    }

    /// Every saved game, oldest first
    pub async fn saved_games(&self) -> Result<Vec<GameRecord>> {
        self.db.list_games().await
    }

    /// One saved game
    pub async fn game(&self, id: &JobId) -> Result<GameRecord> {
        self.db
            .get_game(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("game {}", id)))
    }

    /// Write the record of a completed download again
    ///
    /// For jobs whose snapshot carries a `persist_error`. Clears it on success.
    /// A record that already exists is returned unchanged.
    pub async fn retry_persist(&self, id: &JobId) -> Result<GameRecord> {
        let job = self
            .jobs
            .get_download(id)
            .ok_or_else(|| JobError::NotFound { id: id.clone() })?;

        let path = match (job.status, job.path) {
            (JobStatus::Completed, Some(path)) => path,
            (status, _) => {
                return Err(JobError::InvalidState {
                    id: id.clone(),
                    operation: "retry_persist".to_string(),
                    current_state: status.to_string(),
                }
                .into());
            }
        };

        if let Some(existing) = self.db.get_game(id).await? {
            self.jobs.set_persist_error(id, None);
            return Ok(existing);
        }

        let record = GameRecord::completed(id.clone(), job.filename, path);
        self.db.upsert_game(&record).await?;
        self.jobs.set_persist_error(id, None);

        tracing::info!(job_id = %id, "game record written on retry");
        Ok(record)
    }

    /// Every registered provider, in registration order
    pub fn get_all_plugins(&self) -> Vec<ProviderDescriptor> {
        self.registry.list_all()
    }

    /// Validate and register a provider manifest
    ///
    /// Fails with `DuplicateProvider` if the id is taken and `InvalidManifest`
    /// if validation or provider construction fails.
    pub fn install_plugin(&self, descriptor: ProviderDescriptor) -> Result<ProviderDescriptor> {
        let id = descriptor.id.clone();
        self.registry.register(descriptor)?;
        self.registry.get(&id).map(|entry| entry.descriptor)
    }

    /// Unregister a provider
    ///
    /// Jobs already resolved to it keep running. Fails with `PluginNotFound` if
    /// no provider has this id.
    pub fn remove_plugin(&self, id: &str) -> Result<ProviderDescriptor> {
        self.registry.remove(id)
    }
}
