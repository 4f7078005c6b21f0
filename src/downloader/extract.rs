//! Archive extraction jobs.

use crate::error::{Error, JobError, Result};
use crate::extraction::{ProgressFn, extract_recursive, supported_archive_type};
use crate::types::{Job, JobId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::Downloader;

impl Downloader {
    /// Unpack `archive` into `output_dir`, reporting under job `id`
    ///
    /// The format is chosen by extension and checked before anything is
    /// scheduled: an unsupported archive fails here and publishes nothing.
    /// Otherwise the extraction runs in the background and ends with exactly one
    /// `extraction-progress` event of status `completed` or `failed`.
    ///
    /// On success the game record for `id` (if any) is marked extracted; on
    /// failure it is left untouched so the extraction can be retried.
    /// Extractions cannot be cancelled.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedFormat`] for an unknown or disabled extension
    /// - `JobError::InvalidState` while an extraction for `id` is already running
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun
    pub async fn extract(&self, id: &JobId, archive: &Path, output_dir: &Path) -> Result<()> {
        supported_archive_type(archive, &self.config.extraction)?;

        if !self.tasks.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        self.jobs.begin_extraction(id, archive)?;
        tracing::info!(
            job_id = %id,
            archive = %archive.display(),
            output_dir = %output_dir.display(),
            "extraction started"
        );

        let downloader = self.clone();
        let id = id.clone();
        let archive = archive.to_path_buf();
        let output_dir = output_dir.to_path_buf();
        tokio::spawn(async move {
            downloader.run_extraction(id, archive, output_dir).await;
        });

        Ok(())
    }

    async fn run_extraction(&self, id: JobId, archive: PathBuf, output_dir: PathBuf) {
        let jobs = self.jobs.clone();
        let progress_id = id.clone();
        let progress: ProgressFn = Arc::new(move |done: u64, total: Option<u64>| {
            jobs.record_extraction_progress(&progress_id, done, total);
        });

        match extract_recursive(&archive, &output_dir, &self.config.extraction, 0, progress).await
        {
            Ok(files) => {
                match self.db.mark_extracted(&id, &output_dir).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::debug!(job_id = %id, "no game record to mark as extracted")
                    }
                    Err(e) => tracing::warn!(
                        job_id = %id,
                        error = %e,
                        "extraction finished but the game record could not be updated"
                    ),
                }

                tracing::info!(
                    job_id = %id,
                    files = files.len(),
                    output_dir = %output_dir.display(),
                    "extraction completed"
                );
                self.jobs.complete_extraction(&id, output_dir);
            }
            Err(e) => {
                tracing::warn!(job_id = %id, archive = %archive.display(), error = %e, "extraction failed");
                self.jobs
                    .fail_extraction(&id, format!("extraction of {} failed: {}", id, e));
            }
        }
    }

    /// Archive to extract for `id` when the caller gives no explicit path
    ///
    /// Uses the completed download's path, then the stored game record.
    pub async fn archive_path_for(&self, id: &JobId) -> Result<PathBuf> {
        if let Some(path) = self.jobs.get_download(id).and_then(|job| job.path) {
            return Ok(path);
        }

        self.db
            .get_game(id)
            .await?
            .map(|game| game.path)
            .ok_or_else(|| JobError::NotFound { id: id.clone() }.into())
    }

    /// Snapshot of the extraction tracked for `id`
    pub fn extraction_status(&self, id: &JobId) -> Result<Job> {
        self.jobs
            .get_extraction(id)
            .ok_or_else(|| JobError::NotFound { id: id.clone() }.into())
    }
}
