//! Job control: start, cancel, query, list.

use crate::error::{Error, JobError, Result};
use crate::types::{Job, JobId};
use crate::utils::derive_filename;
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

use super::Downloader;
use super::transfer::TransferTask;

impl Downloader {
    /// Start a download and return its job id
    ///
    /// The provider is resolved from the URL's host unless `provider` names one
    /// explicitly. Resolution happens before anything is created: on error no job
    /// exists and no event is published. On success the job is Pending and its
    /// transfer runs in the background; watch it with [`subscribe_job`](Self::subscribe_job)
    /// or [`query`](Self::query).
    ///
    /// Two calls for the same URL create two independent jobs.
    ///
    /// # Errors
    ///
    /// - [`Error::NoProvider`] if no registered provider serves the URL's host
    /// - [`Error::PluginNotFound`] if `provider` is not registered
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use arcade_dl::*;
    /// # async fn example(downloader: Downloader) -> Result<()> {
    /// let id = downloader
    ///     .start("https://cdn.example.com/game.zip", None, None)
    ///     .await?;
    /// println!("started {}", id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start(
        &self,
        url: &str,
        filename: Option<&str>,
        provider: Option<&str>,
    ) -> Result<JobId> {
        self.start_with_id(JobId::generate(), url, filename, provider)
            .await
    }

    /// Like [`start`](Self::start), with a caller-supplied job id
    ///
    /// Fails with `InvalidState` if a job with this id already exists in this process.
    pub async fn start_with_id(
        &self,
        id: JobId,
        url: &str,
        filename: Option<&str>,
        provider: Option<&str>,
    ) -> Result<JobId> {
        if !self.tasks.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let entry = match provider {
            Some(provider_id) => self.registry.get(provider_id)?,
            None => self.registry.resolve_entry(url)?,
        };

        let display_name = derive_filename(filename, None, url);
        let job = Job::download(
            id.clone(),
            url.to_string(),
            display_name,
            entry.descriptor.id.clone(),
        );
        self.jobs.insert_download(job)?;

        let token = CancellationToken::new();
        self.tasks
            .active_downloads
            .lock()
            .await
            .insert(id.clone(), token.clone());

        tracing::info!(
            job_id = %id,
            url,
            provider = %entry.descriptor.id,
            "download job created"
        );

        let task = TransferTask {
            downloader: self.clone(),
            id: id.clone(),
            url: url.to_string(),
            filename: filename
                .filter(|name| !name.trim().is_empty())
                .map(str::to_string),
            entry,
            cancel: token,
        };
        tokio::spawn(task.run());

        Ok(id)
    }

    /// Cancel a pending or running download
    ///
    /// The job becomes Cancelled and its single `cancelled` event is published
    /// before this returns; the transfer task then stops at its next chunk boundary
    /// (or kills its plugin process) and removes the partial file.
    ///
    /// # Errors
    ///
    /// - `JobError::NotFound` for an unknown id
    /// - `JobError::AlreadyTerminal` if the job already finished, including when
    ///   its completion was claimed a moment before the cancel arrived
    pub async fn cancel(&self, id: &JobId) -> Result<()> {
        self.jobs.cancel(id)?;

        if let Some(token) = self.tasks.active_downloads.lock().await.get(id) {
            token.cancel();
        }

        tracing::info!(job_id = %id, "download cancelled");
        Ok(())
    }

    /// Current snapshot of a job
    ///
    /// Download jobs take precedence over an extraction tracked under the same id;
    /// use [`extraction_status`](Self::extraction_status) for the latter.
    pub fn query(&self, id: &JobId) -> Result<Job> {
        self.jobs
            .get(id)
            .ok_or_else(|| JobError::NotFound { id: id.clone() }.into())
    }

    /// Every job that has not reached a terminal state, in creation order
    pub fn list_active(&self) -> Vec<Job> {
        self.jobs.list_active()
    }

    /// Every job known to this process, in creation order
    ///
    /// Includes completed downloads restored from the store at startup.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.jobs.list()
    }
}
