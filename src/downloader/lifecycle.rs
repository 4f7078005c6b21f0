//! Startup restore and shutdown coordination.

use crate::error::Result;
use crate::types::Job;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::Downloader;

/// How long [`Downloader::shutdown`] waits for tasks to drain
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl Downloader {
    /// Rebuild completed download jobs from stored game records
    ///
    /// In-flight jobs do not survive a restart; only what reached the store does.
    /// Returns the number of jobs restored.
    pub async fn restore_completed_jobs(&self) -> Result<usize> {
        let games = self.db.list_games().await?;
        let count = games.len();

        for game in &games {
            self.jobs.restore_download(Job::restored(game));
        }

        if count > 0 {
            tracing::info!(count, "restored completed jobs from game records");
        }
        Ok(count)
    }

    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new downloads and extractions
    /// 2. Cancels every pending or running download (each publishes `cancelled`)
    /// 3. Waits up to 30 seconds for transfer and extraction tasks to exit
    /// 4. Marks a clean shutdown in the database
    ///
    /// # Errors
    ///
    /// Failures along the way are logged; the sequence always runs to the end.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.tasks.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        self.cancel_all().await;

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_tasks()).await {
            Ok(()) => tracing::info!("All active tasks finished"),
            Err(_) => {
                tracing::warn!("Timeout waiting for tasks to finish, proceeding with shutdown")
            }
        }

        if let Err(e) = self.db.set_clean_shutdown().await {
            tracing::error!(error = %e, "Failed to mark clean shutdown in database");
        } else {
            tracing::info!("Marked clean shutdown in database");
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Cancel every non-terminal download
    pub(crate) async fn cancel_all(&self) {
        let active = self.jobs.list_active();
        tracing::debug!(active_count = active.len(), "Cancelling active downloads");

        for job in active {
            if job.kind != crate::types::JobKind::Download {
                continue;
            }
            if let Err(e) = self.cancel(&job.id).await {
                // Lost the race against completion; nothing to do
                tracing::debug!(job_id = %job.id, error = %e, "job finished before it could be cancelled");
            }
        }
    }

    /// Wait until no transfer task or extraction is running
    async fn wait_for_active_tasks(&self) {
        loop {
            let downloads = self.tasks.active_downloads.lock().await.len();
            let extractions = self.jobs.running_extractions();

            if downloads == 0 && extractions == 0 {
                return;
            }

            tracing::debug!(downloads, extractions, "Waiting for active tasks to finish");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Run until SIGINT or SIGTERM (Ctrl+C elsewhere), then shut the downloader down
///
/// # Example
///
/// ```no_run
/// use arcade_dl::{Config, Downloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = Downloader::new(Config::default()).await?;
///     let _api = downloader.spawn_api_server();
///
///     run_with_shutdown(downloader).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: Downloader) -> Result<()> {
    wait_for_signal().await;
    tracing::info!("Shutdown signal received");
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler, waiting for Ctrl+C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
