//! The per-job transfer task.
//!
//! A task waits for a worker slot (when concurrency is bounded), asks its
//! provider for the content, streams bytes into `<temp_dir>/<job_id>.part`, then
//! moves the finished file into the download directory and records it. Partial
//! files never appear under the final name.

use crate::error::{Error, Result, TransferError};
use crate::plugins::{ACTION_DOWNLOAD, ByteSource, FetchOutcome, FetchRequest, RegisteredProvider};
use crate::types::{GameRecord, JobId};
use crate::utils::{derive_filename, get_unique_path, sanitize_filename};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::Downloader;

/// Where in the transfer an error happened
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Fetch,
    Transfer,
    Finalize,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::Fetch => "fetch",
            Phase::Transfer => "transfer",
            Phase::Finalize => "finalize",
        })
    }
}

type StepResult<T> = std::result::Result<T, (Phase, Error)>;

fn cancelled() -> Error {
    Error::Transfer(TransferError::Interrupted {
        reason: "cancelled".to_string(),
    })
}

/// Everything a spawned transfer needs
pub(crate) struct TransferTask {
    pub(crate) downloader: Downloader,
    pub(crate) id: JobId,
    pub(crate) url: String,
    /// Caller-supplied filename; wins over anything the provider suggests
    pub(crate) filename: Option<String>,
    pub(crate) entry: RegisteredProvider,
    pub(crate) cancel: CancellationToken,
}

impl TransferTask {
    /// Run the job to a terminal state
    pub(crate) async fn run(self) {
        let permit = match &self.downloader.tasks.concurrent_limit {
            Some(limit) => tokio::select! {
                permit = limit.clone().acquire_owned() => permit.ok(),
                _ = self.cancel.cancelled() => {
                    self.release().await;
                    return;
                }
            },
            None => None,
        };

        if self.downloader.jobs.mark_running(&self.id) {
            tracing::info!(job_id = %self.id, url = %self.url, "download started");
            self.execute().await;
        } else {
            tracing::debug!(job_id = %self.id, "job left pending before its task ran");
        }

        drop(permit);
        self.release().await;
    }

    async fn execute(&self) {
        let result = self.fetch_and_store().await;

        if let Err((phase, e)) = result {
            let message = format!("download {} failed during {}: {}", self.id, phase, e);
            if self.downloader.jobs.fail_download(&self.id, message) {
                tracing::warn!(job_id = %self.id, %phase, error = %e, "download failed");
            } else {
                tracing::debug!(job_id = %self.id, "transfer stopped after cancellation");
            }
        }

        self.cleanup().await;
    }

    async fn fetch_and_store(&self) -> StepResult<()> {
        let scratch = self.scratch_dir();
        tokio::fs::create_dir_all(&scratch)
            .await
            .map_err(|e| (Phase::Fetch, Error::Io(e)))?;

        let request = FetchRequest {
            job_id: self.id.clone(),
            action: ACTION_DOWNLOAD.to_string(),
            url: self.url.clone(),
            output_dir: scratch,
            cancel: self.cancel.clone(),
        };

        let outcome = tokio::select! {
            outcome = self.entry.provider.fetch(&request) => outcome.map_err(|e| (Phase::Fetch, e))?,
            _ = self.cancel.cancelled() => return Err((Phase::Fetch, cancelled())),
        };

        let (staged, suggested) = match outcome {
            FetchOutcome::Stream(source) => {
                let suggested = source.filename.clone();
                (self.write_stream(source).await?, suggested)
            }
            FetchOutcome::Redirect { url, filename } => {
                tracing::debug!(job_id = %self.id, %url, "provider resolved a direct link");
                let http = self.downloader.registry.http();
                let source = tokio::select! {
                    source = http.open(&url) => source.map_err(|e| (Phase::Fetch, e))?,
                    _ = self.cancel.cancelled() => return Err((Phase::Fetch, cancelled())),
                };
                let suggested = filename.or_else(|| source.filename.clone());
                (self.write_stream(source).await?, suggested)
            }
            FetchOutcome::File(path) => {
                if !path.is_file() {
                    return Err((
                        Phase::Fetch,
                        Error::Transfer(TransferError::MissingOutput { path }),
                    ));
                }
                let suggested = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned());
                if let Ok(meta) = tokio::fs::metadata(&path).await {
                    let size = meta.len();
                    self.downloader
                        .jobs
                        .record_download_progress(&self.id, size, Some(size));
                }
                (path, suggested)
            }
        };

        let filename = derive_filename(
            self.filename.as_deref().or(suggested.as_deref()),
            None,
            &self.url,
        );
        self.finalize(&staged, filename).await
    }

    /// Stream bytes into the `.part` file, publishing progress
    ///
    /// Progress is published once at least `chunk_size` new bytes are on disk,
    /// and once more at the end of the stream.
    async fn write_stream(&self, source: ByteSource) -> StepResult<PathBuf> {
        let part = self.part_path();
        let write_err = |e: std::io::Error| {
            (
                Phase::Transfer,
                Error::Transfer(TransferError::Write {
                    path: part.clone(),
                    reason: e.to_string(),
                }),
            )
        };

        let mut file = tokio::fs::File::create(&part).await.map_err(write_err)?;
        let ByteSource {
            total_bytes,
            mut stream,
            ..
        } = source;
        let chunk_size = self.downloader.config.download.chunk_size as u64;
        let mut written = 0u64;
        let mut reported = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err((Phase::Transfer, cancelled())),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| (Phase::Transfer, e))?;

            file.write_all(&chunk).await.map_err(write_err)?;
            written += chunk.len() as u64;
            tracing::debug!(job_id = %self.id, written, ?total_bytes, "chunk written");

            if written - reported >= chunk_size || total_bytes == Some(written) {
                self.downloader
                    .jobs
                    .record_download_progress(&self.id, written, total_bytes);
                reported = written;
            }
        }

        file.flush().await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        if let Some(total) = total_bytes
            && written < total
        {
            return Err((
                Phase::Transfer,
                Error::Transfer(TransferError::Interrupted {
                    reason: format!("stream ended after {} of {} bytes", written, total),
                }),
            ));
        }

        if written != reported {
            self.downloader
                .jobs
                .record_download_progress(&self.id, written, total_bytes);
        }

        Ok(part)
    }

    /// Move the staged file into place, record it and complete the job
    ///
    /// Completion is claimed only once the file sits at its final path, so a
    /// placement failure ends the job as Failed without a cancel ever having been
    /// refused. A cancel that wins while the file is being placed removes it again.
    async fn finalize(&self, staged: &Path, filename: String) -> StepResult<()> {
        let config = &self.downloader.config.download;
        let dest = {
            let _placement = self.downloader.tasks.placement.lock().await;
            if self.cancel.is_cancelled() {
                return Err((Phase::Finalize, cancelled()));
            }
            let dest = get_unique_path(&config.download_dir.join(&filename), config.file_collision)
                .map_err(|e| (Phase::Finalize, e))?;
            move_file(staged, &dest)
                .await
                .map_err(|e| (Phase::Finalize, e))?;

            if !self.downloader.jobs.begin_finalize(&self.id) {
                if let Err(e) = tokio::fs::remove_file(&dest).await {
                    tracing::warn!(
                        job_id = %self.id,
                        path = %dest.display(),
                        error = %e,
                        "failed to remove file of cancelled download"
                    );
                }
                return Err((Phase::Finalize, cancelled()));
            }
            dest
        };
        self.downloader.jobs.set_filename(&self.id, &filename);

        let record = GameRecord::completed(self.id.clone(), filename, dest.clone());
        let persist_error = match self.downloader.db.upsert_game(&record).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(
                    job_id = %self.id,
                    path = %dest.display(),
                    error = %e,
                    "download completed but its record could not be saved"
                );
                Some(e.to_string())
            }
        };

        tracing::info!(job_id = %self.id, path = %dest.display(), "download completed");
        self.downloader
            .jobs
            .complete_download(&self.id, dest, persist_error);
        Ok(())
    }

    fn part_path(&self) -> PathBuf {
        self.downloader
            .config
            .download
            .temp_dir
            .join(format!("{}.part", sanitize_filename(self.id.as_str())))
    }

    /// Directory out-of-process providers write into
    fn scratch_dir(&self) -> PathBuf {
        self.downloader
            .config
            .download
            .temp_dir
            .join(sanitize_filename(self.id.as_str()))
    }

    async fn cleanup(&self) {
        let part = self.part_path();
        match tokio::fs::remove_file(&part).await {
            Ok(()) => tracing::debug!(job_id = %self.id, path = %part.display(), "partial file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                job_id = %self.id,
                path = %part.display(),
                error = %e,
                "failed to remove partial file"
            ),
        }

        let scratch = self.scratch_dir();
        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(
                job_id = %self.id,
                path = %scratch.display(),
                error = %e,
                "failed to remove plugin scratch directory"
            );
        }
    }

    async fn release(&self) {
        self.downloader
            .tasks
            .active_downloads
            .lock()
            .await
            .remove(&self.id);
    }
}

/// Rename `from` to `to`, copying when they sit on different filesystems
///
/// The copy goes to a hidden sibling of `to` first so `to` only ever holds a
/// complete file.
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    let write_err = |e: std::io::Error| {
        Error::Transfer(TransferError::Write {
            path: to.to_path_buf(),
            reason: e.to_string(),
        })
    };

    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    let name = to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = to.with_file_name(format!(".{}.incoming", name));

    tokio::fs::copy(from, &staging).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&staging, to).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(write_err(e));
    }
    if let Err(e) = tokio::fs::remove_file(from).await {
        tracing::warn!(path = %from.display(), error = %e, "failed to remove staged file after copy");
    }
    Ok(())
}
