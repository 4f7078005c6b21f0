//! The job table: the single authority for job state.
//!
//! Every transition happens under one lock, and the event that announces it is
//! published before the lock is released. Events for one job therefore reach the
//! bus in the same order as the transitions, and a terminal event is always the
//! last one published for its job.

use crate::bus::ProgressBus;
use crate::error::{JobError, Result};
use crate::types::{Event, Job, JobId, JobKind, JobStatus};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    downloads: HashMap<JobId, Job>,
    extractions: HashMap<JobId, Job>,
    /// Creation order across both kinds
    order: Vec<(JobKind, JobId)>,
    /// Downloads whose transfer task has claimed completion
    finalizing: HashSet<JobId>,
}

impl Tables {
    fn get(&self, kind: JobKind, id: &JobId) -> Option<&Job> {
        match kind {
            JobKind::Download => self.downloads.get(id),
            JobKind::Extraction => self.extractions.get(id),
        }
    }
}

pub(crate) struct JobTable {
    tables: Mutex<Tables>,
    bus: ProgressBus,
}

impl JobTable {
    pub(crate) fn new(bus: ProgressBus) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            bus,
        }
    }

    // Every critical section leaves the tables consistent, so a poisoned lock is usable
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a pending download; fails if the id is already taken
    pub(crate) fn insert_download(&self, job: Job) -> Result<()> {
        let mut tables = self.lock();
        if let Some(existing) = tables.downloads.get(&job.id) {
            return Err(JobError::InvalidState {
                id: job.id.clone(),
                operation: "start".to_string(),
                current_state: existing.status.to_string(),
            }
            .into());
        }
        tables.order.push((JobKind::Download, job.id.clone()));
        tables.downloads.insert(job.id.clone(), job);
        Ok(())
    }

    /// Insert a download restored from the store without emitting anything
    pub(crate) fn restore_download(&self, job: Job) {
        let mut tables = self.lock();
        if tables.downloads.contains_key(&job.id) {
            return;
        }
        tables.order.push((JobKind::Download, job.id.clone()));
        tables.downloads.insert(job.id.clone(), job);
    }

    /// Pending -> Running
    ///
    /// Returns `false` if the job left Pending in the meantime (cancelled before
    /// its task got to run).
    pub(crate) fn mark_running(&self, id: &JobId) -> bool {
        let mut tables = self.lock();
        match tables.downloads.get_mut(id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.status = JobStatus::Running;
                true
            }
            _ => false,
        }
    }

    /// Record bytes written and publish a progress event
    ///
    /// Percentages only move forward. With an unknown total the event carries no
    /// percentage and the job's progress stays where it is.
    pub(crate) fn record_download_progress(&self, id: &JobId, written: u64, total: Option<u64>) {
        let mut tables = self.lock();
        let Some(job) = tables.downloads.get_mut(id) else {
            return;
        };
        if job.status != JobStatus::Running {
            return;
        }

        job.processed = written;
        job.total = total;
        let percent = total.map(|t| percent_of(written, t));
        if let Some(p) = percent {
            job.progress = job.progress.max(p);
        }

        self.bus.publish(Event::DownloadProgress {
            id: id.clone(),
            progress: percent.map(|_| job.progress),
            downloaded_bytes: written,
            total_bytes: total,
        });
    }

    /// Update the display filename once the provider has named the file
    pub(crate) fn set_filename(&self, id: &JobId, filename: &str) {
        if let Some(job) = self.lock().downloads.get_mut(id) {
            job.filename = filename.to_string();
        }
    }

    /// Claim completion for a running download whose file is already in place
    ///
    /// After a successful claim, [`cancel`](Self::cancel) answers `AlreadyTerminal`.
    /// Returns `false` if the job is no longer running (it was cancelled first).
    pub(crate) fn begin_finalize(&self, id: &JobId) -> bool {
        let mut tables = self.lock();
        let running = tables
            .downloads
            .get(id)
            .is_some_and(|job| job.status == JobStatus::Running);
        if running {
            tables.finalizing.insert(id.clone());
        }
        running
    }

    /// Running -> Completed, publishing `completed`
    pub(crate) fn complete_download(
        &self,
        id: &JobId,
        path: PathBuf,
        persist_error: Option<String>,
    ) {
        let mut tables = self.lock();
        tables.finalizing.remove(id);
        let Some(job) = tables.downloads.get_mut(id) else {
            return;
        };
        if job.status.is_terminal() {
            return;
        }

        job.status = JobStatus::Completed;
        job.progress = 100.0;
        if let Some(total) = job.total {
            job.processed = total;
        }
        job.path = Some(path.clone());
        job.persist_error = persist_error;
        job.finished_at = Some(Utc::now());

        self.bus.publish(Event::DownloadComplete {
            id: id.clone(),
            filename: job.filename.clone(),
            path,
        });
    }

    /// Pending/Running -> Failed, publishing `failed`
    ///
    /// Returns `false` if the job had already terminated.
    pub(crate) fn fail_download(&self, id: &JobId, message: String) -> bool {
        let mut tables = self.lock();
        tables.finalizing.remove(id);
        let Some(job) = tables.downloads.get_mut(id) else {
            return false;
        };
        if job.status.is_terminal() {
            return false;
        }

        job.status = JobStatus::Failed;
        job.error = Some(message.clone());
        job.finished_at = Some(Utc::now());

        self.bus.publish(Event::DownloadError {
            id: id.clone(),
            error: message,
        });
        true
    }

    /// Pending/Running -> Cancelled, publishing `cancelled`
    ///
    /// Unknown ids give `NotFound`; terminal jobs and jobs whose completion has
    /// already been claimed give `AlreadyTerminal`.
    pub(crate) fn cancel(&self, id: &JobId) -> Result<()> {
        let mut tables = self.lock();
        let finalizing = tables.finalizing.contains(id);
        let Some(job) = tables.downloads.get_mut(id) else {
            return Err(JobError::NotFound { id: id.clone() }.into());
        };

        if job.status.is_terminal() || finalizing {
            let status = if finalizing {
                JobStatus::Completed
            } else {
                job.status
            };
            return Err(JobError::AlreadyTerminal {
                id: id.clone(),
                status,
            }
            .into());
        }

        job.status = JobStatus::Cancelled;
        job.finished_at = Some(Utc::now());

        self.bus
            .publish(Event::DownloadCancelled { id: id.clone() });
        Ok(())
    }

    /// Set the persistence error on a completed download
    pub(crate) fn set_persist_error(&self, id: &JobId, persist_error: Option<String>) {
        if let Some(job) = self.lock().downloads.get_mut(id) {
            job.persist_error = persist_error;
        }
    }

    /// Start tracking an extraction for `id`
    ///
    /// Fails with `InvalidState` while a previous extraction for the same id is
    /// still running; a finished one is replaced.
    pub(crate) fn begin_extraction(&self, id: &JobId, archive: &Path) -> Result<()> {
        let mut tables = self.lock();
        if let Some(existing) = tables.extractions.get(id) {
            if !existing.status.is_terminal() {
                return Err(JobError::InvalidState {
                    id: id.clone(),
                    operation: "extract".to_string(),
                    current_state: existing.status.to_string(),
                }
                .into());
            }
            tables
                .order
                .retain(|(kind, other)| !(*kind == JobKind::Extraction && other == id));
        }

        tables.order.push((JobKind::Extraction, id.clone()));
        tables
            .extractions
            .insert(id.clone(), Job::extraction(id.clone(), archive));
        Ok(())
    }

    /// Record extracted entries and publish a progress event
    pub(crate) fn record_extraction_progress(&self, id: &JobId, done: u64, total: Option<u64>) {
        let mut tables = self.lock();
        let Some(job) = tables.extractions.get_mut(id) else {
            return;
        };
        if job.status != JobStatus::Running {
            return;
        }

        job.processed = done;
        job.total = total;
        let percent = total.map(|t| percent_of(done, t));
        if let Some(p) = percent {
            job.progress = job.progress.max(p);
        }

        self.bus.publish(Event::ExtractionProgress {
            id: id.clone(),
            progress: percent.map(|_| job.progress),
        });
    }

    /// Extracting -> Completed, publishing `completed`
    pub(crate) fn complete_extraction(&self, id: &JobId, output_dir: PathBuf) {
        let mut tables = self.lock();
        let Some(job) = tables.extractions.get_mut(id) else {
            return;
        };

        job.status = JobStatus::Completed;
        job.progress = 100.0;
        job.path = Some(output_dir.clone());
        job.finished_at = Some(Utc::now());

        self.bus.publish(Event::ExtractionComplete {
            id: id.clone(),
            output_dir,
        });
    }

    /// Extracting -> Failed, publishing `failed`
    pub(crate) fn fail_extraction(&self, id: &JobId, message: String) {
        let mut tables = self.lock();
        let Some(job) = tables.extractions.get_mut(id) else {
            return;
        };

        job.status = JobStatus::Failed;
        job.error = Some(message.clone());
        job.finished_at = Some(Utc::now());

        self.bus.publish(Event::ExtractionFailed {
            id: id.clone(),
            error: message,
        });
    }

    /// Snapshot of a download, falling back to an extraction with the same id
    pub(crate) fn get(&self, id: &JobId) -> Option<Job> {
        let tables = self.lock();
        tables
            .downloads
            .get(id)
            .or_else(|| tables.extractions.get(id))
            .cloned()
    }

    /// Snapshot of a download job
    pub(crate) fn get_download(&self, id: &JobId) -> Option<Job> {
        self.lock().downloads.get(id).cloned()
    }

    /// Snapshot of the extraction tracked for `id`
    pub(crate) fn get_extraction(&self, id: &JobId) -> Option<Job> {
        self.lock().extractions.get(id).cloned()
    }

    /// Every job, in creation order
    pub(crate) fn list(&self) -> Vec<Job> {
        let tables = self.lock();
        tables
            .order
            .iter()
            .filter_map(|(kind, id)| tables.get(*kind, id).cloned())
            .collect()
    }

    /// Non-terminal jobs, in creation order
    pub(crate) fn list_active(&self) -> Vec<Job> {
        let tables = self.lock();
        tables
            .order
            .iter()
            .filter_map(|(kind, id)| tables.get(*kind, id))
            .filter(|job| !job.status.is_terminal())
            .cloned()
            .collect()
    }

    /// Number of extractions still running
    pub(crate) fn running_extractions(&self) -> usize {
        self.lock()
            .extractions
            .values()
            .filter(|job| !job.status.is_terminal())
            .count()
    }
}

fn percent_of(done: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    ((done as f64 / total as f64) * 100.0).min(100.0) as f32
}
