//! Core downloader implementation split into focused submodules.
//!
//! The [`Downloader`] struct and its methods are organized by domain:
//! - [`control`] - Starting, cancelling and querying jobs
//! - [`transfer`] - The per-job transfer task (fetch, stream to disk, finalize)
//! - [`extract`] - Archive extraction jobs
//! - [`library`] - Game records and plugin management
//! - [`lifecycle`] - Startup restore and shutdown coordination
//! - [`jobs`] - The job table every transition goes through

mod control;
mod extract;
pub(crate) mod jobs;
mod library;
mod lifecycle;
mod transfer;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use lifecycle::run_with_shutdown;

use crate::bus::{ProgressBus, Subscription, Topic};
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::plugins::{HttpProvider, PluginRegistry};
use crate::types::JobId;
use jobs::JobTable;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio_util::sync::CancellationToken;

/// Running task bookkeeping
#[derive(Clone)]
pub(crate) struct TaskState {
    /// Cancellation tokens of download tasks that have not exited yet
    pub(crate) active_downloads: Arc<tokio::sync::Mutex<HashMap<JobId, CancellationToken>>>,
    /// Optional bound on concurrent transfers (`download.max_concurrent_downloads`)
    pub(crate) concurrent_limit: Option<Arc<tokio::sync::Semaphore>>,
    /// Flag to indicate whether new jobs are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Held while a finished file claims its destination name and moves there
    pub(crate) placement: Arc<tokio::sync::Mutex<()>>,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Downloader {
    /// Persistence store for game records
    /// Public for integration tests to inspect records
    pub db: Arc<Database>,
    /// Event fan-out
    pub(crate) bus: ProgressBus,
    /// Provider registry
    pub(crate) registry: Arc<PluginRegistry>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Authoritative job state
    pub(crate) jobs: Arc<JobTable>,
    /// Task tracking
    pub(crate) tasks: TaskState,
}

impl Downloader {
    /// Create a new Downloader instance
    ///
    /// This initializes all core components:
    /// - Creates the download and temp directories
    /// - Opens/creates the SQLite database and runs migrations
    /// - Builds the plugin registry (direct provider plus `plugins.plugins_dir` manifests)
    /// - Rebuilds completed jobs from stored game records
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        for (dir, what) in [
            (&config.download.download_dir, "download"),
            (&config.download.temp_dir, "temp"),
        ] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        what,
                        dir.display(),
                        e
                    ),
                ))
            })?;
        }

        let db = Database::new(&config.persistence.database_path).await?;

        if db.was_unclean_shutdown().await? {
            tracing::warn!("previous session did not shut down cleanly");
        }
        // Mark that we're starting up (for unclean shutdown detection)
        db.set_clean_start().await?;

        let http = Arc::new(HttpProvider::new(
            &config.download.user_agent,
            config.download.connect_timeout,
        )?);
        let registry = PluginRegistry::with_config(&config.plugins, http)?;

        let downloader = Self::from_parts(config, db, registry);
        let restored = downloader.restore_completed_jobs().await?;
        tracing::info!(restored, "downloader ready");

        Ok(downloader)
    }

    /// Assemble a downloader from already-built parts
    pub(crate) fn from_parts(config: Config, db: Database, registry: PluginRegistry) -> Self {
        let bus = ProgressBus::new(config.events.backlog_warn_threshold);
        let concurrent_limit = config
            .download
            .max_concurrent_downloads
            .map(|n| Arc::new(tokio::sync::Semaphore::new(n)));

        Self {
            db: Arc::new(db),
            jobs: Arc::new(JobTable::new(bus.clone())),
            bus,
            registry: Arc::new(registry),
            config: Arc::new(config),
            tasks: TaskState {
                active_downloads: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
                concurrent_limit,
                accepting_new: Arc::new(AtomicBool::new(true)),
                placement: Arc::new(tokio::sync::Mutex::new(())),
            },
        }
    }

    /// Subscribe to events for every job
    ///
    /// Each subscription receives its own copy of every event published after it
    /// was created. Dropping the [`Subscription`] detaches it.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use arcade_dl::{Config, Downloader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = Downloader::new(Config::default()).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Some(event) = events.recv().await {
    ///             if let Some(payload) = event.wire_payload() {
    ///                 println!("{}: {}", event.wire_name(), payload);
    ///             }
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe(Topic::All)
    }

    /// Subscribe to events for a single job
    pub fn subscribe_job(&self, id: &JobId) -> Subscription {
        self.bus.subscribe(Topic::Job(id.clone()))
    }

    /// The progress bus shared by downloads and extractions
    pub fn bus(&self) -> &ProgressBus {
        &self.bus
    }

    /// The provider registry
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server listens on `server.api.bind_address` (default: 127.0.0.1:6790).
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = Arc::new(self.clone());
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
