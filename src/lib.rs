//! # arcade-dl
//!
//! Backend library for game download managers: resolves a URL to a provider,
//! runs the transfer, reports progress and unpacks the result.
//!
//! ## Design Philosophy
//!
//! arcade-dl is designed to be:
//! - **Pluggable** - Hosts are served by providers; new ones install from a JSON manifest
//! - **Sensible defaults** - Works out of the box with a direct HTTP provider
//! - **Library-first** - No UI, an embeddable crate with an optional REST API
//! - **Event-driven** - Consumers subscribe to progress, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use arcade_dl::{Config, Downloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = Downloader::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let id = downloader
//!         .start("https://example.com/games/demo.zip", None, None)
//!         .await?;
//!     println!("started {}", id);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Progress event fan-out
pub mod bus;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Provider manifests, registry and implementations
pub mod plugins;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use bus::{ProgressBus, Subscription, Topic};
pub use config::{Config, FileCollisionAction};
pub use db::Database;
pub use downloader::{Downloader, run_with_shutdown};
pub use error::{
    ApiError, ErrorDetail, Error, ExtractionError, JobError, Result, StorageError, ToHttpStatus,
    TransferError,
};
pub use plugins::{PluginRegistry, Provider, ProviderDescriptor};
pub use types::{
    ArchiveType, Event, EventKind, GameRecord, Job, JobId, JobKind, JobStatus, LaunchConfig,
    LaunchMethod,
};
