//! Application state for the API server

use crate::{Config, Downloader};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request; both fields are `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// The downloader every handler delegates to
    pub downloader: Arc<Downloader>,

    /// Configuration the router was built with
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(downloader: Arc<Downloader>, config: Arc<Config>) -> Self {
        Self { downloader, config }
    }
}
