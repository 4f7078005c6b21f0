//! Shared test helpers for creating Downloader instances in tests.

use crate::bus::Subscription;
use crate::config::Config;
use crate::db::Database;
use crate::downloader::Downloader;
use crate::error::Result;
use crate::plugins::{
    ByteSource, FetchOutcome, FetchRequest, HttpProvider, PluginRegistry, Provider,
    ProviderDescriptor,
};
use crate::types::Event;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Host pattern served by [`ChunkedProvider`] in tests
pub(crate) const TEST_HOSTS: &str = "*.files.test";

/// Test config rooted in `root`
pub(crate) fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = root.join("test.db");
    config.download.download_dir = root.join("downloads");
    config.download.temp_dir = root.join("temp");
    config.download.chunk_size = 64 * 1024;
    config.plugins.plugins_dir = None;
    config.plugins.direct_hosts = vec!["127.0.0.1".to_string(), "localhost".to_string()];
    config
}

/// Helper to create a test Downloader instance with a persistent database.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader() -> (Downloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let downloader = create_test_downloader_with(config).await;
    (downloader, temp_dir)
}

/// Like [`create_test_downloader`] with a caller-built config
pub(crate) async fn create_test_downloader_with(config: Config) -> Downloader {
    std::fs::create_dir_all(&config.download.download_dir).unwrap();
    std::fs::create_dir_all(&config.download.temp_dir).unwrap();

    let db = Database::new(&config.persistence.database_path)
        .await
        .unwrap();

    let http = Arc::new(
        HttpProvider::new(&config.download.user_agent, config.download.connect_timeout).unwrap(),
    );
    let registry = PluginRegistry::with_config(&config.plugins, http).unwrap();

    Downloader::from_parts(config, db, registry)
}

/// In-process provider that streams `chunks` blocks of `chunk_len` bytes
#[derive(Clone, Debug)]
pub(crate) struct ChunkedProvider {
    pub(crate) chunks: usize,
    pub(crate) chunk_len: usize,
    /// Whether the stream announces its total size
    pub(crate) total_known: bool,
    /// Pause before each chunk
    pub(crate) delay: Duration,
    /// Suggested filename
    pub(crate) filename: Option<String>,
}

impl ChunkedProvider {
    pub(crate) fn new(chunks: usize, chunk_len: usize) -> Self {
        Self {
            chunks,
            chunk_len,
            total_known: true,
            delay: Duration::ZERO,
            filename: None,
        }
    }

    pub(crate) fn total_bytes(&self) -> u64 {
        (self.chunks * self.chunk_len) as u64
    }
}

#[async_trait]
impl Provider for ChunkedProvider {
    async fn fetch(&self, _request: &FetchRequest) -> Result<FetchOutcome> {
        let chunk_len = self.chunk_len;
        let delay = self.delay;
        let stream = futures::stream::iter(0..self.chunks)
            .then(move |i| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok::<_, crate::error::Error>(Bytes::from(vec![(i % 251) as u8; chunk_len]))
            })
            .boxed();

        Ok(FetchOutcome::Stream(ByteSource {
            total_bytes: self.total_known.then(|| self.total_bytes()),
            filename: self.filename.clone(),
            stream,
        }))
    }
}

/// Register `provider` under `id` for [`TEST_HOSTS`]
pub(crate) fn register_test_provider(
    downloader: &Downloader,
    id: &str,
    provider: Arc<dyn Provider>,
) {
    let mut descriptor = ProviderDescriptor::direct(id, vec![TEST_HOSTS.to_string()]);
    descriptor.category = "test".to_string();
    downloader
        .registry
        .register_with(descriptor, provider)
        .unwrap();
}

/// Receive events until the first terminal one, returning all of them
pub(crate) async fn collect_until_terminal(events: &mut Subscription) -> Vec<Event> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for a terminal event")
            .expect("bus closed");
        let terminal = event.is_terminal();
        seen.push(event);
        if terminal {
            return seen;
        }
    }
}

/// Wait until `downloader` has no transfer task left
pub(crate) async fn wait_for_idle(downloader: &Downloader) {
    for _ in 0..200 {
        if downloader.tasks.active_downloads.lock().await.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("transfer tasks did not exit");
}
