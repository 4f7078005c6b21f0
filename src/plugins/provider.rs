//! The contract every provider implements

use crate::error::Result;
use crate::types::JobId;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Input handed to a provider for one job
#[derive(Clone, Debug)]
pub struct FetchRequest {
    /// Job being served
    pub job_id: JobId,
    /// Action requested, normally `download`
    pub action: String,
    /// URL as given by the caller
    pub url: String,
    /// Scratch directory the provider may write its result into
    pub output_dir: PathBuf,
    /// Cancelled when the job is cancelled; providers should stop promptly
    pub cancel: CancellationToken,
}

/// Byte stream produced by a provider
pub struct ByteSource {
    /// Total size, when the provider knows it
    pub total_bytes: Option<u64>,
    /// Suggested filename (e.g. from `Content-Disposition`)
    pub filename: Option<String>,
    /// The bytes, in order
    pub stream: BoxStream<'static, Result<Bytes>>,
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteSource")
            .field("total_bytes", &self.total_bytes)
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

/// What a provider hands back
#[derive(Debug)]
pub enum FetchOutcome {
    /// Bytes for the transfer loop to write
    Stream(ByteSource),
    /// Resolved direct link; fetched with the built-in HTTP transfer
    Redirect {
        /// Direct URL
        url: String,
        /// Suggested filename
        filename: Option<String>,
    },
    /// The provider already wrote the file
    File(PathBuf),
}

/// A pluggable capability that fetches content for a family of hosts
#[async_trait]
pub trait Provider: Send + Sync {
    /// Start fetching `request.url`
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome>;
}
