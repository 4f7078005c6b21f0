//! Built-in direct HTTP provider

use super::provider::{ByteSource, FetchOutcome, FetchRequest, Provider};
use crate::error::{Error, Result, TransferError};
use crate::utils::filename_from_content_disposition;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use std::time::Duration;

/// Id of the provider registered at startup for `direct_hosts`
pub const DIRECT_PROVIDER_ID: &str = "direct";

/// Streams a URL over HTTP(S)
///
/// Non-2xx answers are rejected before any byte is written.
#[derive(Clone, Debug)]
pub struct HttpProvider {
    client: reqwest::Client,
}

impl HttpProvider {
    /// Build a provider with its own connection pool
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Open a streaming GET for `url`
    pub async fn open(&self, url: &str) -> Result<ByteSource> {
        let response = self.client.get(url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("timed out connecting to '{}'", url)
            } else if e.is_connect() {
                format!("connection failed for '{}': {}", url, e)
            } else {
                format!("request to '{}' failed: {}", url, e)
            };
            Error::Transfer(TransferError::Interrupted { reason })
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transfer(TransferError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }));
        }

        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition);

        let total_bytes = response.content_length().filter(|len| *len > 0);

        tracing::debug!(url, ?total_bytes, ?filename, "HTTP transfer opened");

        let stream = response
            .bytes_stream()
            .map_err(|e| {
                Error::Transfer(TransferError::Interrupted {
                    reason: e.to_string(),
                })
            })
            .boxed();

        Ok(ByteSource {
            total_bytes,
            filename,
            stream,
        })
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        Ok(FetchOutcome::Stream(self.open(&request.url).await?))
    }
}
