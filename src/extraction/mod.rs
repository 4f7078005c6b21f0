//! Archive extraction (RAR, 7z, ZIP)
//!
//! Each extractor is synchronous and runs on the blocking pool. The format is
//! chosen from the file extension; nested archives are handled by
//! [`extract_recursive`].

mod rar;
mod sevenz;
mod shared;
mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use rar::RarExtractor;
pub use sevenz::SevenZipExtractor;
pub use shared::{detect_archive_type, extract_recursive, is_archive, supported_archive_type};
pub use zip::ZipExtractor;

use crate::error::{Error, Result};
use crate::types::ArchiveType;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Per-entry progress callback: `(entries_done, entries_total)`
///
/// The total is `None` when the format cannot count entries up front (RAR).
pub type ProgressFn = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Unified archive extraction dispatcher
///
/// Detects the archive type and routes to the matching extractor on a
/// blocking thread. Returns the files written below `dest_path`.
pub async fn extract_archive(
    archive_path: &Path,
    dest_path: &Path,
    progress: ProgressFn,
) -> Result<Vec<PathBuf>> {
    let archive_type =
        detect_archive_type(archive_path).ok_or_else(|| Error::UnsupportedFormat {
            path: archive_path.to_path_buf(),
        })?;

    info!(?archive_path, ?archive_type, ?dest_path, "starting extraction");

    let archive = archive_path.to_path_buf();
    let dest = dest_path.to_path_buf();

    tokio::task::spawn_blocking(move || match archive_type {
        ArchiveType::Rar => RarExtractor::extract(&archive, &dest, &progress),
        ArchiveType::SevenZip => SevenZipExtractor::extract(&archive, &dest, &progress),
        ArchiveType::Zip => ZipExtractor::extract(&archive, &dest, &progress),
    })
    .await
    .map_err(|e| Error::Other(format!("extraction task panicked: {}", e)))?
}
