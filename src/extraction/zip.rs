use crate::error::{Error, ExtractionError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::ProgressFn;

/// Archive extractor for ZIP files
pub struct ZipExtractor;

impl ZipExtractor {
    /// Extract a ZIP archive into `dest_path`
    ///
    /// Progress is reported once per entry; the entry count is read from the
    /// central directory up front so the total is always known.
    pub fn extract(
        archive_path: &Path,
        dest_path: &Path,
        progress: &ProgressFn,
    ) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "extracting ZIP archive");

        std::fs::create_dir_all(dest_path).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to create destination: {}",
                e
            )))
        })?;

        let file = std::fs::File::open(archive_path).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to open ZIP archive: {}",
                e
            )))
        })?;

        let mut archive = zip::ZipArchive::new(file).map_err(|e| failed(archive_path, e))?;
        let total = archive.len() as u64;
        let mut extracted_files = Vec::new();

        for i in 0..archive.len() {
            let entry = archive.by_index(i).map_err(|e| failed(archive_path, e))?;
            if let Some(path) = Self::extract_entry(entry, dest_path, archive_path)? {
                extracted_files.push(path);
            }
            progress(i as u64 + 1, Some(total));
        }

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "ZIP extraction successful"
        );

        Ok(extracted_files)
    }

    /// Write one entry to disk, creating directories as needed
    fn extract_entry(
        mut entry: zip::read::ZipFile,
        dest_path: &Path,
        archive_path: &Path,
    ) -> Result<Option<PathBuf>> {
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(Error::Extraction(ExtractionError::PathTraversal {
                archive: archive_path.to_path_buf(),
                entry: entry.name().to_string(),
            }));
        };
        let file_path = dest_path.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&file_path)?;
            return Ok(None);
        }

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut outfile = std::fs::File::create(&file_path)?;
        std::io::copy(&mut entry, &mut outfile).map_err(|e| {
            failed(
                archive_path,
                format!("failed to extract {}: {}", entry.name(), e),
            )
        })?;

        debug!(path = ?file_path, "extracted ZIP entry");
        Ok(Some(file_path))
    }
}

fn failed(archive_path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::Extraction(ExtractionError::Failed {
        archive: archive_path.to_path_buf(),
        reason: format!("ZIP: {}", reason),
    })
}
