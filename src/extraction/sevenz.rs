use crate::error::{Error, ExtractionError, Result};
use sevenz_rust::{Password, SevenZReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::ProgressFn;
use super::rar::safe_relative_path;

/// Archive extractor for 7z files
pub struct SevenZipExtractor;

impl SevenZipExtractor {
    /// Extract a 7z archive into `dest_path`
    ///
    /// Entries are streamed one by one through [`SevenZReader::for_each_entries`],
    /// so an entry whose name escapes `dest_path` stops the walk before anything
    /// is written for it.
    pub fn extract(
        archive_path: &Path,
        dest_path: &Path,
        progress: &ProgressFn,
    ) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "extracting 7z archive");

        std::fs::create_dir_all(dest_path).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to create destination: {}",
                e
            )))
        })?;

        let mut reader =
            SevenZReader::open(archive_path, Password::empty()).map_err(|e| failed(archive_path, e))?;

        let total = reader
            .archive()
            .files
            .iter()
            .filter(|entry| !entry.is_directory())
            .count() as u64;

        let mut extracted_files = Vec::new();
        let mut unsafe_entry: Option<String> = None;
        let mut processed = 0u64;

        reader
            .for_each_entries(|entry, data| {
                let Some(relative) = safe_relative_path(Path::new(entry.name())) else {
                    unsafe_entry = Some(entry.name().to_string());
                    return Ok(false);
                };
                let target = dest_path.join(relative);

                if entry.is_directory() {
                    std::fs::create_dir_all(&target)?;
                    return Ok(true);
                }

                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut outfile = std::fs::File::create(&target)?;
                if entry.has_stream() {
                    std::io::copy(data, &mut outfile)?;
                }

                debug!(path = ?target, "extracted 7z entry");
                extracted_files.push(target);
                processed += 1;
                progress(processed, Some(total));
                Ok(true)
            })
            .map_err(|e| failed(archive_path, e))?;

        if let Some(entry) = unsafe_entry {
            return Err(Error::Extraction(ExtractionError::PathTraversal {
                archive: archive_path.to_path_buf(),
                entry,
            }));
        }

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "7z extraction successful"
        );

        Ok(extracted_files)
    }
}

fn failed(archive_path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::Extraction(ExtractionError::Failed {
        archive: archive_path.to_path_buf(),
        reason: format!("7z: {}", reason),
    })
}
