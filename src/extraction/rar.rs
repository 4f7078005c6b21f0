use crate::error::{Error, ExtractionError, Result};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use super::ProgressFn;

/// Archive extractor for RAR files
pub struct RarExtractor;

impl RarExtractor {
    /// Extract a RAR archive into `dest_path`
    ///
    /// unrar walks headers one at a time, so the entry total is not known
    /// ahead of time and progress is reported as a running count.
    pub fn extract(
        archive_path: &Path,
        dest_path: &Path,
        progress: &ProgressFn,
    ) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "extracting RAR archive");

        std::fs::create_dir_all(dest_path).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to create destination: {}",
                e
            )))
        })?;

        let mut at_header = unrar::Archive::new(archive_path)
            .open_for_processing()
            .map_err(|e| failed(archive_path, e))?;

        let mut extracted_files = Vec::new();
        let mut processed = 0u64;

        loop {
            let at_file = match at_header.read_header() {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Err(failed(archive_path, e)),
            };

            let header = at_file.entry();
            let name = Path::new(&header.filename);
            let relative = safe_relative_path(name).ok_or_else(|| {
                Error::Extraction(ExtractionError::PathTraversal {
                    archive: archive_path.to_path_buf(),
                    entry: name.display().to_string(),
                })
            })?;

            if header.is_directory() {
                std::fs::create_dir_all(dest_path.join(&relative))?;
                at_header = at_file.skip().map_err(|e| failed(archive_path, e))?;
            } else {
                let file_path = dest_path.join(&relative);
                at_header = at_file
                    .extract_to(&file_path)
                    .map_err(|e| failed(archive_path, e))?;
                debug!(path = ?file_path, "extracted RAR entry");
                extracted_files.push(file_path);
            }

            processed += 1;
            progress(processed, None);
        }

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "RAR extraction successful"
        );

        Ok(extracted_files)
    }
}

/// Entry name as a path that stays below the output directory
///
/// `None` for absolute names and names containing `..`.
pub(crate) fn safe_relative_path(name: &Path) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in name.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!relative.as_os_str().is_empty()).then_some(relative)
}

fn failed(archive_path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::Extraction(ExtractionError::Failed {
        archive: archive_path.to_path_buf(),
        reason: format!("RAR: {}", reason),
    })
}
