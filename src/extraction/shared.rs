use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::types::ArchiveType;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{ProgressFn, extract_archive};

/// Detect archive type from the file extension
///
/// Returns `None` for unknown extensions.
pub fn detect_archive_type(path: &Path) -> Option<ArchiveType> {
    let ext = path.extension()?.to_str()?.to_lowercase();

    match ext.as_str() {
        "rar" | "r00" => Some(ArchiveType::Rar),
        "7z" => Some(ArchiveType::SevenZip),
        "zip" => Some(ArchiveType::Zip),
        _ => None,
    }
}

/// Check if a file is an archive based on its extension
///
/// Uses the configured list of archive extensions (without dots, any case).
pub fn is_archive(path: &Path, archive_extensions: &[String]) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_lowercase();
        archive_extensions.iter().any(|ae| ae.to_lowercase() == ext)
    })
}

/// Archive type for `path`, or [`Error::UnsupportedFormat`]
///
/// The extension must be both enabled in `config.archive_extensions` and one
/// the extractors can decode.
pub fn supported_archive_type(path: &Path, config: &ExtractionConfig) -> Result<ArchiveType> {
    detect_archive_type(path)
        .filter(|_| is_archive(path, &config.archive_extensions))
        .ok_or_else(|| Error::UnsupportedFormat {
            path: path.to_path_buf(),
        })
}

/// Extract an archive, then any archives it contained, up to `config.max_recursion_depth`
///
/// Nested archives are unpacked into `nested_<stem>_<depth>` below `dest_path`.
/// Only the outer archive reports progress; a nested failure is logged and the
/// outer result still stands.
pub fn extract_recursive<'a>(
    archive_path: &'a Path,
    dest_path: &'a Path,
    config: &'a ExtractionConfig,
    current_depth: u32,
    progress: ProgressFn,
) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
    Box::pin(async move {
        debug!(
            ?archive_path,
            current_depth,
            max_depth = config.max_recursion_depth,
            "extracting archive"
        );

        let extracted = extract_archive(archive_path, dest_path, progress).await?;

        if current_depth >= config.max_recursion_depth {
            return Ok(extracted);
        }

        let mut all_files = extracted.clone();

        for file in &extracted {
            if detect_archive_type(file).is_none() || !is_archive(file, &config.archive_extensions)
            {
                continue;
            }

            let nested_dest = dest_path.join(format!(
                "nested_{}_{}",
                file.file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("archive"),
                current_depth + 1
            ));

            info!(?file, ?nested_dest, current_depth, "extracting nested archive");

            let silent: ProgressFn = Arc::new(|_: u64, _: Option<u64>| {});
            match extract_recursive(file, &nested_dest, config, current_depth + 1, silent).await {
                Ok(nested) => all_files.extend(nested),
                Err(e) => {
                    warn!(?file, error = %e, "nested archive extraction failed, keeping outer files");
                }
            }
        }

        Ok(all_files)
    })
}
