//! Utility functions for file naming, path collisions and plugin output cleanup

use crate::config::FileCollisionAction;
use crate::error::{Error, Result, TransferError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Filename used when nothing better can be derived
pub const FALLBACK_FILENAME: &str = "download";

static ANSI_ESCAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\x1B\[[0-9;]*[A-Za-z]").ok());

/// Get a unique path for a file, handling collisions according to the specified action
///
/// For [`FileCollisionAction::Rename`] a ` (n)` suffix is inserted before the extension
/// until a free name is found. [`FileCollisionAction::Skip`] fails if the file exists;
/// [`FileCollisionAction::Overwrite`] returns the path unchanged.
///
/// ```
/// use arcade_dl::utils::get_unique_path;
/// use arcade_dl::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/arcade-dl-doc/doom.zip");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// // If doom.zip exists, returns doom (1).zip, then doom (2).zip, etc.
/// # let _ = unique;
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf> {
    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.exists() {
                return Err(Error::Transfer(TransferError::FileCollision {
                    path: path.to_path_buf(),
                    reason: "file already exists and collision action is skip".to_string(),
                }));
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                Error::Transfer(TransferError::InvalidPath {
                    path: path.to_path_buf(),
                    reason: "cannot extract file stem".to_string(),
                })
            })?;

            let extension = path.extension().and_then(|e| e.to_str());

            let parent = path.parent().ok_or_else(|| {
                Error::Transfer(TransferError::InvalidPath {
                    path: path.to_path_buf(),
                    reason: "cannot extract parent directory".to_string(),
                })
            })?;

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(new_path);
                }
            }

            Err(Error::Transfer(TransferError::FileCollision {
                path: path.to_path_buf(),
                reason: format!(
                    "could not find unique filename after {} attempts",
                    MAX_RENAME_ATTEMPTS
                ),
            }))
        }
    }
}

/// Parse the filename out of a `Content-Disposition` header value
///
/// Handles both `filename="x.zip"` and the RFC 5987 `filename*=UTF-8''x%20y.zip` form,
/// preferring the latter when both are present.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;

    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            // charset'lang'encoded-filename
            let encoded = encoded.rsplit('\'').next().unwrap_or(encoded);
            if let Ok(decoded) = urlencoding::decode(encoded.trim_matches('"'))
                && !decoded.is_empty()
            {
                return Some(decoded.into_owned());
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            let name = name.trim_matches('"');
            if !name.is_empty() {
                plain = Some(name.to_string());
            }
        }
    }

    plain
}

/// Last non-empty path segment of a URL, percent-decoded
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let last = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()?;

    let decoded = urlencoding::decode(last)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| last.to_string());
    Some(decoded)
}

/// Make a provider- or server-supplied name safe to use as a single path component
///
/// Strips directory separators and reserved characters; never returns an empty string.
pub fn sanitize_filename(name: &str) -> String {
    // Only the final component counts, "../../etc/passwd" becomes "passwd"
    let last = name
        .rsplit(['/', '\\'])
        .find(|s| !s.is_empty())
        .unwrap_or_default();

    let cleaned = sanitize_filename::sanitize(last);
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();

    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned
    }
}

/// Choose the destination filename for a download
///
/// Order: explicit name, `Content-Disposition`, URL path, [`FALLBACK_FILENAME`].
pub fn derive_filename(
    explicit: Option<&str>,
    content_disposition: Option<&str>,
    url: &str,
) -> String {
    explicit
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
        .or_else(|| content_disposition.and_then(filename_from_content_disposition))
        .or_else(|| filename_from_url(url))
        .map(|name| sanitize_filename(&name))
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Lowercased host of a URL, if it parses and has one
pub fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()?
        .host_str()
        .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
        .filter(|h| !h.is_empty())
}

/// Remove terminal color/cursor escape sequences from plugin output
pub fn strip_ansi_codes(input: &str) -> String {
    match ANSI_ESCAPE.as_ref() {
        Some(re) => re.replace_all(input, "").into_owned(),
        None => input.to_string(),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_get_unique_path_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("game.zip");

        for action in [
            FileCollisionAction::Rename,
            FileCollisionAction::Overwrite,
            FileCollisionAction::Skip,
        ] {
            assert_eq!(get_unique_path(&path, action).unwrap(), path);
        }
    }

    #[test]
    fn test_get_unique_path_rename_with_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("game.zip");
        fs::write(&path, "original").unwrap();

        let unique = get_unique_path(&path, FileCollisionAction::Rename).unwrap();
        assert_eq!(unique, temp_dir.path().join("game (1).zip"));

        fs::write(&unique, "first rename").unwrap();
        let unique2 = get_unique_path(&path, FileCollisionAction::Rename).unwrap();
        assert_eq!(unique2, temp_dir.path().join("game (2).zip"));
    }

    #[test]
    fn test_get_unique_path_rename_without_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("game");
        fs::write(&path, "original").unwrap();

        let unique = get_unique_path(&path, FileCollisionAction::Rename).unwrap();
        assert_eq!(unique, temp_dir.path().join("game (1)"));
    }

    #[test]
    fn test_get_unique_path_overwrite_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("game.zip");
        fs::write(&path, "original").unwrap();

        let result = get_unique_path(&path, FileCollisionAction::Overwrite).unwrap();
        assert_eq!(result, path);
    }

    #[test]
    fn test_get_unique_path_skip_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("game.zip");
        fs::write(&path, "original").unwrap();

        let err = get_unique_path(&path, FileCollisionAction::Skip).unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer(TransferError::FileCollision { .. })
        ));
    }

    #[test]
    fn content_disposition_plain_filename() {
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="quake.zip""#),
            Some("quake.zip".to_string())
        );
    }

    #[test]
    fn content_disposition_prefers_encoded_form() {
        let header = r#"attachment; filename="fallback.zip"; filename*=UTF-8''Space%20Quest.7z"#;
        assert_eq!(
            filename_from_content_disposition(header),
            Some("Space Quest.7z".to_string())
        );
    }

    #[test]
    fn content_disposition_without_filename() {
        assert_eq!(filename_from_content_disposition("inline"), None);
    }

    #[test]
    fn url_last_segment_is_decoded() {
        assert_eq!(
            filename_from_url("https://cdn.example.com/files/Monkey%20Island.zip?x=1"),
            Some("Monkey Island.zip".to_string())
        );
        assert_eq!(
            filename_from_url("https://cdn.example.com/files/"),
            Some("files".to_string())
        );
        assert_eq!(filename_from_url("https://cdn.example.com/"), None);
        assert_eq!(filename_from_url("not a url"), None);
    }

    #[test]
    fn sanitize_drops_directories_and_reserved_chars() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(r"C:\games\doom.zip"), "doom.zip");
        assert_eq!(sanitize_filename("a:b?.zip"), "ab.zip");
        assert_eq!(sanitize_filename(".."), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename(""), FALLBACK_FILENAME);
    }

    #[test]
    fn derive_filename_order() {
        let url = "https://host.example/path/from-url.zip";
        assert_eq!(
            derive_filename(Some("explicit.zip"), Some("attachment; filename=cd.zip"), url),
            "explicit.zip"
        );
        assert_eq!(
            derive_filename(None, Some("attachment; filename=cd.zip"), url),
            "cd.zip"
        );
        assert_eq!(derive_filename(Some("  "), None, url), "from-url.zip");
        assert_eq!(
            derive_filename(None, None, "https://host.example/"),
            FALLBACK_FILENAME
        );
    }

    #[test]
    fn host_is_lowercased() {
        assert_eq!(
            host_of("https://Files.Example.COM/x.zip"),
            Some("files.example.com".to_string())
        );
        assert_eq!(host_of("file:///tmp/x.zip"), None);
        assert_eq!(host_of("garbage"), None);
    }

    #[test]
    fn ansi_sequences_are_removed() {
        let colored = "\x1B[32m{\"url\": \"https://x\"}\x1B[0m\n";
        assert_eq!(strip_ansi_codes(colored), "{\"url\": \"https://x\"}\n");
        assert_eq!(strip_ansi_codes("plain"), "plain");
    }
}
