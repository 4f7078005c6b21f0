use crate::config::ExtractionConfig;
use crate::error::{Error, ExtractionError};
use crate::extraction::*;
use crate::types::ArchiveType;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a ZIP archive containing the given files
fn create_zip_archive(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        std::io::Write::write_all(&mut writer, content).unwrap();
    }
    writer.finish().unwrap();
}

/// Create a 7z archive from a source directory using sevenz_rust
fn create_7z_archive(archive_path: &Path, source_dir: &Path) {
    sevenz_rust::compress_to_path(source_dir, archive_path).unwrap();
}

/// Progress callback that records every call
fn recording_progress() -> (ProgressFn, Arc<Mutex<Vec<(u64, Option<u64>)>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    let progress: ProgressFn = Arc::new(move |done: u64, total: Option<u64>| {
        sink.lock().unwrap().push((done, total));
    });
    (progress, calls)
}

fn silent() -> ProgressFn {
    Arc::new(|_: u64, _: Option<u64>| {})
}

fn file_names(files: &[PathBuf]) -> Vec<String> {
    let mut names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ---------------------------------------------------------------------------
// Format detection
// ---------------------------------------------------------------------------

#[test]
fn test_detect_archive_type_by_extension() {
    assert_eq!(
        detect_archive_type(Path::new("game.rar")),
        Some(ArchiveType::Rar)
    );
    assert_eq!(
        detect_archive_type(Path::new("game.r00")),
        Some(ArchiveType::Rar)
    );
    assert_eq!(
        detect_archive_type(Path::new("game.7z")),
        Some(ArchiveType::SevenZip)
    );
    assert_eq!(
        detect_archive_type(Path::new("/downloads/Game.ZIP")),
        Some(ArchiveType::Zip)
    );
    assert_eq!(detect_archive_type(Path::new("game.exe")), None);
    assert_eq!(detect_archive_type(Path::new("game")), None);
}

#[test]
fn test_is_archive_default_extensions() {
    let extensions = ExtractionConfig::default().archive_extensions;

    assert!(is_archive(Path::new("file.rar"), &extensions));
    assert!(is_archive(Path::new("file.ZiP"), &extensions));
    assert!(is_archive(Path::new("file.7Z"), &extensions));
    assert!(!is_archive(Path::new("file.txt"), &extensions));
    assert!(!is_archive(Path::new("/path/to/file"), &extensions));
}

#[test]
fn test_is_archive_custom_extensions() {
    let custom = vec!["rar".to_string(), "custom".to_string()];

    assert!(is_archive(Path::new("file.custom"), &custom));
    assert!(!is_archive(Path::new("file.zip"), &custom));
}

#[test]
fn test_supported_archive_type_rejects_unknown_and_disabled() {
    let config = ExtractionConfig::default();
    assert_eq!(
        supported_archive_type(Path::new("a.zip"), &config).unwrap(),
        ArchiveType::Zip
    );
    assert!(matches!(
        supported_archive_type(Path::new("a.iso"), &config),
        Err(Error::UnsupportedFormat { .. })
    ));

    let zip_only = ExtractionConfig {
        archive_extensions: vec!["zip".to_string()],
        ..ExtractionConfig::default()
    };
    assert!(matches!(
        supported_archive_type(Path::new("a.rar"), &zip_only),
        Err(Error::UnsupportedFormat { .. })
    ));

    // enabled but not decodable
    let custom = ExtractionConfig {
        archive_extensions: vec!["custom".to_string()],
        ..ExtractionConfig::default()
    };
    assert!(matches!(
        supported_archive_type(Path::new("a.custom"), &custom),
        Err(Error::UnsupportedFormat { .. })
    ));
}

#[test]
fn test_safe_relative_path() {
    use super::rar::safe_relative_path;

    assert_eq!(
        safe_relative_path(Path::new("data/level1.dat")),
        Some(PathBuf::from("data/level1.dat"))
    );
    assert_eq!(
        safe_relative_path(Path::new("./game.exe")),
        Some(PathBuf::from("game.exe"))
    );
    assert_eq!(safe_relative_path(Path::new("../evil.sh")), None);
    assert_eq!(safe_relative_path(Path::new("data/../../evil.sh")), None);
    assert_eq!(safe_relative_path(Path::new("/etc/passwd")), None);
    assert_eq!(safe_relative_path(Path::new("")), None);
}

// ---------------------------------------------------------------------------
// ZIP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_zip_extracts_all_entries_with_progress() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("game.zip");
    create_zip_archive(
        &archive,
        &[
            ("game.exe", b"MZ".as_slice()),
            ("data/level1.dat", b"level one".as_slice()),
            ("readme.txt", b"have fun".as_slice()),
        ],
    );
    let dest = temp.path().join("out");
    let (progress, calls) = recording_progress();

    let files = extract_archive(&archive, &dest, progress).await.unwrap();

    assert_eq!(
        file_names(&files),
        vec!["game.exe", "level1.dat", "readme.txt"]
    );
    assert_eq!(
        std::fs::read(dest.join("data/level1.dat")).unwrap(),
        b"level one"
    );
    let calls = calls.lock().unwrap();
    assert_eq!(*calls, vec![(1, Some(3)), (2, Some(3)), (3, Some(3))]);
}

#[tokio::test]
async fn test_zip_extension_is_case_insensitive() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("GAME.ZIP");
    create_zip_archive(&archive, &[("a.txt", b"a".as_slice())]);

    let files = extract_archive(&archive, &temp.path().join("out"), silent())
        .await
        .unwrap();

    assert_eq!(files.len(), 1);
}

#[tokio::test]
async fn test_corrupt_zip_fails() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("broken.zip");
    std::fs::write(&archive, b"PK\x03\x04 this is not really a zip file").unwrap();

    let err = extract_archive(&archive, &temp.path().join("out"), silent())
        .await
        .unwrap_err();

    match err {
        Error::Extraction(ExtractionError::Failed { archive: a, reason }) => {
            assert_eq!(a, archive);
            assert!(!reason.is_empty());
        }
        other => panic!("expected extraction failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_zip_entry_escaping_destination_is_rejected() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("evil.zip");
    create_zip_archive(&archive, &[("../escaped.txt", b"gotcha".as_slice())]);
    let dest = temp.path().join("out");

    let err = extract_archive(&archive, &dest, silent())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Extraction(ExtractionError::PathTraversal { ref entry, .. }) if entry == "../escaped.txt"
    ));
    assert!(!temp.path().join("escaped.txt").exists());
}

#[tokio::test]
async fn test_missing_archive_fails() {
    let temp = TempDir::new().unwrap();

    let result = extract_archive(
        &temp.path().join("nope.zip"),
        &temp.path().join("out"),
        silent(),
    )
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_unknown_extension_is_unsupported() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("game.iso");
    std::fs::write(&archive, b"iso").unwrap();

    let err = extract_archive(&archive, &temp.path().join("out"), silent())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnsupportedFormat { path } if path == archive));
    assert!(!temp.path().join("out").exists());
}

// ---------------------------------------------------------------------------
// 7z
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_7z_extracts_all_entries_with_progress() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source");
    std::fs::create_dir_all(source.join("data")).unwrap();
    std::fs::write(source.join("game.exe"), b"MZ").unwrap();
    std::fs::write(source.join("data").join("level1.dat"), b"level one").unwrap();
    let archive = temp.path().join("game.7z");
    create_7z_archive(&archive, &source);
    let dest = temp.path().join("out");
    let (progress, calls) = recording_progress();

    let files = extract_archive(&archive, &dest, progress).await.unwrap();

    assert_eq!(file_names(&files), vec!["game.exe", "level1.dat"]);
    assert!(files.iter().all(|f| f.starts_with(&dest)));
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls.last(), Some(&(2, Some(2))));
}

#[tokio::test]
async fn test_corrupt_7z_fails() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("broken.7z");
    std::fs::write(&archive, b"7z\xBC\xAF\x27\x1C garbage").unwrap();

    let err = extract_archive(&archive, &temp.path().join("out"), silent())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Extraction(ExtractionError::Failed { .. })
    ));
}

// ---------------------------------------------------------------------------
// RAR
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_corrupt_rar_fails() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("broken.rar");
    std::fs::write(&archive, b"this is not a rar archive").unwrap();

    let err = extract_archive(&archive, &temp.path().join("out"), silent())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Extraction(ExtractionError::Failed { .. })
    ));
}

// ---------------------------------------------------------------------------
// Nested archives
// ---------------------------------------------------------------------------

/// outer.zip containing inner.zip (with `inner.txt`) and `outer.txt`
fn create_nested_zip(dir: &Path) -> PathBuf {
    let inner = dir.join("inner.zip");
    create_zip_archive(&inner, &[("inner.txt", b"inner".as_slice())]);
    let inner_bytes = std::fs::read(&inner).unwrap();
    std::fs::remove_file(&inner).unwrap();

    let outer = dir.join("outer.zip");
    create_zip_archive(
        &outer,
        &[("outer.txt", b"outer".as_slice()), ("inner.zip", inner_bytes.as_slice())],
    );
    outer
}

#[tokio::test]
async fn test_extract_recursive_depth_zero_leaves_nested_archives() {
    let temp = TempDir::new().unwrap();
    let outer = create_nested_zip(temp.path());
    let dest = temp.path().join("out");
    let config = ExtractionConfig::default();

    let files = extract_recursive(&outer, &dest, &config, 0, silent())
        .await
        .unwrap();

    assert_eq!(file_names(&files), vec!["inner.zip", "outer.txt"]);
    assert!(!dest.join("nested_inner_1").exists());
}

#[tokio::test]
async fn test_extract_recursive_unpacks_nested_archive() {
    let temp = TempDir::new().unwrap();
    let outer = create_nested_zip(temp.path());
    let dest = temp.path().join("out");
    let config = ExtractionConfig {
        max_recursion_depth: 1,
        ..ExtractionConfig::default()
    };
    let (progress, calls) = recording_progress();

    let files = extract_recursive(&outer, &dest, &config, 0, progress)
        .await
        .unwrap();

    assert_eq!(
        file_names(&files),
        vec!["inner.txt", "inner.zip", "outer.txt"]
    );
    assert_eq!(
        std::fs::read(dest.join("nested_inner_1").join("inner.txt")).unwrap(),
        b"inner"
    );
    // only the outer archive reports progress
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_extract_recursive_tolerates_corrupt_nested_archive() {
    let temp = TempDir::new().unwrap();
    let outer = temp.path().join("outer.zip");
    create_zip_archive(
        &outer,
        &[("outer.txt", b"outer".as_slice()), ("broken.zip", b"not a zip".as_slice())],
    );
    let dest = temp.path().join("out");
    let config = ExtractionConfig {
        max_recursion_depth: 2,
        ..ExtractionConfig::default()
    };

    let files = extract_recursive(&outer, &dest, &config, 0, silent())
        .await
        .unwrap();

    assert_eq!(file_names(&files), vec!["broken.zip", "outer.txt"]);
}
