// Unit tests for the file staging service

use super::*;
use crate::errors::AutomationError;
use std::fs;
use tempfile::TempDir;

fn service() -> (TempDir, FileStagingService) {
    let temp = TempDir::new().unwrap();
    let service = FileStagingService::new(temp.path().join("staging"));
    (temp, service)
}

fn write_source(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_stage_resolve_round_trip() {
    let (temp, service) = service();
    let source = write_source(&temp, "id_front.png", b"png-bytes-here");

    let staged = service.stage(&source, "profiles", "id_cards").unwrap();
    let absolute = service.resolve(&staged.relative_path).unwrap();

    assert_eq!(fs::read(&absolute).unwrap(), b"png-bytes-here");
    assert_eq!(staged.original_filename, "id_front.png");
}

#[test]
fn test_relative_path_layout() {
    let (temp, service) = service();
    let source = write_source(&temp, "id_front.png", b"x");

    let staged = service.stage(&source, "profiles", "id_cards").unwrap();

    assert!(
        staged.relative_path.starts_with("profiles/id_cards/"),
        "got {}",
        staged.relative_path
    );
    // Forward slashes regardless of platform, and the original stem survives
    assert!(!staged.relative_path.contains('\\'));
    assert!(staged.relative_path.contains("id_front_"));
    assert!(staged.relative_path.ends_with(".png"));
}

#[test]
fn test_stage_missing_source() {
    let (temp, service) = service();
    let missing = temp.path().join("nope.png");

    let err = service.stage(&missing, "profiles", "id_cards").unwrap_err();
    assert!(matches!(err, AutomationError::FileNotFound(_)));
}

#[test]
fn test_resolve_deleted_file() {
    let (temp, service) = service();
    let source = write_source(&temp, "id_front.png", b"x");

    let staged = service.stage(&source, "profiles", "id_cards").unwrap();
    let absolute = service.resolve(&staged.relative_path).unwrap();
    fs::remove_file(&absolute).unwrap();

    let err = service.resolve(&staged.relative_path).unwrap_err();
    match err {
        AutomationError::StagedFileMissing(rel) => assert_eq!(rel, staged.relative_path),
        other => panic!("expected StagedFileMissing, got {other:?}"),
    }
}

#[test]
fn test_staging_never_overwrites() {
    let (temp, service) = service();
    let first = write_source(&temp, "doc.pdf", b"first");
    let second = write_source(&temp, "doc.pdf", b"second");

    let staged_first = service.stage(&first, "ip_asset", "auth_doc").unwrap();
    let staged_second = service.stage(&second, "ip_asset", "auth_doc").unwrap();

    assert_ne!(staged_first.relative_path, staged_second.relative_path);
    assert_eq!(
        fs::read(service.resolve(&staged_first.relative_path).unwrap()).unwrap(),
        b"first"
    );
    assert_eq!(
        fs::read(service.resolve(&staged_second.relative_path).unwrap()).unwrap(),
        b"second"
    );
}

#[test]
fn test_category_segments_are_validated() {
    let (temp, service) = service();
    let source = write_source(&temp, "doc.pdf", b"x");

    assert!(service.stage(&source, "", "auth_doc").is_err());
    assert!(service.stage(&source, "..", "auth_doc").is_err());
    assert!(service.stage(&source, "ip/asset", "auth_doc").is_err());
    assert!(service.stage(&source, "ip_asset", "a\\b").is_err());
}

#[test]
fn test_resolve_rejects_traversal() {
    let (_temp, service) = service();

    assert!(matches!(
        service.resolve("../outside/file.png").unwrap_err(),
        AutomationError::StagedFileMissing(_)
    ));
    assert!(matches!(
        service.resolve("profiles//id_cards/x.png").unwrap_err(),
        AutomationError::StagedFileMissing(_)
    ));
}

#[test]
fn test_resolve_all_fails_on_first_missing() {
    let (temp, service) = service();
    let source = write_source(&temp, "ok.png", b"x");
    let staged = service.stage(&source, "profiles", "id_cards").unwrap();

    let paths = vec![staged.relative_path.clone(), "profiles/id_cards/gone.png".to_string()];
    assert!(service.resolve_all(&paths).is_err());

    let only_good = vec![staged.relative_path];
    assert_eq!(service.resolve_all(&only_good).unwrap().len(), 1);
}
