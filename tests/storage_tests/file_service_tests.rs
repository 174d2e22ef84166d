//! Tests for FileService
//!
//! These tests verify:
//! - Opening/creating the service directory
//! - LIST enumeration rules (regular files only, no hidden entries)
//! - GET/UPLOAD byte-exact round trips and overwrite semantics
//! - Concurrent uploads through one shared instance

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::thread;

use filewire::error::CommandError;
use filewire::storage::FileService;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_service() -> (TempDir, FileService) {
    let temp_dir = TempDir::new().unwrap();
    let service = FileService::open(temp_dir.path()).unwrap();
    (temp_dir, service)
}

// =============================================================================
// Open/Create Tests
// =============================================================================

#[test]
fn test_open_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("files");

    assert!(!path.exists());
    let service = FileService::open(&path).unwrap();

    assert!(path.is_dir());
    assert_eq!(service.root(), path.as_path());
}

#[test]
fn test_open_existing_directory_keeps_files() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("kept.txt"), b"still here").unwrap();

    let service = FileService::open(temp_dir.path()).unwrap();
    assert_eq!(service.get("kept.txt").unwrap(), b"still here");
}

// =============================================================================
// LIST Tests
// =============================================================================

#[test]
fn test_list_empty() {
    let (_temp, service) = setup_temp_service();
    assert!(service.list().unwrap().is_empty());
}

#[test]
fn test_list_each_file_once() {
    let (_temp, service) = setup_temp_service();
    let names = ["a.txt", "b.bin", "no_extension", "with space.pdf"];
    for name in names {
        service.upload(name, name.as_bytes()).unwrap();
    }
    // Overwrite must not produce a second entry
    service.upload("a.txt", b"again").unwrap();

    let listed = service.list().unwrap();
    assert_eq!(listed.len(), names.len());

    let listed: HashSet<_> = listed.into_iter().collect();
    let expected: HashSet<_> = names.iter().map(|n| n.to_string()).collect();
    assert_eq!(listed, expected);
}

#[test]
fn test_list_skips_directories_and_hidden_files() {
    let (temp, service) = setup_temp_service();
    fs::create_dir(temp.path().join("subdir")).unwrap();
    fs::write(temp.path().join(".hidden"), b"x").unwrap();
    fs::write(temp.path().join("visible.txt"), b"x").unwrap();

    assert_eq!(service.list().unwrap(), vec!["visible.txt".to_string()]);
}

// =============================================================================
// GET/UPLOAD Tests
// =============================================================================

#[test]
fn test_get_missing() {
    let (_temp, service) = setup_temp_service();
    let err = service.get("missing.txt").unwrap_err();
    assert!(matches!(err, CommandError::FileNotFound(ref name) if name == "missing.txt"));
    assert_eq!(err.to_string(), "File missing.txt does not exist");
}

#[test]
fn test_get_directory_is_not_a_file() {
    let (temp, service) = setup_temp_service();
    fs::create_dir(temp.path().join("folder")).unwrap();
    assert!(matches!(service.get("folder"), Err(CommandError::FileNotFound(_))));
}

#[test]
fn test_upload_get_binary_round_trip() {
    let (_temp, service) = setup_temp_service();
    let data: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 256) as u8).collect();

    service.upload("x.bin", &data).unwrap();
    assert_eq!(service.get("x.bin").unwrap(), data);
}

#[test]
fn test_upload_empty_file() {
    let (_temp, service) = setup_temp_service();
    service.upload("empty.txt", b"").unwrap();
    assert!(service.get("empty.txt").unwrap().is_empty());
}

#[test]
fn test_upload_overwrites_longer_file() {
    let (_temp, service) = setup_temp_service();
    service.upload("f.txt", b"a much longer original").unwrap();
    service.upload("f.txt", b"short").unwrap();
    assert_eq!(service.get("f.txt").unwrap(), b"short");
}

#[test]
fn test_invalid_names_rejected() {
    let (temp, service) = setup_temp_service();
    for name in ["../up.txt", "a/b.txt", "..", "", "/abs.txt"] {
        assert!(matches!(
            service.upload(name, b"x"),
            Err(CommandError::InvalidFilename(_))
        ));
        assert!(matches!(service.get(name), Err(CommandError::InvalidFilename(_))));
    }
    assert!(!temp.path().parent().unwrap().join("up.txt").exists());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_distinct_uploads() {
    let (_temp, service) = setup_temp_service();
    let service = Arc::new(service);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let content = vec![i as u8; 10_000 + i];
                service.upload(&format!("file_{i}.bin"), &content).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(service.list().unwrap().len(), 16);
    for i in 0..16 {
        assert_eq!(
            service.get(&format!("file_{i}.bin")).unwrap(),
            vec![i as u8; 10_000 + i]
        );
    }
}

#[test]
fn test_concurrent_same_name_uploads_not_torn() {
    let (_temp, service) = setup_temp_service();
    let service = Arc::new(service);
    const SIZE: usize = 256 * 1024;

    let handles: Vec<_> = (1..=8u8)
        .map(|fill| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                service.upload("shared.bin", &vec![fill; SIZE]).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let content = service.get("shared.bin").unwrap();
    assert_eq!(content.len(), SIZE);
    let first = content[0];
    assert!((1..=8).contains(&first));
    assert!(content.iter().all(|&b| b == first), "content is torn");
    assert_eq!(service.list().unwrap(), vec!["shared.bin".to_string()]);
}
