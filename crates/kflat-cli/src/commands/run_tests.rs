use std::fs;
use std::path::PathBuf;

use kflat_image::{Image, ImageError};

use super::check::check;
use super::run::{RunArgs, capture, load_config, summary};

fn args(target: &str) -> RunArgs {
    RunArgs {
        target: target.to_owned(),
        output: None,
        max_size: None,
        config: None,
        debug: false,
    }
}

#[test]
fn capture_simple() {
    let bytes = capture(&args("SIMPLE")).unwrap();
    let image = Image::from_bytes(&bytes).unwrap();

    let line = summary("SIMPLE", &image);
    assert!(line.starts_with("SIMPLE: "), "{line}");
    assert!(line.ends_with("3 nodes, 3 fixups, 1 roots"), "{line}");
}

#[test]
fn capture_is_deterministic() {
    assert_eq!(
        capture(&args("STRUCTARRAY")).unwrap(),
        capture(&args("STRUCTARRAY")).unwrap()
    );
}

#[test]
fn unknown_target() {
    let err = capture(&args("NOPE")).unwrap_err();
    insta::assert_snapshot!(err, @"unknown target 'NOPE'; run 'kflat targets' for the list");
}

#[test]
fn size_limit_aborts_capture() {
    let args = RunArgs {
        max_size: Some(40),
        ..args("SIMPLE")
    };
    let err = capture(&args).unwrap_err();
    insta::assert_snapshot!(err, @"capture of 'SIMPLE' failed: size limit exceeded: 48 bytes, limit is 40");
}

#[test]
fn config_file_applies() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flat.json");
    fs::write(&path, r#"{ "max_size": 40, "invalid_pointers": "treat_as_null" }"#).unwrap();

    let err = capture(&RunArgs {
        config: Some(path.clone()),
        ..args("SIMPLE")
    })
    .unwrap_err();
    assert!(err.contains("size limit exceeded"), "{err}");

    // The flag wins over the file.
    let config = load_config(Some(&path), Some(4096)).unwrap();
    assert_eq!(config.max_size, 4096);
    capture(&RunArgs {
        config: Some(path),
        max_size: Some(4096),
        ..args("SIMPLE")
    })
    .unwrap();
}

#[test]
fn config_file_rejects_unknown_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flat.json");
    fs::write(&path, r#"{ "max_bytes": 1 }"#).unwrap();

    let err = load_config(Some(&path), None).unwrap_err();
    assert!(err.starts_with("invalid config"), "{err}");
}

#[test]
fn missing_config_file() {
    let err = load_config(Some(&PathBuf::from("/nonexistent/flat.json")), None).unwrap_err();
    assert!(err.starts_with("failed to read '/nonexistent/flat.json'"), "{err}");
}

#[test]
fn written_image_checks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("list.kflat");
    fs::write(&path, capture(&args("LIST")).unwrap()).unwrap();

    check(&path).unwrap();

    // Flip one data byte.
    let mut bytes = fs::read(&path).unwrap();
    bytes[64] ^= 0xff;
    fs::write(&path, &bytes).unwrap();
    assert!(matches!(
        check(&path),
        Err(ImageError::ChecksumMismatch { .. })
    ));
}

#[test]
fn check_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        check(&dir.path().join("absent.kflat")),
        Err(ImageError::Io(_))
    ));
}
