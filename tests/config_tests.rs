// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use intruder_cam::config::CameraSourceConfig;
use intruder_cam::errors::ConfigError;
use intruder_cam::storage::{Cleanup, RetentionPolicy};
use intruder_cam::{CameraFacing, Config};
use std::io::Write;
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.base_url, "http://localhost:8000");
    assert_eq!(config.capture_interval(), Duration::from_secs(5));
    assert_eq!(config.facing, CameraFacing::Front);
    assert_eq!(
        config.retention,
        RetentionPolicy::RotateUnique {
            cleanup: Cleanup::AfterUpload
        }
    );
    assert!(config.validate().is_ok(), "Default config should be usable");
}

#[test]
fn test_config_load_partial_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "base_url": "https://cam.example.org",
            "capture_interval_ms": 2000,
            "facing": "back",
            "retention": {{ "kind": "overwrite-fixed", "file_name": "latest.jpg" }},
            "source": {{ "kind": "file", "front": "/tmp/still.jpg" }}
        }}"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.base_url, "https://cam.example.org");
    assert_eq!(config.capture_interval(), Duration::from_secs(2));
    assert_eq!(config.facing, CameraFacing::Back);
    assert_eq!(
        config.retention,
        RetentionPolicy::OverwriteFixed {
            file_name: "latest.jpg".into()
        }
    );
    assert_eq!(
        config.source,
        CameraSourceConfig::File {
            front: Some("/tmp/still.jpg".into()),
            back: None,
        }
    );
    // Keys not in the file keep their defaults
    assert_eq!(config.upload.field_name, "image");
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_load_errors_name_the_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();

    match Config::load(file.path()) {
        Err(ConfigError::File { path, .. }) => assert_eq!(path, file.path()),
        other => panic!("expected a file error, got {:?}", other),
    }
}

#[test]
fn test_config_rejects_bad_base_url() {
    for url in ["", "localhost:8000", "ftp://example.org", "http://host/?q=1"] {
        let config = Config {
            base_url: url.to_string(),
            ..Config::default()
        };
        assert!(
            matches!(config.validate(), Err(ConfigError::InvalidBaseUrl(_))),
            "{:?} should be rejected",
            url
        );
    }
}

#[test]
fn test_config_rejects_fixed_name_outside_storage_dir() {
    for name in ["../photo.jpg", "..", ".", "", "sub\\photo.jpg"] {
        let config = Config {
            retention: RetentionPolicy::OverwriteFixed {
                file_name: name.to_string(),
            },
            ..Config::default()
        };
        assert!(
            matches!(config.validate(), Err(ConfigError::InvalidRetention(_))),
            "{:?} should be rejected",
            name
        );
    }
}

#[test]
fn test_config_api_base_trims_slash() {
    let config = Config {
        base_url: "http://10.0.0.5:8000/".into(),
        ..Config::default()
    };
    assert_eq!(config.api_base().unwrap().as_str(), "http://10.0.0.5:8000");
}
