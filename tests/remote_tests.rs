// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the upload and reports clients

mod common;

use chrono::Local;
use common::{BASE_URL, MemoryFilesystem, MockTransport};
use intruder_cam::errors::UploadError;
use intruder_cam::remote::{ApiBase, ReportsClient, UploadClient, UploadForm};
use intruder_cam::storage::Artifact;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

fn artifact(path: &str) -> Artifact {
    Artifact {
        path: PathBuf::from(path),
        captured_at: Local::now(),
        size_bytes: None,
    }
}

#[tokio::test]
async fn test_upload_uses_configured_form() {
    let fs = Arc::new(MemoryFilesystem::default());
    fs.insert("/captures/a.jpg", b"jpeg bytes");
    let transport = Arc::new(MockTransport::default());
    transport.set_upload_body(json!({ "is_intruder": true, "id": 7 }));

    let form = UploadForm {
        field_name: "file".into(),
        ..UploadForm::default()
    };
    let base = ApiBase::parse("http://classifier.test:8000/").unwrap();
    let client = UploadClient::new(transport.clone(), fs, &base, form);
    assert_eq!(client.endpoint(), "http://classifier.test:8000/api/predict/");

    let response = client.submit(&artifact("/captures/a.jpg")).await.unwrap();
    assert_eq!(response.is_intruder(), Some(true));

    let posts = transport.posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].1.field_name, "file");
    assert_eq!(posts[0].1.file_name, "photo.jpg");
    assert_eq!(posts[0].1.bytes, b"jpeg bytes".to_vec());
}

#[tokio::test]
async fn test_upload_of_missing_or_empty_artifact() {
    let fs = Arc::new(MemoryFilesystem::default());
    fs.insert("/captures/empty.jpg", b"");
    let transport = Arc::new(MockTransport::default());
    let base = ApiBase::parse(BASE_URL).unwrap();
    let client = UploadClient::new(transport.clone(), fs, &base, UploadForm::default());

    let missing = client.submit(&artifact("/captures/gone.jpg")).await;
    assert!(matches!(missing, Err(UploadError::Payload(_))));

    let empty = client.submit(&artifact("/captures/empty.jpg")).await;
    assert!(matches!(empty, Err(UploadError::Payload(_))));

    assert_eq!(transport.post_count(), 0, "Nothing is sent for an unreadable artifact");
}

#[tokio::test]
async fn test_reports_are_rebased() {
    let transport = Arc::new(MockTransport::default());
    transport.set_get_body(json!([
        {
            "id": 1,
            "is_intruder": true,
            "created_at": "2025-03-01T10:15:00Z",
            "image": "http://localhost:8000/media/reports/1.jpg"
        },
        {
            "id": 2,
            "is_intruder": false,
            "created_at": "2025-03-01T10:16:00Z",
            "image": "https://cdn.example.org/2.jpg"
        },
        {
            "id": 3,
            "is_intruder": false,
            "created_at": "2025-03-01T10:17:00Z",
            "image": "/media/reports/3.jpg"
        }
    ]));

    let base = ApiBase::parse(BASE_URL).unwrap();
    let reports = ReportsClient::new(transport.clone(), base).fetch().await.unwrap();

    assert_eq!(
        *transport.gets.lock().unwrap(),
        vec!["http://classifier.test:8000/api/reports/".to_string()]
    );
    assert_eq!(reports.len(), 3);
    assert_eq!(
        reports[0].image,
        "http://classifier.test:8000/media/reports/1.jpg"
    );
    assert_eq!(reports[1].image, "https://cdn.example.org/2.jpg");
    assert_eq!(
        reports[2].image,
        "http://classifier.test:8000/media/reports/3.jpg"
    );
    assert!(reports[0].is_intruder);
}

#[tokio::test]
async fn test_reports_with_unexpected_layout() {
    let transport = Arc::new(MockTransport::default());
    transport.set_get_body(json!({ "detail": "not a list" }));

    let base = ApiBase::parse(BASE_URL).unwrap();
    let result = ReportsClient::new(transport, base).fetch().await;

    assert!(matches!(result, Err(UploadError::InvalidResponse(_))));
}
