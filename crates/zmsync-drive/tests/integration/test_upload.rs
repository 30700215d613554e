//! Multipart uploads

use wiremock::matchers::{body_string_contains, header, header_regex, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use std::time::Duration;

use zmsync_core::ports::{DirectoryHandle, ErrorClass, IRemoteStore};

use crate::common::{credential, setup_drive_mock};

fn folder() -> DirectoryHandle {
    DirectoryHandle {
        id: "folder-1".to_string(),
        name: "zm-events".to_string(),
    }
}

#[tokio::test]
async fn test_upload_sends_metadata_and_content() {
    let (server, store) = setup_drive_mock().await;
    let dir = tempfile::TempDir::new().unwrap();
    let archive = dir.path().join("1_19_03_04_21_22.zip");
    std::fs::write(&archive, b"archive-bytes").unwrap();

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "multipart"))
        .and(header("Authorization", "Bearer test-access-token"))
        .and(header_regex("Content-Type", "^multipart/related; boundary=.+$"))
        .and(body_string_contains(r#""name":"1_19_03_04_21_22.zip""#))
        .and(body_string_contains(r#""parents":["folder-1"]"#))
        .and(body_string_contains("Content-Type: application/zip"))
        .and(body_string_contains("archive-bytes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "file-9",
            "name": "1_19_03_04_21_22.zip",
            "md5Checksum": "C3A2B9A5E2B5C3B2A1D4E5F60718293A"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let handle = store
        .upload(&archive, &folder(), &credential())
        .await
        .unwrap();

    assert_eq!(handle.id, "file-9");
    assert_eq!(handle.name, "1_19_03_04_21_22.zip");
    assert_eq!(
        handle.checksum.unwrap().as_str(),
        "c3a2b9a5e2b5c3b2a1d4e5f60718293a"
    );
}

#[tokio::test]
async fn test_upload_missing_local_file_fails_without_request() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = store
        .upload(
            std::path::Path::new("/nonexistent/-var-events-500-19-03-04-21-22.zip"),
            &folder(),
            &credential(),
        )
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read"));
    assert_eq!(store.classify_error(&err), ErrorClass::Permanent);
}

#[tokio::test]
async fn test_upload_rate_limited() {
    let (server, store) = setup_drive_mock().await;
    let dir = tempfile::TempDir::new().unwrap();
    let archive = dir.path().join("a.zip");
    std::fs::write(&archive, b"x").unwrap();

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let err = store
        .upload(&archive, &folder(), &credential())
        .await
        .unwrap_err();

    let drive_err = err.downcast_ref::<zmsync_drive::DriveError>().unwrap();
    assert!(matches!(
        drive_err,
        zmsync_drive::DriveError::TooManyRequests {
            retry_after: Some(d)
        } if d.as_secs() == 7
    ));
    assert_eq!(
        store.classify_error(&err),
        ErrorClass::Transient {
            retry_after: Some(Duration::from_secs(7))
        }
    );
}
