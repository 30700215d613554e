//! Paginated archive listings

use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, ResponseTemplate};

use zmsync_core::ports::{DirectoryHandle, IRemoteStore};

use crate::common::{credential, setup_drive_mock};

fn folder() -> DirectoryHandle {
    DirectoryHandle {
        id: "folder-1".to_string(),
        name: "zm-events".to_string(),
    }
}

#[tokio::test]
async fn test_list_files_follows_pagination() {
    let (server, store) = setup_drive_mock().await;
    let query = "mimeType = 'application/zip' and trashed = false and 'folder-1' in parents";

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", query))
        .and(query_param("pageSize", "1000"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "nextPageToken": "page-2",
            "files": [{
                "id": "a",
                "name": "1_19_03_04_21_20.zip",
                "md5Checksum": "0cc175b9c0f1b6a831c399e269772661"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", query))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{
                "id": "b",
                "name": "1_19_03_04_21_22.zip",
                "md5Checksum": "92eb5ffee6ae2fec3ad71c777531578f"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let entries = store
        .list_files("application/zip", &folder(), &credential())
        .await
        .unwrap();

    let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(
        entries[1].checksum.as_str(),
        "92eb5ffee6ae2fec3ad71c777531578f"
    );
}

#[tokio::test]
async fn test_list_files_skips_entries_without_checksum() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                { "id": "a", "name": "no-sum.zip" },
                { "id": "b", "name": "ok.zip", "md5Checksum": "0cc175b9c0f1b6a831c399e269772661" }
            ]
        })))
        .mount(&server)
        .await;

    let entries = store
        .list_files("application/zip", &folder(), &credential())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "ok.zip");
}

#[tokio::test]
async fn test_list_files_server_error_reads_as_transient() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let err = store
        .list_files("application/zip", &folder(), &credential())
        .await
        .unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("Server error (503)"), "{message}");
}
