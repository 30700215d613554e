//! Folder lookup and creation

use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use zmsync_core::ports::IRemoteStore;

use crate::common::{credential, setup_drive_mock};

#[tokio::test]
async fn test_ensure_directory_reuses_existing_folder() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(header("Authorization", "Bearer test-access-token"))
        .and(query_param(
            "q",
            "name = 'zm-events' and mimeType = 'application/vnd.google-apps.folder' and trashed = false and 'root' in parents",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                { "id": "prefix-match", "name": "zm-events-old" },
                { "id": "folder-1", "name": "zm-events" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let handle = store
        .ensure_directory("zm-events", &credential())
        .await
        .unwrap();

    assert_eq!(handle.id, "folder-1");
    assert_eq!(handle.name, "zm-events");
}

#[tokio::test]
async fn test_ensure_directory_creates_missing_folder() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "files": [] })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(body_json(serde_json::json!({
            "name": "zm-events",
            "mimeType": "application/vnd.google-apps.folder"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "id": "new-folder", "name": "zm-events" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let handle = store
        .ensure_directory("zm-events", &credential())
        .await
        .unwrap();

    assert_eq!(handle.id, "new-folder");
}

#[tokio::test]
async fn test_ensure_directory_ignores_folders_outside_root() {
    let (server, store) = setup_drive_mock().await;

    // Nothing by that name at the root
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param(
            "q",
            "name = 'zm-events' and mimeType = 'application/vnd.google-apps.folder' and trashed = false and 'root' in parents",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "files": [] })))
        .expect(1)
        .mount(&server)
        .await;

    // What an unscoped lookup would see: a same-named folder nested elsewhere
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{ "id": "nested-in-other-folder", "name": "zm-events" }]
        })))
        .with_priority(10)
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "id": "root-folder", "name": "zm-events" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let handle = store
        .ensure_directory("zm-events", &credential())
        .await
        .unwrap();

    assert_eq!(handle.id, "root-folder");
}

#[tokio::test]
async fn test_folder_name_is_escaped_in_query() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param(
            "q",
            "name = 'Bob\\'s cams' and mimeType = 'application/vnd.google-apps.folder' and trashed = false and 'root' in parents",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{ "id": "f1", "name": "Bob's cams" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let handle = store
        .ensure_directory("Bob's cams", &credential())
        .await
        .unwrap();
    assert_eq!(handle.id, "f1");
}

#[tokio::test]
async fn test_ensure_directory_surfaces_unauthorized() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "code": 401, "message": "Invalid Credentials" }
        })))
        .mount(&server)
        .await;

    let err = store
        .ensure_directory("zm-events", &credential())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Unauthorized: Invalid Credentials"));
}
