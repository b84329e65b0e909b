//! HTTP surface tests.
//!
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use helpers::{setup_test_app, ORG_HEADER, REMOTE_ORGANIZATIONS, USER_HEADER};
use serde_json::{json, Value};
use stagecast_api::{SyncEnqueuedResponse, UploadSessionResponse, UPLOAD_OFFSET_HEADER};
use stagecast_core::models::{
    CloudSyncPayload, Media, NewMedia, TaskType, UploadMediaResponse, VideoTranscodePayload,
};
use stagecast_core::MediaId;
use stagecast_db::MediaSource;
use uuid::Uuid;

fn upload_form(file_name: &str, data: &'static [u8]) -> MultipartForm {
    MultipartForm::new().add_part("file", Part::bytes(data.to_vec()).file_name(file_name))
}

#[tokio::test]
async fn test_resumable_upload_round_trip() {
    let app = setup_test_app().await;
    let org = app.org.to_string();

    let session: UploadSessionResponse = app
        .server
        .post("/media/uploads")
        .add_header(ORG_HEADER, org.clone())
        .add_header(USER_HEADER, app.user.to_string())
        .json(&json!({ "fileExtension": "mp4", "originalName": "clip.mp4" }))
        .await
        .json();
    assert_eq!(session.offset, 0);
    assert!(session.upload_id.ends_with(".mp4"));
    let path = format!("/media/uploads/{}", session.upload_id);

    let first = app
        .server
        .patch(&path)
        .add_header(ORG_HEADER, org.clone())
        .add_header(UPLOAD_OFFSET_HEADER, "0")
        .bytes(Bytes::from_static(b"hello "))
        .await;
    assert_eq!(first.status_code(), StatusCode::NO_CONTENT);

    let status = app
        .server
        .method(Method::HEAD, &path)
        .add_header(ORG_HEADER, org.clone())
        .await;
    assert_eq!(status.header(UPLOAD_OFFSET_HEADER), "6");

    // Replaying the first chunk is rejected; the client resumes from HEAD.
    let replay = app
        .server
        .patch(&path)
        .add_header(ORG_HEADER, org.clone())
        .add_header(UPLOAD_OFFSET_HEADER, "0")
        .bytes(Bytes::from_static(b"hello "))
        .expect_failure()
        .await;
    assert_eq!(replay.status_code(), StatusCode::CONFLICT);

    app.server
        .patch(&path)
        .add_header(ORG_HEADER, org.clone())
        .add_header(UPLOAD_OFFSET_HEADER, "6")
        .bytes(Bytes::from_static(b"world"))
        .await;

    let completed: UploadMediaResponse = app
        .server
        .post(&format!("{}/complete", path))
        .add_header(ORG_HEADER, org.clone())
        .await
        .json();
    assert_eq!(completed.file_name, session.upload_id);
    assert_eq!(completed.original_file_name.as_deref(), Some("clip.mp4"));

    // Completing twice does not queue a second transcode.
    app.server
        .post(&format!("{}/complete", path))
        .add_header(ORG_HEADER, org.clone())
        .await;
    let tasks = app
        .state
        .sync
        .tasks
        .list_by_type(TaskType::VideoTranscode)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    let payload: VideoTranscodePayload = tasks[0].try_payload_as().unwrap();
    assert_eq!(payload.media_id, session.media_id);

    let served = app.server.get(&completed.url).await;
    assert_eq!(served.status_code(), StatusCode::OK);
    assert_eq!(served.header("content-type"), "video/mp4");
    assert_eq!(served.as_bytes().as_ref(), b"hello world");
}

#[tokio::test]
async fn test_requests_without_organization_are_rejected() {
    let app = setup_test_app().await;
    let response = app
        .server
        .post("/media/uploads")
        .json(&json!({ "fileExtension": "png" }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_media_id_is_rejected() {
    let app = setup_test_app().await;
    let response = app
        .server
        .post("/media/uploads")
        .add_header(ORG_HEADER, app.org.to_string())
        .json(&json!({ "mediaId": "not-a-media-id", "fileExtension": "png" }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_multipart_upload_then_delete() {
    let app = setup_test_app().await;
    let org = app.org.to_string();

    let response = app
        .server
        .post("/media")
        .add_header(ORG_HEADER, org.clone())
        .multipart(upload_form("cover.bin", b"not really an image"))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let uploaded: UploadMediaResponse = response.json();
    assert_eq!(uploaded.file_extension, "bin");
    assert_eq!(uploaded.original_file_name.as_deref(), Some("cover.bin"));

    // Non-video uploads queue nothing.
    let tasks = app
        .state
        .sync
        .tasks
        .list_by_type(TaskType::VideoTranscode)
        .await
        .unwrap();
    assert!(tasks.is_empty());

    let path = format!("/media/{}", uploaded.file_name);
    let foreign = app
        .server
        .delete(&path)
        .add_header(ORG_HEADER, Uuid::new_v4().to_string())
        .expect_failure()
        .await;
    assert_eq!(foreign.status_code(), StatusCode::NOT_FOUND);

    let deleted: Value = app
        .server
        .delete(&path)
        .add_header(ORG_HEADER, org.clone())
        .await
        .json();
    assert_eq!(deleted["deleted"].as_array().unwrap().len(), 1);

    let again: Value = app
        .server
        .delete(&path)
        .add_header(ORG_HEADER, org)
        .await
        .json();
    assert!(again["deleted"].as_array().unwrap().is_empty());

    app.server
        .get(&uploaded.url)
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_video_multipart_upload_enqueues_transcode() {
    let app = setup_test_app().await;
    let response = app
        .server
        .post("/media")
        .add_header(ORG_HEADER, app.org.to_string())
        .multipart(upload_form("talk.MOV", b"fake video"))
        .await;
    let uploaded: UploadMediaResponse = response.json();
    assert_eq!(uploaded.file_extension, "mov");

    let tasks = app
        .state
        .sync
        .tasks
        .list_by_type(TaskType::VideoTranscode)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].organization_id, app.org);
}

#[tokio::test]
async fn test_delete_cascades_to_derived_media() {
    let app = setup_test_app().await;
    let uploaded: UploadMediaResponse = app
        .server
        .post("/media")
        .add_header(ORG_HEADER, app.org.to_string())
        .multipart(upload_form("talk.mp4", b"fake video"))
        .await
        .json();

    let source: Media = app.state.media.get(uploaded.media_id).await.unwrap().unwrap();
    let manifest = app
        .state
        .media
        .upload_media(
            MediaSource::Bytes(Bytes::from_static(b"#EXTM3U")),
            NewMedia::derived(MediaId::new(), "m3u8", &source),
        )
        .await
        .unwrap();
    app.state
        .sync
        .dependencies
        .create_dependency(source.id, manifest.id)
        .await
        .unwrap();

    let deleted: Value = app
        .server
        .delete(&format!("/media/{}", uploaded.file_name))
        .add_header(ORG_HEADER, app.org.to_string())
        .await
        .json();
    assert_eq!(deleted["deleted"].as_array().unwrap().len(), 2);
    assert!(app.state.media.get(manifest.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_project_media_and_plugin_unlink() {
    let app = setup_test_app().await;
    let org = app.org.to_string();
    let project = app
        .state
        .sync
        .projects
        .create_local(app.org, "launch", "Launch")
        .await
        .unwrap();
    let plugin = Uuid::new_v4();

    let uploaded: UploadMediaResponse = app
        .server
        .post("/media")
        .add_header(ORG_HEADER, org.clone())
        .multipart(upload_form("notes.txt", b"agenda"))
        .await
        .json();

    let attached = app
        .server
        .post(&format!("/projects/{}/media", project.id))
        .add_header(ORG_HEADER, org.clone())
        .json(&json!({ "mediaId": uploaded.file_name, "pluginId": plugin }))
        .await;
    assert_eq!(attached.status_code(), StatusCode::CREATED);

    let media: Vec<Media> = app
        .server
        .post("/projects/media")
        .add_header(ORG_HEADER, org.clone())
        .json(&json!({ "projectIds": [project.id] }))
        .await
        .json();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].id, uploaded.media_id);

    // Another organization sees nothing through the same project ids.
    let foreign: Vec<Media> = app
        .server
        .post("/projects/media")
        .add_header(ORG_HEADER, Uuid::new_v4().to_string())
        .json(&json!({ "projectIds": [project.id] }))
        .await
        .json();
    assert!(foreign.is_empty());

    let unlinked: Value = app
        .server
        .delete(&format!("/plugins/{}/media", plugin))
        .add_query_param("projectId", project.id)
        .add_header(ORG_HEADER, org.clone())
        .await
        .json();
    assert_eq!(unlinked["removed"], 1);

    // The media row survives the unlink.
    assert!(app.state.media.get(uploaded.media_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_cloud_sync_is_enqueued_for_owner_only() {
    let app = setup_test_app().await;
    let connection = app
        .state
        .sync
        .connections
        .create(app.org, Some(app.user), "https://cloud.example.com", "token", Some("acme"))
        .await
        .unwrap();
    let path = format!("/cloud-connections/{}/sync", connection.id);

    let response = app
        .server
        .post(&path)
        .add_header(ORG_HEADER, app.org.to_string())
        .json(&json!({ "forceResync": true }))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    let enqueued: SyncEnqueuedResponse = response.json();

    let task = app.state.sync.tasks.get_task(enqueued.task_id).await.unwrap().unwrap();
    assert_eq!(task.task_type, TaskType::CloudConnectionSync);
    let payload: CloudSyncPayload = task.try_payload_as().unwrap();
    assert_eq!(payload.cloud_connection_id, connection.id);
    assert!(payload.force_resync);

    // An empty body means an unforced sync.
    let plain: SyncEnqueuedResponse = app
        .server
        .post(&path)
        .add_header(ORG_HEADER, app.org.to_string())
        .await
        .json();
    let task = app.state.sync.tasks.get_task(plain.task_id).await.unwrap().unwrap();
    assert!(!task.try_payload_as::<CloudSyncPayload>().unwrap().force_resync);

    app.server
        .post(&path)
        .add_header(ORG_HEADER, Uuid::new_v4().to_string())
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_organization_list_is_refreshed() {
    let app = setup_test_app().await;
    let connection = app
        .state
        .sync
        .connections
        .create(app.org, None, "https://cloud.example.com", "token", None)
        .await
        .unwrap();

    let body: Value = app
        .server
        .get(&format!("/cloud-connections/{}/organizations", connection.id))
        .add_header(ORG_HEADER, app.org.to_string())
        .await
        .json();
    assert_eq!(body["organizations"], json!(REMOTE_ORGANIZATIONS));

    let stored = app.state.sync.connections.get(connection.id).await.unwrap();
    assert_eq!(stored.organization_list.len(), 2);
}

#[tokio::test]
async fn test_health_reports_database() {
    let app = setup_test_app().await;
    let body: Value = app.server.get("/health").await.json();
    assert_eq!(body["status"], "ok");
}
