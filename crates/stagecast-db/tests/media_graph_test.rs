mod helpers;

use bytes::Bytes;
use helpers::{setup_test_db, upload, Backend, TestDb};
use stagecast_core::models::{MediaVideoMetadata, NewMedia};
use stagecast_core::{AppError, MediaId};
use stagecast_db::{DependencyRepository, MediaMetadataRepository, ProjectMediaRepository, ProjectRepository};
use uuid::Uuid;

async fn count_rows(db: &TestDb, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(&db.pool)
        .await
        .unwrap();
    count
}

async fn assert_chain_cascade(backend: Backend) {
    let db = setup_test_db().await;
    let storage = db.storage(backend).await;
    let media = db.media_repo(storage.clone()).await;
    let deps = DependencyRepository::new(db.pool.clone());
    let metadata = MediaMetadataRepository::new(db.pool.clone());
    let org = Uuid::new_v4();

    let a = upload(&media, org, "mp4", true).await;
    let b = upload(&media, org, "m3u8", false).await;
    let c = upload(&media, org, "ts", false).await;
    let thumb = upload(&media, org, "jpg", false).await;
    deps.create_dependency(a.id, b.id).await.unwrap();
    deps.create_dependency(b.id, c.id).await.unwrap();
    deps.create_dependency(a.id, thumb.id).await.unwrap();
    metadata
        .insert_video_metadata(&MediaVideoMetadata {
            video_media_id: a.id,
            hls_media_id: b.id,
            thumbnail_media_id: thumb.id,
            duration: 12.5,
        })
        .await
        .unwrap();

    let deleted = media.delete_media(&a.media_name().to_string()).await.unwrap();
    assert_eq!(deleted.len(), 4);

    assert_eq!(count_rows(&db, "medias").await, 0);
    assert_eq!(count_rows(&db, "media_dependencies").await, 0);
    assert_eq!(count_rows(&db, "media_video_metadata").await, 0);
    for m in [&a, &b, &c, &thumb] {
        assert!(!storage.exists(&m.media_name().to_string()).await.unwrap());
    }
}

#[tokio::test]
async fn test_cascade_delete_chain_local_backend() {
    assert_chain_cascade(Backend::Local).await;
}

#[tokio::test]
async fn test_cascade_delete_chain_object_backend() {
    assert_chain_cascade(Backend::Object).await;
}

#[tokio::test]
async fn test_delete_absent_media_is_noop() {
    let db = setup_test_db().await;
    let media = db.media_repo(db.storage(Backend::Local).await).await;
    let deleted = media
        .delete_media(&MediaId::new().with_extension("mp4").to_string())
        .await
        .unwrap();
    assert!(deleted.is_empty());
}

#[tokio::test]
async fn test_delete_leaves_unrelated_media() {
    let db = setup_test_db().await;
    let media = db.media_repo(db.storage(Backend::Local).await).await;
    let deps = DependencyRepository::new(db.pool.clone());
    let org = Uuid::new_v4();

    let a = upload(&media, org, "mp4", true).await;
    let b = upload(&media, org, "jpg", false).await;
    let other = upload(&media, org, "png", true).await;
    deps.create_dependency(a.id, b.id).await.unwrap();

    media.cascade_delete(a.id).await.unwrap();
    assert!(media.get(other.id).await.unwrap().is_some());
    assert!(media.get(b.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_dependency_insert_is_idempotent() {
    let db = setup_test_db().await;
    let media = db.media_repo(db.storage(Backend::Local).await).await;
    let deps = DependencyRepository::new(db.pool.clone());
    let org = Uuid::new_v4();
    let a = upload(&media, org, "mp4", true).await;
    let b = upload(&media, org, "m3u8", false).await;

    assert!(deps.create_dependency(a.id, b.id).await.unwrap());
    assert!(!deps.create_dependency(a.id, b.id).await.unwrap());
    assert_eq!(count_rows(&db, "media_dependencies").await, 1);
    assert_eq!(deps.descendants_of(a.id).await.unwrap(), vec![b.id]);
}

#[tokio::test]
async fn test_resumable_upload_flow() {
    let db = setup_test_db().await;
    let storage = db.storage(Backend::Local).await;
    let media = db.media_repo(storage.clone()).await;
    let org = Uuid::new_v4();
    let id = MediaId::new();
    let name = id.with_extension("bin").to_string();

    let started = media
        .begin_upload(NewMedia::user_upload(id, "bin", org, None, Some("clip.bin".into())))
        .await
        .unwrap();
    assert!(!started.is_complete);
    assert_eq!(started.file_offset, 0);

    media.write_chunk(&name, 0, Bytes::from_static(b"abc")).await.unwrap();
    assert_eq!(media.upload_offset(&name).await.unwrap(), 3);

    let resumed = media
        .begin_upload(NewMedia::user_upload(id, "bin", org, None, None))
        .await
        .unwrap();
    assert_eq!(resumed.file_offset, 3);

    let err = media.write_chunk(&name, 1, Bytes::from_static(b"x")).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    media.write_chunk(&name, 3, Bytes::from_static(b"def")).await.unwrap();
    let done = media.complete_media(&name).await.unwrap();
    assert!(done.is_complete);
    assert_eq!(done.file_size, Some(6));
    assert_eq!(storage.download(&name).await.unwrap(), "abcdef");

    let again = media.complete_media(&name).await.unwrap();
    assert!(again.is_complete);

    // Beginning a finished upload returns the row and stages nothing.
    let reopened = media
        .begin_upload(NewMedia::user_upload(id, "bin", org, None, None))
        .await
        .unwrap();
    assert!(reopened.is_complete);
    assert!(!db.dir.path().join("staging").join(format!("{}.part", name)).exists());
    assert_eq!(storage.download(&name).await.unwrap(), "abcdef");
}

#[tokio::test]
async fn test_complete_missing_media_fails() {
    let db = setup_test_db().await;
    let media = db.media_repo(db.storage(Backend::Local).await).await;
    let err = media
        .complete_media(&MediaId::new().with_extension("mp4").to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref msg) if msg.contains("Media not found")));
}

#[tokio::test]
async fn test_begin_upload_rejects_extension_change() {
    let db = setup_test_db().await;
    let media = db.media_repo(db.storage(Backend::Local).await).await;
    let org = Uuid::new_v4();
    let id = MediaId::new();
    media
        .begin_upload(NewMedia::user_upload(id, "mp4", org, None, None))
        .await
        .unwrap();
    let err = media
        .begin_upload(NewMedia::user_upload(id, "mov", org, None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_all_media_of_projects_includes_closure() {
    let db = setup_test_db().await;
    let media = db.media_repo(db.storage(Backend::Local).await).await;
    let deps = DependencyRepository::new(db.pool.clone());
    let links = ProjectMediaRepository::new(db.pool.clone());
    let projects = ProjectRepository::new(db.pool.clone());
    let org = Uuid::new_v4();

    let project = projects.create_local(org, "show", "Show").await.unwrap();
    let video = upload(&media, org, "mp4", true).await;
    let hls = upload(&media, org, "m3u8", false).await;
    let segment = upload(&media, org, "ts", false).await;
    let unrelated = upload(&media, org, "png", true).await;
    deps.create_dependency(video.id, hls.id).await.unwrap();
    deps.create_dependency(hls.id, segment.id).await.unwrap();
    links.attach(project.id, video.id, None).await.unwrap();

    let all = links.all_media_of_projects(&media, &[project.id]).await.unwrap();
    let ids: Vec<MediaId> = all.iter().map(|m| m.id).collect();
    assert_eq!(ids.len(), 3);
    for expected in [video.id, hls.id, segment.id] {
        assert!(ids.contains(&expected));
    }
    assert!(!ids.contains(&unrelated.id));
}

#[tokio::test]
async fn test_unlink_plugin_keeps_media() {
    let db = setup_test_db().await;
    let media = db.media_repo(db.storage(Backend::Local).await).await;
    let links = ProjectMediaRepository::new(db.pool.clone());
    let projects = ProjectRepository::new(db.pool.clone());
    let org = Uuid::new_v4();
    let plugin = Uuid::new_v4();

    let p1 = projects.create_local(org, "one", "One").await.unwrap();
    let p2 = projects.create_local(org, "two", "Two").await.unwrap();
    let image = upload(&media, org, "png", true).await;
    links.attach(p1.id, image.id, Some(plugin)).await.unwrap();
    links.attach(p2.id, image.id, Some(plugin)).await.unwrap();
    links.attach(p1.id, image.id, None).await.unwrap();

    let removed = links.unlink_plugin(plugin, Some(image.id), Some(p1.id)).await.unwrap();
    assert_eq!(removed, 1);
    let removed = links.unlink_plugin(plugin, None, None).await.unwrap();
    assert_eq!(removed, 1);

    assert!(media.get(image.id).await.unwrap().is_some());
    assert_eq!(links.media_ids_of_projects(&[p1.id]).await.unwrap(), vec![image.id]);
}
