mod helpers;

use chrono::{TimeZone, Utc};
use helpers::setup_test_db;
use stagecast_core::models::{ProjectUpsert, TaskStatus, TaskType, VideoTranscodePayload};
use stagecast_core::MediaId;
use stagecast_db::{CloudConnectionRepository, ProjectRepository, TaskRepository, TaxonomyRepository};
use uuid::Uuid;

fn remote_project(cloud_id: Uuid, slug: &str, updated_hour: u32) -> ProjectUpsert {
    ProjectUpsert {
        cloud_project_id: cloud_id,
        slug: slug.to_string(),
        name: slug.to_uppercase(),
        category_id: None,
        target_date: None,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 2, 1, updated_hour, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_upsert_preserves_remote_timestamps() {
    let db = setup_test_db().await;
    let connections = CloudConnectionRepository::new(db.pool.clone());
    let projects = ProjectRepository::new(db.pool.clone());
    let org = Uuid::new_v4();
    let connection = connections
        .create(org, None, "https://cloud.example.com", "token", Some("acme"))
        .await
        .unwrap();
    let x = Uuid::new_v4();

    projects
        .upsert_mirrored(org, connection.id, &[remote_project(x, "x", 1)])
        .await
        .unwrap();
    let stored = projects
        .upsert_mirrored(org, connection.id, &[remote_project(x, "x-renamed", 2)])
        .await
        .unwrap();

    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].slug, "x-renamed");
    let expected = Utc.with_ymd_and_hms(2024, 2, 1, 2, 0, 0).unwrap();
    assert_eq!(stored[0].updated_at, expected);
    assert_eq!(stored[0].cloud_last_updated, Some(expected));

    let stamps = projects.cloud_stamps(org).await.unwrap();
    assert_eq!(stamps.get(&x), Some(&Some(expected)));
}

#[tokio::test]
async fn test_delete_absent_removes_only_missing_mirrored_projects() {
    let db = setup_test_db().await;
    let connections = CloudConnectionRepository::new(db.pool.clone());
    let projects = ProjectRepository::new(db.pool.clone());
    let org = Uuid::new_v4();
    let connection = connections
        .create(org, None, "https://cloud.example.com", "token", Some("acme"))
        .await
        .unwrap();
    let (x, y) = (Uuid::new_v4(), Uuid::new_v4());
    projects
        .upsert_mirrored(org, connection.id, &[remote_project(x, "x", 1), remote_project(y, "y", 1)])
        .await
        .unwrap();
    let local = projects.create_local(org, "local", "Local").await.unwrap();

    let removed = projects.delete_absent(org, connection.id, &[x]).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(projects.by_cloud_ids(org, &[x, y]).await.unwrap().len(), 1);
    assert!(projects.get(local.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_existing_tag_keeps_color() {
    let db = setup_test_db().await;
    let taxonomy = TaxonomyRepository::new(db.pool.clone());
    let org = Uuid::new_v4();
    let local = taxonomy.create_tag(org, "drama", Some("#ff0000")).await.unwrap();

    let found = taxonomy.tags_by_names(org, &["drama".to_string()]).await.unwrap();
    assert_eq!(found, vec![local.clone()]);
    assert_eq!(
        taxonomy.get_tag(local.id).await.unwrap().unwrap().color.as_deref(),
        Some("#ff0000")
    );
}

#[tokio::test]
async fn test_duplicate_names_return_oldest_first() {
    let db = setup_test_db().await;
    let taxonomy = TaxonomyRepository::new(db.pool.clone());
    let org = Uuid::new_v4();

    let mut created = Vec::new();
    for color in ["#000001", "#000002", "#000003", "#000004", "#000005"] {
        created.push(taxonomy.create_tag(org, "dup", Some(color)).await.unwrap());
    }
    let found = taxonomy.tags_by_names(org, &["dup".to_string()]).await.unwrap();
    assert_eq!(found, created);

    let first = taxonomy.create_category(org, "events").await.unwrap();
    for _ in 0..4 {
        taxonomy.create_category(org, "events").await.unwrap();
    }
    let categories = taxonomy
        .categories_by_names(org, &["events".to_string()])
        .await
        .unwrap();
    assert_eq!(categories.len(), 5);
    assert_eq!(categories[0], first);
}

#[tokio::test]
async fn test_tag_links_diff_round_trip() {
    let db = setup_test_db().await;
    let projects = ProjectRepository::new(db.pool.clone());
    let taxonomy = TaxonomyRepository::new(db.pool.clone());
    let org = Uuid::new_v4();
    let project = projects.create_local(org, "p", "P").await.unwrap();
    let t1 = taxonomy.create_tag(org, "one", None).await.unwrap();
    let t2 = taxonomy.create_tag(org, "two", None).await.unwrap();

    assert_eq!(projects.link_tags(&[(project.id, t1.id), (project.id, t2.id)]).await.unwrap(), 2);
    assert_eq!(projects.link_tags(&[(project.id, t1.id)]).await.unwrap(), 0);
    assert_eq!(projects.unlink_tags(&[(project.id, t1.id)]).await.unwrap(), 1);
    assert_eq!(projects.project_tag_ids(&[project.id]).await.unwrap(), vec![(project.id, t2.id)]);
}

#[tokio::test]
async fn test_organization_list_is_cached() {
    let db = setup_test_db().await;
    let connections = CloudConnectionRepository::new(db.pool.clone());
    let org = Uuid::new_v4();
    let connection = connections
        .create(org, None, "https://cloud.example.com", "token", None)
        .await
        .unwrap();
    connections
        .set_organization_list(connection.id, &["acme".to_string(), "globex".to_string()])
        .await
        .unwrap();
    assert_eq!(
        connections.get(connection.id).await.unwrap().organization_list,
        vec!["acme", "globex"]
    );
    assert!(connections.get(Uuid::new_v4()).await.is_err());
}

#[tokio::test]
async fn test_claim_only_requested_types() {
    let db = setup_test_db().await;
    let tasks = TaskRepository::new(db.pool.clone());
    let org = Uuid::new_v4();

    tasks
        .create_task(org, TaskType::ProjectSyncDocument, serde_json::json!({}), 10, None, None, None)
        .await
        .unwrap();
    let transcode = tasks
        .enqueue(org, &VideoTranscodePayload { media_id: MediaId::new() })
        .await
        .unwrap();

    let claimed = tasks
        .claim_next_task(&[TaskType::VideoTranscode, TaskType::CloudConnectionSync])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, transcode.id);
    assert_eq!(claimed.status, TaskStatus::Running);
    assert!(tasks.claim_next_task(&[TaskType::VideoTranscode]).await.unwrap().is_none());

    let retried = tasks.increment_retry(claimed.id, 60).await.unwrap();
    assert_eq!(retried.status, TaskStatus::Scheduled);
    assert_eq!(retried.retry_count, 1);
    assert!(tasks.claim_next_task(&[TaskType::VideoTranscode]).await.unwrap().is_none());

    let done = tasks.mark_completed(claimed.id, serde_json::json!({"ok": true})).await.unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_stale_running_task_is_requeued() {
    let db = setup_test_db().await;
    let tasks = TaskRepository::new(db.pool.clone());
    let org = Uuid::new_v4();
    let task = tasks
        .enqueue(org, &VideoTranscodePayload { media_id: MediaId::new() })
        .await
        .unwrap();
    tasks.claim_next_task(&[TaskType::VideoTranscode]).await.unwrap().unwrap();

    assert_eq!(tasks.reap_stale_running_tasks(3600, 300).await.unwrap(), 0);
    assert_eq!(tasks.reap_stale_running_tasks(0, 0).await.unwrap(), 1);

    let reclaimed = tasks.claim_next_task(&[TaskType::VideoTranscode]).await.unwrap().unwrap();
    assert_eq!(reclaimed.id, task.id);
}
