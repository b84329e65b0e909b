//! Mirror the projects, categories and tags of the remote organization.

use anyhow::{Context, Result};
use serde::Serialize;
use stagecast_cloud_client::RemoteProject;
use stagecast_core::models::{
    CloudConnection, CloudSyncMediaPayload, ProjectSyncDocumentPayload, ProjectUpsert,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::context::{RemoteConnector, SyncRepositories};
use crate::diff::{first_match_by_name, link_diff, names_to_create, projects_to_refresh};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSyncReport {
    /// Remote ids of the projects whose metadata was re-fetched and upserted.
    pub refreshed: Vec<Uuid>,
    pub removed: u64,
    pub categories_created: usize,
    pub tags_created: usize,
    pub tag_links_added: u64,
    pub tag_links_removed: u64,
    pub jobs_enqueued: usize,
    /// The connection has no target organization yet.
    pub skipped: bool,
}

#[derive(Clone)]
pub struct ProjectReconciler {
    repos: SyncRepositories,
    connector: Arc<dyn RemoteConnector>,
}

impl ProjectReconciler {
    pub fn new(repos: SyncRepositories, connector: Arc<dyn RemoteConnector>) -> Self {
        Self { repos, connector }
    }

    #[tracing::instrument(skip(self), fields(cloud_connection_id = %connection_id))]
    pub async fn sync(&self, connection_id: Uuid, force: bool) -> Result<ProjectSyncReport> {
        let start = Instant::now();
        let connection = self.repos.connections.get(connection_id).await?;
        let Some(slug) = connection.target_organization_slug.clone() else {
            tracing::warn!("Target organization slug not set, skipping sync");
            return Ok(ProjectSyncReport {
                skipped: true,
                ..Default::default()
            });
        };
        let remote = self.connector.connect(&connection)?;
        let org = connection.organization_id;

        let stamps = remote
            .project_stamps(&slug)
            .await
            .context("Failed to fetch remote project stamps")?;
        let local_stamps = self.repos.projects.cloud_stamps(org).await?;
        let candidates = projects_to_refresh(&stamps, &local_stamps, force);
        tracing::info!(
            remote_projects = stamps.len(),
            candidates = candidates.len(),
            force = force,
            "Computed projects to refresh"
        );

        let metadata = remote
            .project_metadata(&slug, &candidates)
            .await
            .context("Failed to fetch remote project metadata")?;

        let mut report = ProjectSyncReport::default();
        let category_ids = self.ensure_categories(org, &metadata, &mut report).await?;
        let tag_ids = self.ensure_tags(org, &metadata, &mut report).await?;

        let upserts: Vec<ProjectUpsert> = metadata
            .iter()
            .map(|project| ProjectUpsert {
                cloud_project_id: project.id,
                slug: project.slug.clone(),
                name: project.name.clone(),
                category_id: project
                    .category
                    .as_ref()
                    .and_then(|c| category_ids.get(&c.name).copied()),
                target_date: project.target_date,
                created_at: project.created_at,
                updated_at: project.updated_at,
            })
            .collect();
        let stored = self
            .repos
            .projects
            .upsert_mirrored(org, connection.id, &upserts)
            .await?;

        let all_remote_ids: Vec<Uuid> = stamps.iter().map(|s| s.id).collect();
        report.removed = self
            .repos
            .projects
            .delete_absent(org, connection.id, &all_remote_ids)
            .await?;

        let local_by_remote: HashMap<Uuid, Uuid> = stored
            .iter()
            .filter_map(|p| p.cloud_project_id.map(|cloud| (cloud, p.id)))
            .collect();
        self.sync_tag_links(&metadata, &local_by_remote, &tag_ids, &mut report)
            .await?;

        report.refreshed = metadata.iter().map(|p| p.id).collect();
        report.jobs_enqueued = self
            .enqueue_follow_ups(&connection, &report.refreshed, &local_by_remote, force)
            .await?;

        tracing::info!(
            refreshed = report.refreshed.len(),
            removed = report.removed,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Project sync completed"
        );
        Ok(report)
    }

    async fn ensure_categories(
        &self,
        org: Uuid,
        projects: &[RemoteProject],
        report: &mut ProjectSyncReport,
    ) -> Result<HashMap<String, Uuid>> {
        let required: Vec<String> = projects
            .iter()
            .filter_map(|p| p.category.as_ref().map(|c| c.name.clone()))
            .collect();
        if required.is_empty() {
            return Ok(HashMap::new());
        }

        let mut categories = self.repos.taxonomy.categories_by_names(org, &required).await?;
        let existing: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        let missing = names_to_create(required.iter().map(String::as_str), &existing);
        for name in &missing {
            categories.push(self.repos.taxonomy.create_category(org, name).await?);
        }
        report.categories_created = missing.len();

        Ok(required
            .iter()
            .filter_map(|name| {
                first_match_by_name(&categories, name, |c| c.name.as_str())
                    .map(|c| (name.clone(), c.id))
            })
            .collect())
    }

    /// Missing tags are created with the remote color. Existing tags are
    /// reused untouched.
    async fn ensure_tags(
        &self,
        org: Uuid,
        projects: &[RemoteProject],
        report: &mut ProjectSyncReport,
    ) -> Result<HashMap<String, Uuid>> {
        let remote_tags: Vec<_> = projects.iter().flat_map(|p| p.tags.iter()).collect();
        if remote_tags.is_empty() {
            return Ok(HashMap::new());
        }
        let required: Vec<String> = remote_tags.iter().map(|t| t.name.clone()).collect();

        let mut tags = self.repos.taxonomy.tags_by_names(org, &required).await?;
        let existing: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        let missing = names_to_create(required.iter().map(String::as_str), &existing);
        for name in &missing {
            let color = remote_tags
                .iter()
                .find(|t| &t.name == name)
                .and_then(|t| t.color.as_deref());
            tags.push(self.repos.taxonomy.create_tag(org, name, color).await?);
        }
        report.tags_created = missing.len();

        Ok(required
            .iter()
            .filter_map(|name| {
                first_match_by_name(&tags, name, |t| t.name.as_str()).map(|t| (name.clone(), t.id))
            })
            .collect())
    }

    async fn sync_tag_links(
        &self,
        projects: &[RemoteProject],
        local_by_remote: &HashMap<Uuid, Uuid>,
        tag_ids: &HashMap<String, Uuid>,
        report: &mut ProjectSyncReport,
    ) -> Result<()> {
        let local_ids: Vec<Uuid> = local_by_remote.values().copied().collect();
        if local_ids.is_empty() {
            return Ok(());
        }

        let desired: Vec<(Uuid, Uuid)> = projects
            .iter()
            .filter_map(|p| local_by_remote.get(&p.id).map(|local| (*local, p)))
            .flat_map(move |(local, p)| {
                p.tags
                    .iter()
                    .filter_map(move |t| tag_ids.get(&t.name).map(|tag| (local, *tag)))
            })
            .collect();
        let current = self.repos.projects.project_tag_ids(&local_ids).await?;

        let diff = link_diff(&current, &desired);
        report.tag_links_added = self.repos.projects.link_tags(&diff.to_add).await?;
        report.tag_links_removed = self.repos.projects.unlink_tags(&diff.to_remove).await?;
        Ok(())
    }

    /// One document-sync job per refreshed project, then one media-sync job
    /// for all of them.
    async fn enqueue_follow_ups(
        &self,
        connection: &CloudConnection,
        refreshed: &[Uuid],
        local_by_remote: &HashMap<Uuid, Uuid>,
        force: bool,
    ) -> Result<usize> {
        if refreshed.is_empty() {
            return Ok(0);
        }
        let org = connection.organization_id;
        let mut enqueued = 0;

        for remote_id in refreshed {
            if let Some(project_id) = local_by_remote.get(remote_id) {
                self.repos
                    .tasks
                    .enqueue(
                        org,
                        &ProjectSyncDocumentPayload {
                            project_id: *project_id,
                            cloud_connection_id: connection.id,
                        },
                    )
                    .await?;
                enqueued += 1;
            }
        }

        self.repos
            .tasks
            .enqueue(
                org,
                &CloudSyncMediaPayload {
                    cloud_connection_id: connection.id,
                    external_project_ids: refreshed.to_vec(),
                    force_resync: force,
                },
            )
            .await?;
        Ok(enqueued + 1)
    }
}
