//! Mirror the media of synced projects: bytes, derived graph, metadata and
//! project links, then drop local uploads the remote no longer references.

use anyhow::{Context, Result};
use serde::Serialize;
use stagecast_cloud_client::RemoteInstance;
use stagecast_core::models::{CloudConnection, CloudProjectMedia, CloudSyncMediaPayload};
use stagecast_core::MediaId;
use stagecast_db::MediaSource;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::context::{RemoteConnector, SyncRepositories};
use crate::diff::{link_diff, media_to_mirror, select_orphans, unreferenced};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSyncReport {
    pub downloaded: Vec<MediaId>,
    pub dependencies_inserted: u64,
    pub image_sizes_inserted: u64,
    pub video_metadata_inserted: u64,
    pub links_added: u64,
    pub links_removed: u64,
    pub orphans_deleted: Vec<MediaId>,
}

#[derive(Clone)]
pub struct MediaReconciler {
    repos: SyncRepositories,
    connector: Arc<dyn RemoteConnector>,
}

impl MediaReconciler {
    pub fn new(repos: SyncRepositories, connector: Arc<dyn RemoteConnector>) -> Self {
        Self { repos, connector }
    }

    #[tracing::instrument(skip(self, payload), fields(cloud_connection_id = %payload.cloud_connection_id, projects = payload.external_project_ids.len()))]
    pub async fn sync(&self, payload: &CloudSyncMediaPayload) -> Result<MediaSyncReport> {
        let start = Instant::now();
        let connection = self.repos.connections.get(payload.cloud_connection_id).await?;
        let remote = self.connector.connect(&connection)?;
        let org = connection.organization_id;
        let project_ids = &payload.external_project_ids;
        let mut report = MediaSyncReport::default();

        let remote_media = remote
            .media_of_projects(project_ids)
            .await
            .context("Failed to fetch remote project media")?;
        let remote_ids: Vec<MediaId> = remote_media.iter().map(|m| m.id).collect();
        let remote_set: HashSet<MediaId> = remote_ids.iter().copied().collect();

        // Snapshot before any link changes: the orphan scope.
        let local_projects = self.repos.projects.by_cloud_ids(org, project_ids).await?;
        let local_project_ids: Vec<_> = local_projects.iter().map(|p| p.id).collect();
        let local_before: Vec<MediaId> = self
            .repos
            .project_media
            .all_media_of_projects(&self.repos.media, &local_project_ids)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();

        let present = self.repos.media.existing_ids(&remote_ids).await?;
        let to_mirror = media_to_mirror(&remote_media, &present);
        if !to_mirror.is_empty() {
            let scratch = tempfile::tempdir().context("Failed to create download directory")?;
            for media in to_mirror {
                self.mirror_one(remote.as_ref(), &connection, media, scratch.path())
                    .await?;
                report.downloaded.push(media.id);
            }
        }

        let info = remote
            .media_info(project_ids, &remote_ids)
            .await
            .context("Failed to fetch remote media info")?;
        report.dependencies_inserted = self.repos.dependencies.insert_many(&info.dependencies).await?;
        report.image_sizes_inserted = self.repos.metadata.insert_image_sizes(&info.image_sizes).await?;
        report.video_metadata_inserted = self
            .repos
            .metadata
            .insert_video_metadata_many(&info.video_metadata)
            .await?;

        let synced: HashSet<_> = project_ids.iter().collect();
        let desired: Vec<CloudProjectMedia> = info
            .project_medias
            .into_iter()
            .filter(|link| synced.contains(&link.cloud_project_id))
            .collect();
        let current = self.repos.project_media.cloud_links(org, project_ids).await?;
        let diff = link_diff(&current, &desired);
        report.links_added = self
            .repos
            .project_media
            .insert_cloud_links(org, &diff.to_add)
            .await?;
        report.links_removed = self
            .repos
            .project_media
            .delete_cloud_links(org, &diff.to_remove)
            .await?;

        report.orphans_deleted = self.delete_orphans(&local_before, &remote_set).await?;

        tracing::info!(
            force_resync = payload.force_resync,
            downloaded = report.downloaded.len(),
            links_added = report.links_added,
            links_removed = report.links_removed,
            orphans_deleted = report.orphans_deleted.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Media sync completed"
        );
        Ok(report)
    }

    async fn mirror_one(
        &self,
        remote: &dyn RemoteInstance,
        connection: &CloudConnection,
        media: &stagecast_cloud_client::RemoteMedia,
        scratch: &std::path::Path,
    ) -> Result<()> {
        let path = scratch.join(media.media_name.to_string());
        let size = remote
            .download_media(&media.media_name, &path)
            .await
            .with_context(|| format!("Failed to download {}", media.media_name))?;

        let new = media.to_new_media(connection.organization_id, connection.creator_user_id);
        self.repos
            .media
            .upload_media(MediaSource::File(path.clone()), new)
            .await
            .with_context(|| format!("Failed to store {}", media.media_name))?;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::debug!(error = %e, "Failed to remove downloaded file");
        }
        tracing::debug!(media_name = %media.media_name, size_bytes = size, "Media mirrored");
        Ok(())
    }

    /// Deletion failures are logged per media and do not fail the run.
    async fn delete_orphans(
        &self,
        local_before: &[MediaId],
        remote: &HashSet<MediaId>,
    ) -> Result<Vec<MediaId>> {
        let candidates = unreferenced(local_before, remote);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.repos.media.get_many(&candidates).await?;
        let linked = self.repos.project_media.linked_media_ids(&candidates).await?;
        let mut deleted = Vec::new();
        for media in select_orphans(&rows, &linked) {
            let name = media.media_name().to_string();
            match self.repos.media.delete_media(&name).await {
                Ok(_) => deleted.push(media.id),
                Err(e) => {
                    tracing::error!(error = %e, media_id = %media.id, "Failed to delete media during sync")
                }
            }
        }
        Ok(deleted)
    }
}
