use sqlx::{PgPool, Postgres};
use stagecast_core::models::{CloudProjectMedia, Media, ProjectMedia};
use stagecast_core::{AppError, MediaId};
use std::collections::HashSet;
use uuid::Uuid;

use super::dependency::DependencyRepository;
use super::media::MediaRepository;

/// Links between projects and the media they use.
#[derive(Clone)]
pub struct ProjectMediaRepository {
    pool: PgPool,
    dependencies: DependencyRepository,
}

impl ProjectMediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            dependencies: DependencyRepository::new(pool.clone()),
            pool,
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "project_medias", db.operation = "insert"))]
    pub async fn attach(
        &self,
        project_id: Uuid,
        media_id: MediaId,
        plugin_id: Option<Uuid>,
    ) -> Result<ProjectMedia, AppError> {
        sqlx::query(
            r#"
            INSERT INTO project_medias (project_id, media_id, plugin_id)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(media_id)
        .bind(plugin_id)
        .execute(&self.pool)
        .await?;

        Ok(ProjectMedia {
            project_id,
            media_id,
            plugin_id,
        })
    }

    /// Remove the plugin's links, optionally narrowed to one media and/or one
    /// project. The media rows are left alone.
    #[tracing::instrument(skip(self), fields(db.table = "project_medias", db.operation = "delete"))]
    pub async fn unlink_plugin(
        &self,
        plugin_id: Uuid,
        media_id: Option<MediaId>,
        project_id: Option<Uuid>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM project_medias
            WHERE plugin_id = $1
              AND ($2::uuid IS NULL OR media_id = $2)
              AND ($3::uuid IS NULL OR project_id = $3)
            "#,
        )
        .bind(plugin_id)
        .bind(media_id.map(|id| id.as_uuid()))
        .bind(project_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(plugin_id = %plugin_id, removed = result.rows_affected(), "Plugin media unlinked");
        Ok(result.rows_affected())
    }

    /// Media directly linked to any of `project_ids`.
    pub async fn media_ids_of_projects(&self, project_ids: &[Uuid]) -> Result<Vec<MediaId>, AppError> {
        let rows: Vec<(MediaId,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT media_id
            FROM project_medias
            WHERE project_id = ANY($1)
            ORDER BY media_id
            "#,
        )
        .bind(project_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// The projects' media plus every derived descendant, with their rows.
    #[tracing::instrument(skip(self, media), fields(db.table = "project_medias", db.operation = "select"))]
    pub async fn all_media_of_projects(
        &self,
        media: &MediaRepository,
        project_ids: &[Uuid],
    ) -> Result<Vec<Media>, AppError> {
        let direct = self.media_ids_of_projects(project_ids).await?;
        let closure = self.dependencies.closure(&direct).await?;
        media.get_many(&closure).await
    }

    /// Links of the mirrored projects, addressed by remote project id.
    pub async fn cloud_links(
        &self,
        organization_id: Uuid,
        cloud_project_ids: &[Uuid],
    ) -> Result<Vec<CloudProjectMedia>, AppError> {
        let rows = sqlx::query_as::<Postgres, CloudProjectMedia>(
            r#"
            SELECT p.cloud_project_id, pm.media_id, pm.plugin_id
            FROM project_medias pm
            JOIN projects p ON p.id = pm.project_id
            WHERE p.organization_id = $1
              AND p.cloud_project_id = ANY($2)
            "#,
        )
        .bind(organization_id)
        .bind(cloud_project_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Insert-or-ignore links addressed by remote project id. Links whose
    /// project or media is not stored locally are skipped.
    #[tracing::instrument(skip(self, links), fields(db.table = "project_medias", db.operation = "insert", count = links.len()))]
    pub async fn insert_cloud_links(
        &self,
        organization_id: Uuid,
        links: &[CloudProjectMedia],
    ) -> Result<u64, AppError> {
        if links.is_empty() {
            return Ok(0);
        }
        let (projects, medias, plugins) = split_links(links);

        let result = sqlx::query(
            r#"
            INSERT INTO project_medias (project_id, media_id, plugin_id)
            SELECT p.id, l.media_id, l.plugin_id
            FROM UNNEST($2::uuid[], $3::uuid[], $4::uuid[]) AS l(cloud_project_id, media_id, plugin_id)
            JOIN projects p ON p.organization_id = $1 AND p.cloud_project_id = l.cloud_project_id
            JOIN medias m ON m.id = l.media_id
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(organization_id)
        .bind(&projects)
        .bind(&medias)
        .bind(&plugins)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, links), fields(db.table = "project_medias", db.operation = "delete", count = links.len()))]
    pub async fn delete_cloud_links(
        &self,
        organization_id: Uuid,
        links: &[CloudProjectMedia],
    ) -> Result<u64, AppError> {
        if links.is_empty() {
            return Ok(0);
        }
        let (projects, medias, plugins) = split_links(links);

        let result = sqlx::query(
            r#"
            DELETE FROM project_medias pm
            USING projects p,
                  UNNEST($2::uuid[], $3::uuid[], $4::uuid[]) AS l(cloud_project_id, media_id, plugin_id)
            WHERE p.id = pm.project_id
              AND p.organization_id = $1
              AND p.cloud_project_id = l.cloud_project_id
              AND pm.media_id = l.media_id
              AND pm.plugin_id IS NOT DISTINCT FROM l.plugin_id
            "#,
        )
        .bind(organization_id)
        .bind(&projects)
        .bind(&medias)
        .bind(&plugins)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// The subset of `media_ids` linked to at least one project.
    pub async fn linked_media_ids(&self, media_ids: &[MediaId]) -> Result<HashSet<MediaId>, AppError> {
        let ids: Vec<Uuid> = media_ids.iter().map(MediaId::as_uuid).collect();
        let rows: Vec<(MediaId,)> =
            sqlx::query_as("SELECT DISTINCT media_id FROM project_medias WHERE media_id = ANY($1)")
                .bind(&ids)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

fn split_links(links: &[CloudProjectMedia]) -> (Vec<Uuid>, Vec<Uuid>, Vec<Option<Uuid>>) {
    let mut projects = Vec::with_capacity(links.len());
    let mut medias = Vec::with_capacity(links.len());
    let mut plugins = Vec::with_capacity(links.len());
    for link in links {
        projects.push(link.cloud_project_id);
        medias.push(link.media_id.as_uuid());
        plugins.push(link.plugin_id);
    }
    (projects, medias, plugins)
}
