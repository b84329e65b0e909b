use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use stagecast_core::models::{Project, ProjectUpsert};
use stagecast_core::AppError;
use std::collections::HashMap;
use uuid::Uuid;

const PROJECT_COLUMNS: &str = r#"
    id, organization_id, slug, name, category_id, target_date,
    cloud_connection_id, cloud_project_id, cloud_last_updated, created_at, updated_at
"#;

/// Local projects, including the ones mirrored from a remote instance.
#[derive(Clone)]
pub struct ProjectRepository {
    pool: PgPool,
}

impl ProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A project created locally, without a cloud origin.
    #[tracing::instrument(skip(self), fields(db.table = "projects", db.operation = "insert"))]
    pub async fn create_local(&self, organization_id: Uuid, slug: &str, name: &str) -> Result<Project, AppError> {
        let project = sqlx::query_as::<Postgres, Project>(&format!(
            r#"
            INSERT INTO projects (organization_id, slug, name)
            VALUES ($1, $2, $3)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(organization_id)
        .bind(slug)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(project)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Project>, AppError> {
        let project = sqlx::query_as::<Postgres, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(project)
    }

    /// Remote id → cached remote `updatedAt` for the organization's mirrored projects.
    #[tracing::instrument(skip(self), fields(db.table = "projects", db.operation = "select"))]
    pub async fn cloud_stamps(&self, organization_id: Uuid) -> Result<HashMap<Uuid, Option<DateTime<Utc>>>, AppError> {
        let rows: Vec<(Uuid, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            SELECT cloud_project_id, cloud_last_updated
            FROM projects
            WHERE organization_id = $1 AND cloud_project_id IS NOT NULL
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    pub async fn by_cloud_ids(&self, organization_id: Uuid, cloud_project_ids: &[Uuid]) -> Result<Vec<Project>, AppError> {
        let rows = sqlx::query_as::<Postgres, Project>(&format!(
            r#"
            SELECT {PROJECT_COLUMNS}
            FROM projects
            WHERE organization_id = $1 AND cloud_project_id = ANY($2)
            ORDER BY cloud_project_id
            "#
        ))
        .bind(organization_id)
        .bind(cloud_project_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Insert or update mirrored projects keyed by `(organization, cloud project)`.
    ///
    /// Remote `createdAt`/`updatedAt` are stored as given: the transaction
    /// disables the `updated_at` touch trigger.
    #[tracing::instrument(skip(self, projects), fields(db.table = "projects", db.operation = "upsert", count = projects.len()))]
    pub async fn upsert_mirrored(
        &self,
        organization_id: Uuid,
        connection_id: Uuid,
        projects: &[ProjectUpsert],
    ) -> Result<Vec<Project>, AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT set_config('stagecast.preserve_timestamps', 'on', true)")
            .execute(&mut *tx)
            .await?;

        let mut stored = Vec::with_capacity(projects.len());
        for project in projects {
            let row = sqlx::query_as::<Postgres, Project>(&format!(
                r#"
                INSERT INTO projects (
                    organization_id, slug, name, category_id, target_date,
                    cloud_connection_id, cloud_project_id, cloud_last_updated,
                    created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $8)
                ON CONFLICT (organization_id, cloud_project_id) DO UPDATE
                SET slug = EXCLUDED.slug,
                    name = EXCLUDED.name,
                    category_id = EXCLUDED.category_id,
                    target_date = EXCLUDED.target_date,
                    cloud_connection_id = EXCLUDED.cloud_connection_id,
                    cloud_last_updated = EXCLUDED.cloud_last_updated,
                    created_at = EXCLUDED.created_at,
                    updated_at = EXCLUDED.updated_at
                RETURNING {PROJECT_COLUMNS}
                "#
            ))
            .bind(organization_id)
            .bind(&project.slug)
            .bind(&project.name)
            .bind(project.category_id)
            .bind(project.target_date)
            .bind(connection_id)
            .bind(project.cloud_project_id)
            .bind(project.updated_at)
            .bind(project.created_at)
            .fetch_one(&mut *tx)
            .await?;
            stored.push(row);
        }

        tx.commit().await?;
        Ok(stored)
    }

    /// Delete the connection's mirrored projects whose remote id is not in `keep`.
    #[tracing::instrument(skip(self, keep), fields(db.table = "projects", db.operation = "delete"))]
    pub async fn delete_absent(&self, organization_id: Uuid, connection_id: Uuid, keep: &[Uuid]) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM projects
            WHERE organization_id = $1
              AND cloud_connection_id = $2
              AND cloud_project_id IS NOT NULL
              AND NOT (cloud_project_id = ANY($3))
            "#,
        )
        .bind(organization_id)
        .bind(connection_id)
        .bind(keep)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(removed = result.rows_affected(), "Removed projects deleted remotely");
        }
        Ok(result.rows_affected())
    }

    /// `(project_id, tag_id)` pairs of the given projects.
    pub async fn project_tag_ids(&self, project_ids: &[Uuid]) -> Result<Vec<(Uuid, Uuid)>, AppError> {
        let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT project_id, tag_id FROM project_tags WHERE project_id = ANY($1) ORDER BY project_id, tag_id",
        )
        .bind(project_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn link_tags(&self, pairs: &[(Uuid, Uuid)]) -> Result<u64, AppError> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let (projects, tags): (Vec<Uuid>, Vec<Uuid>) = pairs.iter().copied().unzip();
        let result = sqlx::query(
            r#"
            INSERT INTO project_tags (project_id, tag_id)
            SELECT * FROM UNNEST($1::uuid[], $2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&projects)
        .bind(&tags)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn unlink_tags(&self, pairs: &[(Uuid, Uuid)]) -> Result<u64, AppError> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let (projects, tags): (Vec<Uuid>, Vec<Uuid>) = pairs.iter().copied().unzip();
        let result = sqlx::query(
            r#"
            DELETE FROM project_tags pt
            USING UNNEST($1::uuid[], $2::uuid[]) AS l(project_id, tag_id)
            WHERE pt.project_id = l.project_id AND pt.tag_id = l.tag_id
            "#,
        )
        .bind(&projects)
        .bind(&tags)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
