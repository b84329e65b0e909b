use sqlx::{PgPool, Postgres};
use stagecast_core::models::{Category, Tag};
use stagecast_core::AppError;
use uuid::Uuid;

/// Categories and tags, matched by name within an organization.
///
/// Lookups return every row for the requested names, oldest first within a
/// name, so callers that keep the first match per name keep the original row.
#[derive(Clone)]
pub struct TaxonomyRepository {
    pool: PgPool,
}

impl TaxonomyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn categories_by_names(
        &self,
        organization_id: Uuid,
        names: &[String],
    ) -> Result<Vec<Category>, AppError> {
        let rows = sqlx::query_as::<Postgres, Category>(
            r#"
            SELECT id, organization_id, name
            FROM categories
            WHERE organization_id = $1 AND name = ANY($2)
            ORDER BY name, created_at, id
            "#,
        )
        .bind(organization_id)
        .bind(names)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "insert"))]
    pub async fn create_category(&self, organization_id: Uuid, name: &str) -> Result<Category, AppError> {
        let category = sqlx::query_as::<Postgres, Category>(
            r#"
            INSERT INTO categories (organization_id, name)
            VALUES ($1, $2)
            RETURNING id, organization_id, name
            "#,
        )
        .bind(organization_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    pub async fn tags_by_names(&self, organization_id: Uuid, names: &[String]) -> Result<Vec<Tag>, AppError> {
        let rows = sqlx::query_as::<Postgres, Tag>(
            r#"
            SELECT id, organization_id, name, color
            FROM tags
            WHERE organization_id = $1 AND name = ANY($2)
            ORDER BY name, created_at, id
            "#,
        )
        .bind(organization_id)
        .bind(names)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "tags", db.operation = "insert"))]
    pub async fn create_tag(
        &self,
        organization_id: Uuid,
        name: &str,
        color: Option<&str>,
    ) -> Result<Tag, AppError> {
        let tag = sqlx::query_as::<Postgres, Tag>(
            r#"
            INSERT INTO tags (organization_id, name, color)
            VALUES ($1, $2, $3)
            RETURNING id, organization_id, name, color
            "#,
        )
        .bind(organization_id)
        .bind(name)
        .bind(color)
        .fetch_one(&self.pool)
        .await?;

        Ok(tag)
    }

    pub async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>, AppError> {
        let tag = sqlx::query_as::<Postgres, Tag>(
            "SELECT id, organization_id, name, color FROM tags WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tag)
    }
}
