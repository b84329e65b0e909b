use sqlx::{PgPool, Postgres};
use stagecast_core::models::CloudConnection;
use stagecast_core::AppError;
use uuid::Uuid;

const CONNECTION_COLUMNS: &str = r#"
    id, organization_id, creator_user_id, host, api_token,
    target_organization_slug, organization_list, created_at, updated_at
"#;

#[derive(Clone)]
pub struct CloudConnectionRepository {
    pool: PgPool,
}

impl CloudConnectionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fails with `NotFound` when the connection does not exist.
    #[tracing::instrument(skip(self), fields(db.table = "cloud_connections", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<CloudConnection, AppError> {
        sqlx::query_as::<Postgres, CloudConnection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM cloud_connections WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cloud connection not found: {}", id)))
    }

    #[tracing::instrument(skip(self, api_token), fields(db.table = "cloud_connections", db.operation = "insert"))]
    pub async fn create(
        &self,
        organization_id: Uuid,
        creator_user_id: Option<Uuid>,
        host: &str,
        api_token: &str,
        target_organization_slug: Option<&str>,
    ) -> Result<CloudConnection, AppError> {
        let connection = sqlx::query_as::<Postgres, CloudConnection>(&format!(
            r#"
            INSERT INTO cloud_connections (
                organization_id, creator_user_id, host, api_token, target_organization_slug
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CONNECTION_COLUMNS}
            "#
        ))
        .bind(organization_id)
        .bind(creator_user_id)
        .bind(host)
        .bind(api_token)
        .bind(target_organization_slug)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(connection_id = %connection.id, host = %host, "Cloud connection created");
        Ok(connection)
    }

    /// Cache the organization slugs visible to the connection's credential.
    pub async fn set_organization_list(&self, id: Uuid, slugs: &[String]) -> Result<CloudConnection, AppError> {
        sqlx::query_as::<Postgres, CloudConnection>(&format!(
            r#"
            UPDATE cloud_connections
            SET organization_list = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {CONNECTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(slugs)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cloud connection not found: {}", id)))
    }
}
