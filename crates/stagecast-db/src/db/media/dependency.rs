use sqlx::{PgPool, Postgres};
use stagecast_core::models::MediaDependency;
use stagecast_core::{AppError, MediaId};
use std::collections::HashSet;
use std::future::Future;
use uuid::Uuid;

/// Walk child edges level by level starting at `roots`.
///
/// `fetch_children` receives one frontier at a time and returns the edges
/// leaving it. Every id is visited once, so cycles and diamonds terminate.
/// The result lists roots first, then descendants in discovery order.
pub async fn breadth_first<F, Fut, E>(roots: &[MediaId], mut fetch_children: F) -> Result<Vec<MediaId>, E>
where
    F: FnMut(Vec<MediaId>) -> Fut,
    Fut: Future<Output = Result<Vec<MediaDependency>, E>>,
{
    let mut visited: HashSet<MediaId> = HashSet::new();
    let mut order = Vec::new();
    let mut frontier = Vec::new();

    for root in roots {
        if visited.insert(*root) {
            order.push(*root);
            frontier.push(*root);
        }
    }

    while !frontier.is_empty() {
        let edges = fetch_children(std::mem::take(&mut frontier)).await?;
        for edge in edges {
            if visited.insert(edge.child_media_id) {
                order.push(edge.child_media_id);
                frontier.push(edge.child_media_id);
            }
        }
    }

    Ok(order)
}

/// Directed parent → child edges between media.
#[derive(Clone)]
pub struct DependencyRepository {
    pool: PgPool,
}

impl DependencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record that `child` derives from `parent`. Returns false when the edge
    /// already existed.
    #[tracing::instrument(skip(self), fields(db.table = "media_dependencies", db.operation = "insert"))]
    pub async fn create_dependency(&self, parent: MediaId, child: MediaId) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO media_dependencies (parent_media_id, child_media_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(parent)
        .bind(child)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Insert-or-ignore a batch of edges. Edges whose endpoints are not stored
    /// locally are skipped.
    #[tracing::instrument(skip(self, edges), fields(db.table = "media_dependencies", db.operation = "insert", count = edges.len()))]
    pub async fn insert_many(&self, edges: &[MediaDependency]) -> Result<u64, AppError> {
        if edges.is_empty() {
            return Ok(0);
        }
        let parents: Vec<Uuid> = edges.iter().map(|e| e.parent_media_id.as_uuid()).collect();
        let children: Vec<Uuid> = edges.iter().map(|e| e.child_media_id.as_uuid()).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO media_dependencies (parent_media_id, child_media_id)
            SELECT e.parent, e.child
            FROM UNNEST($1::uuid[], $2::uuid[]) AS e(parent, child)
            WHERE EXISTS (SELECT 1 FROM medias WHERE id = e.parent)
              AND EXISTS (SELECT 1 FROM medias WHERE id = e.child)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&parents)
        .bind(&children)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Edges leaving any of `parents`.
    pub async fn children_of(&self, parents: &[MediaId]) -> Result<Vec<MediaDependency>, AppError> {
        let ids: Vec<Uuid> = parents.iter().map(MediaId::as_uuid).collect();
        let edges = sqlx::query_as::<Postgres, MediaDependency>(
            r#"
            SELECT parent_media_id, child_media_id
            FROM media_dependencies
            WHERE parent_media_id = ANY($1)
            ORDER BY created_at, child_media_id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(edges)
    }

    /// Every transitive descendant of `id`, excluding `id` itself.
    #[tracing::instrument(skip(self), fields(db.table = "media_dependencies", db.operation = "select", media_id = %id))]
    pub async fn descendants_of(&self, id: MediaId) -> Result<Vec<MediaId>, AppError> {
        let mut closure = self.closure(&[id]).await?;
        closure.remove(0);
        Ok(closure)
    }

    /// `roots` plus all of their transitive descendants.
    pub async fn closure(&self, roots: &[MediaId]) -> Result<Vec<MediaId>, AppError> {
        breadth_first(roots, |frontier| async move { self.children_of(&frontier).await }).await
    }

    /// Edges whose both endpoints are in `ids`.
    pub async fn edges_within(&self, ids: &[MediaId]) -> Result<Vec<MediaDependency>, AppError> {
        let ids: Vec<Uuid> = ids.iter().map(MediaId::as_uuid).collect();
        let edges = sqlx::query_as::<Postgres, MediaDependency>(
            r#"
            SELECT parent_media_id, child_media_id
            FROM media_dependencies
            WHERE parent_media_id = ANY($1) AND child_media_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(edges)
    }
}
