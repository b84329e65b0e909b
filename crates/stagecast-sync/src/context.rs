use anyhow::Result;
use sqlx::PgPool;
use stagecast_cloud_client::{CloudClient, RemoteInstance};
use stagecast_core::models::CloudConnection;
use stagecast_db::{
    CloudConnectionRepository, DependencyRepository, MediaMetadataRepository, MediaRepository,
    ProjectMediaRepository, ProjectRepository, TaskRepository, TaxonomyRepository,
};
use std::sync::Arc;
use std::time::Duration;

/// Opens a [`RemoteInstance`] for a cloud connection.
pub trait RemoteConnector: Send + Sync {
    fn connect(&self, connection: &CloudConnection) -> Result<Arc<dyn RemoteInstance>>;
}

/// Connects over HTTP with the connection's host and token.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl RemoteConnector for HttpConnector {
    fn connect(&self, connection: &CloudConnection) -> Result<Arc<dyn RemoteInstance>> {
        Ok(Arc::new(CloudClient::from_connection(connection, self.timeout)?))
    }
}

/// Local repositories a sync run reads and writes.
#[derive(Clone)]
pub struct SyncRepositories {
    pub connections: CloudConnectionRepository,
    pub projects: ProjectRepository,
    pub taxonomy: TaxonomyRepository,
    pub media: MediaRepository,
    pub project_media: ProjectMediaRepository,
    pub dependencies: DependencyRepository,
    pub metadata: MediaMetadataRepository,
    pub tasks: TaskRepository,
}

impl SyncRepositories {
    pub fn new(pool: PgPool, media: MediaRepository) -> Self {
        Self {
            connections: CloudConnectionRepository::new(pool.clone()),
            projects: ProjectRepository::new(pool.clone()),
            taxonomy: TaxonomyRepository::new(pool.clone()),
            project_media: ProjectMediaRepository::new(pool.clone()),
            dependencies: DependencyRepository::new(pool.clone()),
            metadata: MediaMetadataRepository::new(pool.clone()),
            tasks: TaskRepository::new(pool),
            media,
        }
    }
}
