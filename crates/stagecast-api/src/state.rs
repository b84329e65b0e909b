//! Application state shared by handlers and the task worker.

use sqlx::PgPool;
use stagecast_core::Config;
use stagecast_db::{MediaRepository, ProjectMediaRepository};
use stagecast_processing::TranscodePipeline;
use stagecast_sync::{MediaReconciler, ProjectReconciler, RemoteConnector, SyncRepositories};
use stagecast_worker::TaskQueue;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub pool: PgPool,
    pub media: MediaRepository,
    pub project_media: ProjectMediaRepository,
    pub sync: SyncRepositories,
    pub connector: Arc<dyn RemoteConnector>,
    pub project_reconciler: ProjectReconciler,
    pub media_reconciler: MediaReconciler,
    pub transcoder: TranscodePipeline,
    pub task_queue: TaskQueue,
}
