//! Repositories, pipelines, reconcilers and the task queue

use anyhow::{Context, Result};
use sqlx::PgPool;
use stagecast_core::Config;
use stagecast_db::{
    DependencyRepository, MediaMetadataRepository, MediaRepository, ProjectMediaRepository,
    TaskRepository,
};
use stagecast_infra::RetryPolicy;
use stagecast_processing::{
    FfmpegToolchain, RepositoryTranscodeStore, TranscodePipeline, TranscodeSettings,
};
use stagecast_storage::{ResumableUploads, Storage};
use stagecast_sync::{
    HttpConnector, MediaReconciler, ProjectReconciler, RemoteConnector, SyncRepositories,
};
use stagecast_worker::{TaskHandlerContext, TaskQueue, TaskQueueConfig};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::state::AppState;

/// Whether this process runs the task worker or only enqueues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    Run,
    SubmitOnly,
}

pub fn task_queue_config(config: &Config) -> TaskQueueConfig {
    TaskQueueConfig {
        max_workers: config.task_queue_max_workers(),
        poll_interval_ms: config.task_queue_poll_interval_ms(),
        default_timeout_seconds: config.task_queue_default_timeout_seconds(),
        max_retries: config.task_queue_max_retries(),
        ..Default::default()
    }
}

pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
    uploads: ResumableUploads,
    connector: Option<Arc<dyn RemoteConnector>>,
    mode: WorkerMode,
) -> Result<Arc<AppState>> {
    let media = MediaRepository::new(pool.clone(), storage, uploads)
        .with_upload_policy(RetryPolicy::default().with_max_attempts(config.upload_max_attempts()));
    let dependencies = DependencyRepository::new(pool.clone());
    let project_media = ProjectMediaRepository::new(pool.clone());
    let sync = SyncRepositories::new(pool.clone(), media.clone());

    let connector = connector.unwrap_or_else(|| {
        Arc::new(HttpConnector::new(Duration::from_secs(
            config.cloud_request_timeout_secs(),
        )))
    });

    let toolchain = FfmpegToolchain::new(
        config.ffmpeg_path().to_string(),
        config.ffprobe_path().to_string(),
        config.hls_segment_duration(),
    )
    .context("Failed to configure ffmpeg toolchain")?;
    let transcode_store = RepositoryTranscodeStore::new(
        media.clone(),
        dependencies,
        MediaMetadataRepository::new(pool.clone()),
    );
    let transcoder = TranscodePipeline::new(
        Arc::new(toolchain),
        Arc::new(transcode_store),
        TranscodeSettings {
            scratch_base: config.transcode_scratch_dir().to_path_buf(),
            thumbnail_width: config.thumbnail_width(),
        },
    );

    let project_reconciler = ProjectReconciler::new(sync.clone(), connector.clone());
    let media_reconciler = MediaReconciler::new(sync.clone(), connector.clone());
    let tasks = TaskRepository::new(pool.clone());
    let queue_config = task_queue_config(config);

    // The worker holds a weak handle so the state can be dropped.
    let state = Arc::new_cyclic(|weak: &Weak<AppState>| {
        let task_queue = match mode {
            WorkerMode::Run => {
                let context: Weak<dyn TaskHandlerContext> = weak.clone();
                TaskQueue::new(tasks, queue_config, context, Some(pool.clone()))
            }
            WorkerMode::SubmitOnly => TaskQueue::new_no_worker(tasks, queue_config),
        };

        AppState {
            config: config.clone(),
            pool,
            media,
            project_media,
            sync,
            connector,
            project_reconciler,
            media_reconciler,
            transcoder,
            task_queue,
        }
    });

    tracing::info!(
        worker = ?mode,
        max_workers = config.task_queue_max_workers(),
        "Services initialized"
    );
    Ok(state)
}
