//! Application setup

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use anyhow::{Context, Result};
use stagecast_core::Config;
use std::sync::Arc;

use crate::state::AppState;
pub use services::WorkerMode;

/// Validate config, install tracing, connect the database and storage, then
/// build the state and router.
pub async fn initialize_app(config: Config, mode: WorkerMode) -> Result<(Arc<AppState>, axum::Router)> {
    config.validate().context("Configuration validation failed")?;
    stagecast_infra::init_telemetry(config.log_json());
    tracing::info!("Configuration loaded and validated successfully");

    let pool = database::setup_database(&config).await?;
    let (storage, uploads) = storage::setup_storage(&config).await?;
    let state = services::initialize_services(&config, pool, storage, uploads, None, mode)?;
    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
