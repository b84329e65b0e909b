//! Blob backend and upload staging

use anyhow::{Context, Result};
use stagecast_core::Config;
use stagecast_storage::{create_storage, ResumableUploads, Storage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<(Arc<dyn Storage>, ResumableUploads)> {
    let storage = create_storage(config)
        .await
        .context("Failed to initialize blob storage")?;
    let uploads = ResumableUploads::new(config.upload_staging_path())
        .await
        .context("Failed to initialize upload staging")?;

    tracing::info!(
        backend = ?storage.backend_type(),
        staging = %config.upload_staging_path().display(),
        "Storage initialized"
    );
    Ok((storage, uploads))
}
