//! Routes claimed tasks to their handlers.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use stagecast_core::models::{
    CloudSyncMediaPayload, CloudSyncPayload, Task, TaskPayload, TaskType, VideoTranscodePayload,
};
use stagecast_core::{AppError, TaskError};
use stagecast_processing::TranscodeOutcome;
use stagecast_worker::TaskHandlerContext;
use std::sync::Arc;

use crate::state::AppState;

/// A payload that does not parse will not parse on retry either.
fn payload<P: TaskPayload>(task: &Task) -> Result<P> {
    task.try_payload_as::<P>().map_err(|e| {
        TaskError::unrecoverable(anyhow!("Invalid {} payload: {}", task.task_type, e)).into()
    })
}

/// A missing row stays missing; everything else is retried.
fn classify(err: anyhow::Error) -> anyhow::Error {
    if err.downcast_ref::<TaskError>().is_some() {
        return err;
    }
    match err.downcast_ref::<AppError>() {
        Some(AppError::NotFound(_)) | Some(AppError::InvalidInput(_)) => {
            TaskError::unrecoverable(err).into()
        }
        _ => err,
    }
}

#[async_trait]
impl TaskHandlerContext for AppState {
    #[tracing::instrument(skip(self, task), fields(task_id = %task.id, task_type = %task.task_type))]
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> Result<serde_json::Value> {
        match task.task_type {
            TaskType::VideoTranscode => {
                let VideoTranscodePayload { media_id } = payload(task)?;
                let outcome = self.transcoder.run(media_id).await.map_err(classify)?;
                Ok(match outcome {
                    TranscodeOutcome::Completed(metadata) => json!({
                        "status": "completed",
                        "hlsMediaId": metadata.hls_media_id,
                        "thumbnailMediaId": metadata.thumbnail_media_id,
                        "duration": metadata.duration,
                    }),
                    TranscodeOutcome::AlreadyTranscoded => json!({ "status": "already_transcoded" }),
                })
            }
            TaskType::CloudConnectionSync => {
                let CloudSyncPayload {
                    cloud_connection_id,
                    force_resync,
                } = payload(task)?;
                let report = self
                    .project_reconciler
                    .sync(cloud_connection_id, force_resync)
                    .await
                    .map_err(classify)?;
                Ok(serde_json::to_value(report)?)
            }
            TaskType::CloudConnectionSyncMedia => {
                let sync: CloudSyncMediaPayload = payload(task)?;
                let report = self.media_reconciler.sync(&sync).await.map_err(classify)?;
                Ok(serde_json::to_value(report)?)
            }
            TaskType::ProjectSyncDocument => Err(TaskError::unrecoverable(anyhow!(
                "{} is handled by the document service",
                task.task_type
            ))
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_unrecoverable() {
        let err = classify(anyhow::Error::new(AppError::NotFound("Cloud connection not found".into())));
        let task_error = err.downcast_ref::<TaskError>().unwrap();
        assert!(!task_error.is_recoverable());
    }

    #[test]
    fn test_remote_failure_is_retried() {
        let err = classify(anyhow!("connection reset"));
        assert!(err.downcast_ref::<TaskError>().is_none());
    }

    #[test]
    fn test_existing_task_error_is_kept() {
        let err = classify(TaskError::recoverable(anyhow!("busy")).into());
        assert!(err.downcast_ref::<TaskError>().unwrap().is_recoverable());
    }
}
