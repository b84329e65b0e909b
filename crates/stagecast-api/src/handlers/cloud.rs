use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use stagecast_core::models::{CloudConnection, CloudSyncPayload, Priority};
use stagecast_core::AppError;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::HttpAppError;
use crate::state::AppState;

async fn owned_connection(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
) -> Result<CloudConnection, HttpAppError> {
    let connection = state.sync.connections.get(id).await?;
    if connection.organization_id != identity.organization_id {
        return Err(AppError::NotFound(format!("Cloud connection not found: {}", id)).into());
    }
    Ok(connection)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationListResponse {
    pub organizations: Vec<String>,
}

/// Refresh and return the organization slugs the connection can reach.
#[tracing::instrument(skip(state), fields(organization_id = %identity.organization_id))]
pub async fn organization_list(
    identity: Identity,
    Path(connection_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<OrganizationListResponse>, HttpAppError> {
    owned_connection(&state, &identity, connection_id).await?;
    let organizations =
        stagecast_sync::refresh_organization_list(&state.sync, &state.connector, connection_id)
            .await
            .map_err(|e| match e.downcast::<AppError>() {
                Ok(app) => app,
                Err(e) => AppError::Remote(format!("{:#}", e)),
            })?;
    Ok(Json(OrganizationListResponse { organizations }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub force_resync: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEnqueuedResponse {
    pub task_id: Uuid,
}

/// Queue a project sync. The media sync follows on its own.
#[tracing::instrument(skip(state, body), fields(organization_id = %identity.organization_id))]
pub async fn start_sync(
    identity: Identity,
    Path(connection_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<SyncEnqueuedResponse>), HttpAppError> {
    // The body is optional.
    let request: SyncRequest = if body.is_empty() {
        SyncRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid sync request: {}", e)))?
    };
    let force_resync = request.force_resync;
    let connection = owned_connection(&state, &identity, connection_id).await?;

    let task_id = state
        .task_queue
        .submit(
            connection.organization_id,
            &CloudSyncPayload {
                cloud_connection_id: connection.id,
                force_resync,
            },
            Priority::Normal,
        )
        .await?;
    tracing::info!(cloud_connection_id = %connection.id, task_id = %task_id, force_resync, "Cloud sync enqueued");
    Ok((StatusCode::ACCEPTED, Json(SyncEnqueuedResponse { task_id })))
}
