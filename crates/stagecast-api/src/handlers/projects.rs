use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use stagecast_core::models::{Media, ProjectMedia};
use stagecast_core::{AppError, MediaId};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::HttpAppError;
use crate::handlers::owned_media;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMediaRequest {
    pub project_ids: Vec<Uuid>,
}

/// Media linked to the projects plus everything derived from them.
#[tracing::instrument(skip(state, request), fields(organization_id = %identity.organization_id, projects = request.project_ids.len()))]
pub async fn all_media_of_projects(
    identity: Identity,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProjectMediaRequest>,
) -> Result<Json<Vec<Media>>, HttpAppError> {
    let media = state
        .project_media
        .all_media_of_projects(&state.media, &request.project_ids)
        .await?;
    Ok(Json(
        media
            .into_iter()
            .filter(|m| m.organization_id == identity.organization_id)
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachMediaRequest {
    pub media_id: String,
    pub plugin_id: Option<Uuid>,
}

pub async fn attach_media(
    identity: Identity,
    Path(project_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<AttachMediaRequest>,
) -> Result<(StatusCode, Json<ProjectMedia>), HttpAppError> {
    let media = owned_media(&state, &identity, &request.media_id).await?;
    let project = state
        .sync
        .projects
        .get(project_id)
        .await?
        .filter(|p| p.organization_id == identity.organization_id)
        .ok_or_else(|| AppError::NotFound(format!("Project not found: {}", project_id)))?;

    let link = state
        .project_media
        .attach(project.id, media.id, request.plugin_id)
        .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlinkPluginQuery {
    pub media_id: Option<String>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct UnlinkPluginResponse {
    pub removed: u64,
}

/// Drop the plugin's project links. The media themselves stay.
#[tracing::instrument(skip(state, query), fields(organization_id = %identity.organization_id))]
pub async fn unlink_plugin(
    identity: Identity,
    Path(plugin_id): Path<Uuid>,
    Query(query): Query<UnlinkPluginQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<UnlinkPluginResponse>, HttpAppError> {
    let media_id = match query.media_id.as_deref() {
        Some(raw) => Some(MediaId::resolve(raw).map_err(AppError::from)?),
        None => None,
    };
    let removed = state
        .project_media
        .unlink_plugin(plugin_id, media_id, query.project_id)
        .await?;
    Ok(Json(UnlinkPluginResponse { removed }))
}
