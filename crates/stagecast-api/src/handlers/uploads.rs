//! Resumable uploads.
//!
//! The upload id is the media name (`{mediaId}.{extension}`). Clients create
//! the upload, read the offset with HEAD after an interruption, PATCH chunks
//! at that offset and finally complete it.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use stagecast_core::models::{Media, NewMedia, Priority, UploadMediaResponse, VideoTranscodePayload};
use stagecast_core::{AppError, MediaId};
use std::sync::Arc;

use crate::auth::Identity;
use crate::error::HttpAppError;
use crate::handlers::owned_media;
use crate::state::AppState;

pub const UPLOAD_OFFSET_HEADER: &str = "upload-offset";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginUploadRequest {
    /// Caller-chosen id in typed form; a new one is minted when absent.
    pub media_id: Option<String>,
    pub file_extension: String,
    pub original_name: Option<String>,
    pub file_size: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionResponse {
    pub upload_id: String,
    pub media_id: MediaId,
    pub offset: i64,
    pub is_complete: bool,
}

impl From<&Media> for UploadSessionResponse {
    fn from(media: &Media) -> Self {
        Self {
            upload_id: media.media_name().to_string(),
            media_id: media.id,
            offset: media.file_offset,
            is_complete: media.is_complete,
        }
    }
}

fn offset_header(offset: i64) -> [(&'static str, HeaderValue); 1] {
    [(UPLOAD_OFFSET_HEADER, HeaderValue::from(offset))]
}

#[tracing::instrument(skip(state, request), fields(organization_id = %identity.organization_id))]
pub async fn begin_upload(
    identity: Identity,
    State(state): State<Arc<AppState>>,
    Json(request): Json<BeginUploadRequest>,
) -> Result<Response, HttpAppError> {
    let id = match request.media_id.as_deref() {
        Some(raw) => raw.parse::<MediaId>().map_err(AppError::from)?,
        None => MediaId::new(),
    };

    if let Some(existing) = state.media.get(id).await? {
        if existing.organization_id != identity.organization_id {
            return Err(AppError::Conflict(format!("Media id {} is already taken", id)).into());
        }
    }

    let mut new = NewMedia::user_upload(
        id,
        request.file_extension.to_ascii_lowercase(),
        identity.organization_id,
        identity.user_id,
        request.original_name,
    );
    new.file_size = request.file_size;

    let media = state.media.begin_upload(new).await?;
    let upload_id = media.media_name().to_string();
    tracing::info!(upload_id = %upload_id, offset = media.file_offset, "Upload session opened");

    let mut response = (StatusCode::CREATED, Json(UploadSessionResponse::from(&media))).into_response();
    let headers = response.headers_mut();
    headers.insert(UPLOAD_OFFSET_HEADER, HeaderValue::from(media.file_offset));
    if let Ok(location) = HeaderValue::from_str(&format!("/media/uploads/{}", upload_id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok(response)
}

pub async fn upload_status(
    identity: Identity,
    Path(upload_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    owned_media(&state, &identity, &upload_id).await?;
    let offset = state.media.upload_offset(&upload_id).await?;
    Ok((
        StatusCode::OK,
        offset_header(offset),
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
    ))
}

#[tracing::instrument(skip(state, headers, body), fields(upload_id = %upload_id, chunk_bytes = body.len()))]
pub async fn write_chunk(
    identity: Identity,
    Path(upload_id): Path<String>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let offset = headers
        .get(UPLOAD_OFFSET_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| AppError::BadRequest("Missing or invalid Upload-Offset header".to_string()))?;

    owned_media(&state, &identity, &upload_id).await?;
    let media = state.media.write_chunk(&upload_id, offset, body).await?;
    Ok((StatusCode::NO_CONTENT, offset_header(media.file_offset)))
}

/// Finish the upload. The first completion of a video enqueues its transcode.
#[tracing::instrument(skip(state), fields(upload_id = %upload_id))]
pub async fn complete_upload(
    identity: Identity,
    Path(upload_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<UploadMediaResponse>, HttpAppError> {
    let start = std::time::Instant::now();
    let before = owned_media(&state, &identity, &upload_id).await?;
    let media = state.media.complete_media(&upload_id).await?;

    if !before.is_complete {
        enqueue_transcode_if_video(&state, &media).await?;
    }

    tracing::info!(
        media_id = %media.id,
        size_bytes = media.file_size.unwrap_or_default(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Upload completed"
    );
    Ok(Json(UploadMediaResponse::from(&media)))
}

pub(crate) async fn enqueue_transcode_if_video(state: &AppState, media: &Media) -> Result<(), HttpAppError> {
    if !media.is_video() {
        return Ok(());
    }
    let task_id = state
        .task_queue
        .submit(
            media.organization_id,
            &VideoTranscodePayload { media_id: media.id },
            Priority::Normal,
        )
        .await?;
    tracing::info!(media_id = %media.id, task_id = %task_id, "Transcode enqueued");
    Ok(())
}
