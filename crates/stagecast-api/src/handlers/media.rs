use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::Serialize;
use stagecast_core::models::{NewMedia, UploadMediaResponse};
use stagecast_core::{AppError, MediaId};
use stagecast_db::MediaSource;
use std::sync::Arc;

use crate::auth::Identity;
use crate::error::HttpAppError;
use crate::handlers::uploads::enqueue_transcode_if_video;
use crate::state::AppState;

/// Content type served for an extension.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "m3u8" => "application/vnd.apple.mpegurl",
        "ts" => "video/mp2t",
        "pdf" => "application/pdf",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Non-resumable upload of a single `file` form field.
#[tracing::instrument(skip(state, multipart), fields(organization_id = %identity.organization_id))]
pub async fn upload_media(
    identity: Identity,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let start = std::time::Instant::now();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(String::from)
            .ok_or_else(|| AppError::BadRequest("The file field needs a filename".to_string()))?;
        let extension = extension_of(&file_name).ok_or_else(|| {
            AppError::InvalidInput(format!("Missing file extension (filename: {})", file_name))
        })?;
        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(AppError::InvalidInput("File is empty".to_string()).into());
        }

        let new = NewMedia::user_upload(
            MediaId::new(),
            extension,
            identity.organization_id,
            identity.user_id,
            Some(file_name),
        );
        let media = state.media.upload_media(MediaSource::Bytes(data), new).await?;
        enqueue_transcode_if_video(&state, &media).await?;

        tracing::info!(
            media_id = %media.id,
            size_bytes = media.file_size.unwrap_or_default(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Media uploaded"
        );
        return Ok((StatusCode::CREATED, Json(UploadMediaResponse::from(&media))));
    }

    Err(AppError::BadRequest("Missing file field".to_string()).into())
}

/// Stream a completed media from the blob backend.
pub async fn serve_media(
    Path(media_name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, HttpAppError> {
    let media = state
        .media
        .get_by_name(&media_name)
        .await?
        .filter(|m| m.is_complete)
        .ok_or_else(|| AppError::media_not_found(&media_name))?;
    let object_name = media.media_name().to_string();

    let stream = state.media.storage().download_stream(&object_name).await?;
    let body = stream.map(|chunk| {
        chunk.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&media.extension))
        .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable");
    if let Some(size) = media.file_size {
        builder = builder.header(header::CONTENT_LENGTH, size);
    }
    builder
        .body(Body::from_stream(body))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)).into())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMediaResponse {
    pub deleted: Vec<MediaId>,
}

/// Delete a media and everything derived from it. Absent media is a no-op.
#[tracing::instrument(skip(state), fields(organization_id = %identity.organization_id))]
pub async fn delete_media(
    identity: Identity,
    Path(media_name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeleteMediaResponse>, HttpAppError> {
    let id = MediaId::resolve(&media_name).map_err(AppError::from)?;
    match state.media.get(id).await? {
        None => return Ok(Json(DeleteMediaResponse { deleted: Vec::new() })),
        Some(media) if media.organization_id != identity.organization_id => {
            return Err(AppError::media_not_found(&media_name).into());
        }
        Some(_) => {}
    }

    let deleted = state.media.delete_media(&media_name).await?;
    tracing::info!(media_name = %media_name, deleted = deleted.len(), "Media deleted");
    Ok(Json(DeleteMediaResponse { deleted }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for_hls_outputs() {
        assert_eq!(content_type_for("m3u8"), "application/vnd.apple.mpegurl");
        assert_eq!(content_type_for("ts"), "video/mp2t");
        assert_eq!(content_type_for("JPG"), "image/jpeg");
        assert_eq!(content_type_for("bin"), "application/octet-stream");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("clip.final.MP4").as_deref(), Some("mp4"));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of("trailing."), None);
    }
}
