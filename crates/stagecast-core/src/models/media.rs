use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{is_image_extension, is_video_extension, media_data_url};
use crate::ids::{MediaId, MediaName};

/// A stored byte object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: MediaId,
    pub extension: String,
    /// Unknown until the upload completes.
    pub file_size: Option<i64>,
    /// Bytes received so far by a resumable upload.
    pub file_offset: i64,
    pub original_name: Option<String>,
    pub organization_id: Uuid,
    pub creator_user_id: Option<Uuid>,
    pub is_complete: bool,
    pub is_user_uploaded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Media {
    pub fn media_name(&self) -> MediaName {
        self.id.with_extension(self.extension.clone())
    }

    pub fn url(&self) -> String {
        media_data_url(&self.media_name().to_string())
    }

    pub fn is_video(&self) -> bool {
        is_video_extension(&self.extension)
    }

    pub fn is_image(&self) -> bool {
        is_image_extension(&self.extension)
    }
}

/// Attributes of a media created by `upload_media` or `begin_upload`.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub id: MediaId,
    pub extension: String,
    pub organization_id: Uuid,
    pub creator_user_id: Option<Uuid>,
    pub original_name: Option<String>,
    pub is_user_uploaded: bool,
    /// Preserved from a remote instance when mirroring; defaults to now.
    pub created_at: Option<DateTime<Utc>>,
    /// Declared total size, if the client sent one.
    pub file_size: Option<i64>,
}

impl NewMedia {
    pub fn user_upload(
        id: MediaId,
        extension: impl Into<String>,
        organization_id: Uuid,
        creator_user_id: Option<Uuid>,
        original_name: Option<String>,
    ) -> Self {
        Self {
            id,
            extension: extension.into(),
            organization_id,
            creator_user_id,
            original_name,
            is_user_uploaded: true,
            created_at: None,
            file_size: None,
        }
    }

    /// Machine-generated artifact: no original name, not user uploaded.
    pub fn derived(id: MediaId, extension: impl Into<String>, source: &Media) -> Self {
        Self {
            id,
            extension: extension.into(),
            organization_id: source.organization_id,
            creator_user_id: source.creator_user_id,
            original_name: None,
            is_user_uploaded: false,
            created_at: None,
            file_size: None,
        }
    }

    pub fn media_name(&self) -> MediaName {
        self.id.with_extension(self.extension.clone())
    }
}

/// Directed edge: `child` was derived from `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct MediaDependency {
    pub parent_media_id: MediaId,
    pub child_media_id: MediaId,
}

/// Written last by the transcoder; its presence means "already transcoded".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct MediaVideoMetadata {
    pub video_media_id: MediaId,
    pub hls_media_id: MediaId,
    pub thumbnail_media_id: MediaId,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct MediaImageSize {
    pub image_media_id: MediaId,
    pub processed_media_id: MediaId,
    pub width: i32,
    pub file_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct MediaImageMetadata {
    pub image_media_id: MediaId,
    pub width: i32,
    pub height: i32,
}

/// Response of the multipart simple upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMediaResponse {
    pub media_id: MediaId,
    pub file_extension: String,
    pub file_name: String,
    pub original_file_name: Option<String>,
    pub url: String,
}

impl From<&Media> for UploadMediaResponse {
    fn from(media: &Media) -> Self {
        Self {
            media_id: media.id,
            file_extension: media.extension.clone(),
            file_name: media.media_name().to_string(),
            original_file_name: media.original_name.clone(),
            url: media.url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(extension: &str) -> Media {
        Media {
            id: MediaId::new(),
            extension: extension.to_string(),
            file_size: Some(10),
            file_offset: 10,
            original_name: Some("clip.mp4".into()),
            organization_id: Uuid::new_v4(),
            creator_user_id: None,
            is_complete: true,
            is_user_uploaded: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_upload_response_shape() {
        let media = media("mp4");
        let response = UploadMediaResponse::from(&media);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["fileExtension"], "mp4");
        assert_eq!(json["fileName"], format!("{}.mp4", media.id));
        assert_eq!(json["url"], format!("/media/data/{}.mp4", media.id));
        assert_eq!(json["originalFileName"], "clip.mp4");
    }

    #[test]
    fn test_derived_media_inherits_owner() {
        let source = media("mp4");
        let derived = NewMedia::derived(MediaId::new(), "ts", &source);
        assert!(!derived.is_user_uploaded);
        assert!(derived.original_name.is_none());
        assert_eq!(derived.organization_id, source.organization_id);
    }
}
