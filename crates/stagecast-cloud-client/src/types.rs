//! Shapes returned by a remote instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stagecast_core::models::{
    CloudProjectMedia, MediaDependency, MediaImageSize, MediaVideoMetadata, NewMedia,
};
use stagecast_core::{MediaId, MediaName};
use uuid::Uuid;

/// Remote project id with its last modification time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProjectStamp {
    pub id: Uuid,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCategory {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTag {
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProject {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub target_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub category: Option<RemoteCategory>,
    #[serde(default)]
    pub tags: Vec<RemoteTag>,
}

/// A media row as exposed by the remote instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMedia {
    pub id: MediaId,
    pub media_name: MediaName,
    pub file_extension: String,
    pub file_size: Option<i64>,
    pub original_name: Option<String>,
    #[serde(default)]
    pub is_user_uploaded: bool,
    pub created_at: DateTime<Utc>,
}

impl RemoteMedia {
    /// Local row for this media, attributed to the given organization and
    /// user. Remote creation time and provenance are kept.
    pub fn to_new_media(&self, organization_id: Uuid, creator_user_id: Option<Uuid>) -> NewMedia {
        NewMedia {
            id: self.id,
            extension: self.file_extension.clone(),
            organization_id,
            creator_user_id,
            original_name: self.original_name.clone(),
            is_user_uploaded: self.is_user_uploaded,
            created_at: Some(self.created_at),
            file_size: self.file_size,
        }
    }
}

/// Project-media link as the remote instance names it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProjectMedia {
    pub project_id: Uuid,
    pub media_id: MediaId,
    pub plugin_id: Option<Uuid>,
}

impl From<RemoteProjectMedia> for CloudProjectMedia {
    fn from(link: RemoteProjectMedia) -> Self {
        CloudProjectMedia {
            cloud_project_id: link.project_id,
            media_id: link.media_id,
            plugin_id: link.plugin_id,
        }
    }
}

/// Graph and metadata rows attached to a set of remote media.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteMediaInfo {
    pub dependencies: Vec<MediaDependency>,
    pub image_sizes: Vec<MediaImageSize>,
    pub video_metadata: Vec<MediaVideoMetadata>,
    pub project_medias: Vec<CloudProjectMedia>,
}
