use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::MediaId;

/// Local project. Mirrored projects carry the cloud connection they came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub slug: String,
    pub name: String,
    pub category_id: Option<Uuid>,
    pub target_date: Option<DateTime<Utc>>,
    pub cloud_connection_id: Option<Uuid>,
    pub cloud_project_id: Option<Uuid>,
    pub cloud_last_updated: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values written when mirroring a remote project. Timestamps are the remote
/// ones and are stored verbatim.
#[derive(Debug, Clone)]
pub struct ProjectUpsert {
    pub cloud_project_id: Uuid,
    pub slug: String,
    pub name: String,
    pub category_id: Option<Uuid>,
    pub target_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ProjectMedia {
    pub project_id: Uuid,
    pub media_id: MediaId,
    pub plugin_id: Option<Uuid>,
}

/// A project-media link addressed by the remote project id, as exchanged
/// with a remote instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct CloudProjectMedia {
    pub cloud_project_id: Uuid,
    pub media_id: MediaId,
    pub plugin_id: Option<Uuid>,
}
