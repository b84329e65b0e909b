use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Link from a local organization to an organization on a remote instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct CloudConnection {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Local user that mirrored media is attributed to.
    pub creator_user_id: Option<Uuid>,
    pub host: String,
    #[serde(skip_serializing)]
    pub api_token: String,
    pub target_organization_slug: Option<String>,
    pub organization_list: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CloudConnection {
    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.host.trim_end_matches('/')
    }
}
