use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::ids::MediaId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    VideoTranscode,
    CloudConnectionSync,
    CloudConnectionSyncMedia,
    /// Consumed by the document service, never by this worker.
    ProjectSyncDocument,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::VideoTranscode => "video_transcode",
            TaskType::CloudConnectionSync => "cloud_connection_sync",
            TaskType::CloudConnectionSyncMedia => "cloud_connection_sync_media",
            TaskType::ProjectSyncDocument => "project_sync_document",
        }
    }
}

impl Display for TaskType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video_transcode" => Ok(TaskType::VideoTranscode),
            "cloud_connection_sync" => Ok(TaskType::CloudConnectionSync),
            "cloud_connection_sync_media" => Ok(TaskType::CloudConnectionSyncMedia),
            "project_sync_document" => Ok(TaskType::ProjectSyncDocument),
            _ => Err(anyhow::anyhow!("Invalid task type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "task_status", rename_all = "lowercase")
)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Scheduled,
    Cancelled,
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Scheduled => write!(f, "scheduled"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 3,
    #[default]
    Normal = 5,
    High = 7,
    Critical = 10,
}

impl Priority {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub priority: i32,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub timeout_seconds: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Task {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Task {
            id: row.try_get("id")?,
            organization_id: row.try_get("organization_id")?,
            task_type: row
                .try_get::<String, _>("task_type")?
                .parse()
                .map_err(|e| sqlx::Error::Decode(format!("Failed to parse task_type: {}", e).into()))?,
            status: row.try_get("status")?,
            priority: row.try_get("priority")?,
            payload: row.try_get("payload")?,
            result: row.try_get("result")?,
            scheduled_at: row.try_get("scheduled_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            retry_count: row.try_get("retry_count")?,
            max_retries: row.try_get("max_retries")?,
            timeout_seconds: row.try_get("timeout_seconds")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Task {
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn try_payload_as<P: TaskPayload>(&self) -> Result<P, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Typed task payload bound to its task type.
pub trait TaskPayload: Serialize + for<'de> Deserialize<'de> {
    fn task_type() -> TaskType;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoTranscodePayload {
    pub media_id: MediaId,
}

impl TaskPayload for VideoTranscodePayload {
    fn task_type() -> TaskType {
        TaskType::VideoTranscode
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSyncPayload {
    pub cloud_connection_id: Uuid,
    #[serde(default)]
    pub force_resync: bool,
}

impl TaskPayload for CloudSyncPayload {
    fn task_type() -> TaskType {
        TaskType::CloudConnectionSync
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSyncMediaPayload {
    pub cloud_connection_id: Uuid,
    /// Remote project ids whose media should be mirrored.
    pub external_project_ids: Vec<Uuid>,
    #[serde(default)]
    pub force_resync: bool,
}

impl TaskPayload for CloudSyncMediaPayload {
    fn task_type() -> TaskType {
        TaskType::CloudConnectionSyncMedia
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSyncDocumentPayload {
    pub project_id: Uuid,
    pub cloud_connection_id: Uuid,
}

impl TaskPayload for ProjectSyncDocumentPayload {
    fn task_type() -> TaskType {
        TaskType::ProjectSyncDocument
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_round_trip_strings() {
        for task_type in [
            TaskType::VideoTranscode,
            TaskType::CloudConnectionSync,
            TaskType::CloudConnectionSyncMedia,
            TaskType::ProjectSyncDocument,
        ] {
            assert_eq!(task_type.to_string().parse::<TaskType>().unwrap(), task_type);
        }
        assert!("generate_embedding".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_priority_values() {
        assert_eq!(Priority::default().as_i32(), 5);
        assert!(Priority::Critical > Priority::High);
    }

    #[test]
    fn test_media_sync_payload_defaults_force_flag() {
        let payload: CloudSyncMediaPayload = serde_json::from_value(serde_json::json!({
            "cloudConnectionId": Uuid::nil(),
            "externalProjectIds": [],
        }))
        .unwrap();
        assert!(!payload.force_resync);
        assert!(payload.external_project_ids.is_empty());
    }
}
