use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use stagecast_core::models::{Task, TaskPayload, TaskStatus, TaskType};

/// Channel workers LISTEN on to wake up when a task is enqueued.
pub const TASK_NOTIFY_CHANNEL: &str = "stagecast_new_task";

const TASK_COLUMNS: &str = r#"
    id, organization_id, task_type, status, priority, payload, result,
    scheduled_at, started_at, completed_at, retry_count, max_retries,
    timeout_seconds, created_at, updated_at
"#;

#[derive(Clone)]
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a task and notify listening workers.
    #[tracing::instrument(skip(self, payload))]
    pub async fn create_task(
        &self,
        organization_id: Uuid,
        task_type: TaskType,
        payload: serde_json::Value,
        priority: i32,
        scheduled_at: Option<DateTime<Utc>>,
        max_retries: Option<i32>,
        timeout_seconds: Option<i32>,
    ) -> Result<Task> {
        let scheduled_at = scheduled_at.unwrap_or_else(Utc::now);
        let status = if scheduled_at > Utc::now() {
            TaskStatus::Scheduled
        } else {
            TaskStatus::Pending
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for task creation")?;

        let task = sqlx::query_as::<Postgres, Task>(&format!(
            r#"
            INSERT INTO tasks (
                organization_id, task_type, status, priority, payload,
                scheduled_at, max_retries, timeout_seconds
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(organization_id)
        .bind(task_type.as_str())
        .bind(status)
        .bind(priority)
        .bind(payload)
        .bind(scheduled_at)
        .bind(max_retries.unwrap_or(3))
        .bind(timeout_seconds)
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert {} task", task_type))?;

        // Workers fall back to polling when the notification is lost.
        if let Err(e) = sqlx::query("SELECT pg_notify($1, '')")
            .bind(TASK_NOTIFY_CHANNEL)
            .execute(&mut *tx)
            .await
        {
            tracing::warn!(
                error = %e,
                task_id = %task.id,
                "Failed to send pg_notify for new task, workers will discover task via polling"
            );
        }

        tx.commit()
            .await
            .context("Failed to commit task creation")?;

        tracing::info!(
            task_id = %task.id,
            organization_id = %organization_id,
            task_type = %task_type,
            "Task created"
        );
        Ok(task)
    }

    /// Enqueue a typed payload with default priority and retries.
    pub async fn enqueue<P: TaskPayload>(&self, organization_id: Uuid, payload: &P) -> Result<Task> {
        let value = serde_json::to_value(payload).context("Failed to serialize task payload")?;
        self.create_task(organization_id, P::task_type(), value, 5, None, None, None)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>> {
        sqlx::query_as::<Postgres, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch task")
    }

    /// Tasks of one type, newest first.
    pub async fn list_by_type(&self, task_type: TaskType) -> Result<Vec<Task>> {
        sqlx::query_as::<Postgres, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE task_type = $1 ORDER BY created_at DESC, id"
        ))
        .bind(task_type.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list tasks")
    }

    /// Atomically claim the next due task whose type is in `task_types`.
    /// `SKIP LOCKED` lets concurrent workers claim distinct rows.
    #[tracing::instrument(skip(self))]
    pub async fn claim_next_task(&self, task_types: &[TaskType]) -> Result<Option<Task>> {
        let types: Vec<&str> = task_types.iter().map(TaskType::as_str).collect();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin claim transaction")?;

        let candidate: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM tasks
            WHERE status IN ('pending', 'scheduled')
              AND scheduled_at <= NOW()
              AND task_type = ANY($1)
            ORDER BY priority DESC, scheduled_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(&types)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to select next task")?;

        let Some((task_id,)) = candidate else {
            tx.rollback().await.ok();
            return Ok(None);
        };

        let task = sqlx::query_as::<Postgres, Task>(&format!(
            r#"
            UPDATE tasks
            SET status = 'running', started_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to mark task running")?;

        tx.commit().await.context("Failed to commit task claim")?;
        tracing::debug!(task_id = %task.id, task_type = %task.task_type, "Task claimed");
        Ok(Some(task))
    }

    #[tracing::instrument(skip(self, result))]
    pub async fn mark_completed(&self, task_id: Uuid, result: serde_json::Value) -> Result<Task> {
        self.finish(task_id, TaskStatus::Completed, result).await
    }

    #[tracing::instrument(skip(self, error))]
    pub async fn mark_failed(&self, task_id: Uuid, error: serde_json::Value) -> Result<Task> {
        self.finish(task_id, TaskStatus::Failed, error).await
    }

    async fn finish(&self, task_id: Uuid, status: TaskStatus, result: serde_json::Value) -> Result<Task> {
        sqlx::query_as::<Postgres, Task>(&format!(
            r#"
            UPDATE tasks
            SET status = $2, result = $3, completed_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task_id)
        .bind(status)
        .bind(result)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to mark task {} {}", task_id, status))
    }

    /// Requeue running tasks whose worker vanished: started longer ago than
    /// their timeout plus `grace_secs`.
    #[tracing::instrument(skip(self))]
    pub async fn reap_stale_running_tasks(&self, default_timeout_secs: i32, grace_secs: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending', started_at = NULL, updated_at = NOW()
            WHERE status = 'running'
              AND started_at < NOW() - make_interval(secs => (COALESCE(timeout_seconds, $1) + $2)::double precision)
            "#,
        )
        .bind(default_timeout_secs)
        .bind(grace_secs)
        .execute(&self.pool)
        .await
        .context("Failed to reap stale tasks")?;

        if result.rows_affected() > 0 {
            tracing::warn!(reaped = result.rows_affected(), "Requeued stale running tasks");
        }
        Ok(result.rows_affected())
    }

    /// Put a failed task back in the queue after `delay_secs`.
    #[tracing::instrument(skip(self))]
    pub async fn increment_retry(&self, task_id: Uuid, delay_secs: u64) -> Result<Task> {
        sqlx::query_as::<Postgres, Task>(&format!(
            r#"
            UPDATE tasks
            SET retry_count = retry_count + 1,
                status = 'scheduled',
                started_at = NULL,
                scheduled_at = NOW() + make_interval(secs => $2),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task_id)
        .bind(delay_secs as f64)
        .fetch_one(&self.pool)
        .await
        .context("Failed to schedule task retry")
    }
}
