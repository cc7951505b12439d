use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use tagengine_core::models::{Task, TaskStatus, WorkItem};
use tagengine_core::traits::TaskRepository;
use tagengine_core::{TagEngineError, TagEngineResult};

const TASK_COLUMNS: &str = "task_uuid, task_id, shard_uuid, job_uuid, config_uuid, config_type, \
     payload, status, start_time, end_time, creation_time";

pub struct PostgresTaskRepository {
    pool: PgPool,
}

impl PostgresTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &sqlx::postgres::PgRow) -> TagEngineResult<Task> {
        let payload: serde_json::Value = row.try_get("payload")?;
        let payload: WorkItem = serde_json::from_value(payload)
            .map_err(|e| TagEngineError::Serialization(format!("任务载荷解析失败: {e}")))?;

        Ok(Task {
            task_uuid: row.try_get("task_uuid")?,
            task_id: row.try_get("task_id")?,
            shard_uuid: row.try_get("shard_uuid")?,
            job_uuid: row.try_get("job_uuid")?,
            config_uuid: row.try_get("config_uuid")?,
            config_type: row.try_get("config_type")?,
            payload,
            status: row.try_get("status")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            creation_time: row.try_get("creation_time")?,
        })
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    #[instrument(skip(self, task), fields(task_uuid = %task.task_uuid, shard_uuid = %task.shard_uuid))]
    async fn create(&self, task: &Task) -> TagEngineResult<()> {
        let payload = serde_json::to_value(&task.payload)
            .map_err(|e| TagEngineError::Serialization(format!("任务载荷序列化失败: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO tasks (task_uuid, task_id, shard_uuid, job_uuid, config_uuid, config_type, payload, status, creation_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&task.task_uuid)
        .bind(&task.task_id)
        .bind(&task.shard_uuid)
        .bind(&task.job_uuid)
        .bind(&task.config_uuid)
        .bind(task.config_type)
        .bind(payload)
        .bind(task.status)
        .bind(task.creation_time)
        .execute(&self.pool)
        .await?;

        debug!("创建任务记录 {} (分片 {})", task.task_uuid, task.shard_uuid);
        Ok(())
    }

    async fn transition(
        &self,
        shard_uuid: &str,
        task_uuid: &str,
        status: TaskStatus,
        at: DateTime<Utc>,
    ) -> TagEngineResult<Option<TaskStatus>> {
        let row = match status {
            TaskStatus::Running => {
                sqlx::query(
                    r#"
                    UPDATE tasks SET status = $3, start_time = $4
                    WHERE shard_uuid = $1 AND task_uuid = $2 AND status = 'PENDING'
                    RETURNING 'PENDING'::VARCHAR AS prev_status
                    "#,
                )
                .bind(shard_uuid)
                .bind(task_uuid)
                .bind(status)
                .bind(at)
                .fetch_optional(&self.pool)
                .await?
            }
            TaskStatus::Success | TaskStatus::Error => {
                // 锁定行并带出流转前状态，终态不再流出
                sqlx::query(
                    r#"
                    UPDATE tasks SET status = $3, end_time = $4
                    FROM (
                        SELECT task_uuid AS locked_uuid, status AS prev_status
                        FROM tasks WHERE shard_uuid = $1 AND task_uuid = $2 FOR UPDATE
                    ) prev
                    WHERE tasks.task_uuid = prev.locked_uuid
                      AND prev.prev_status IN ('PENDING', 'RUNNING')
                    RETURNING prev.prev_status
                    "#,
                )
                .bind(shard_uuid)
                .bind(task_uuid)
                .bind(status)
                .bind(at)
                .fetch_optional(&self.pool)
                .await?
            }
            TaskStatus::Pending => {
                return Err(TagEngineError::InvalidTransition {
                    from: "*".to_string(),
                    to: TaskStatus::Pending.as_str().to_string(),
                });
            }
        };

        match row {
            Some(row) => {
                let prev: String = row.try_get("prev_status")?;
                let prev = prev
                    .parse::<TaskStatus>()
                    .map_err(TagEngineError::Serialization)?;
                Ok(Some(prev))
            }
            None => {
                debug!(
                    "任务 {} 状态流转到 {:?} 被忽略（重复投递或已终态）",
                    task_uuid, status
                );
                Ok(None)
            }
        }
    }

    async fn get(&self, task_uuid: &str) -> TagEngineResult<Option<Task>> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE task_uuid = $1"
        ))
        .bind(task_uuid)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    async fn list_by_shard(&self, shard_uuid: &str) -> TagEngineResult<Vec<Task>> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE shard_uuid = $1 ORDER BY creation_time"
        ))
        .bind(shard_uuid)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_task).collect()
    }
}
