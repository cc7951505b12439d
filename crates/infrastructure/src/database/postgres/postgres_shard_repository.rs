use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use tagengine_core::models::{Shard, ShardDelta, ShardTotals};
use tagengine_core::traits::ShardRepository;
use tagengine_core::{TagEngineError, TagEngineResult};

const SHARD_COLUMNS: &str = "shard_uuid, job_uuid, task_count, tasks_ran, tasks_running, \
     tasks_success, tasks_failed, creation_time";

pub struct PostgresShardRepository {
    pool: PgPool,
}

impl PostgresShardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_shard(row: &sqlx::postgres::PgRow) -> TagEngineResult<Shard> {
        Ok(Shard {
            shard_uuid: row.try_get("shard_uuid")?,
            job_uuid: row.try_get("job_uuid")?,
            task_count: row.try_get("task_count")?,
            tasks_ran: row.try_get("tasks_ran")?,
            tasks_running: row.try_get("tasks_running")?,
            tasks_success: row.try_get("tasks_success")?,
            tasks_failed: row.try_get("tasks_failed")?,
            creation_time: row.try_get("creation_time")?,
        })
    }
}

#[async_trait]
impl ShardRepository for PostgresShardRepository {
    #[instrument(skip(self, shard), fields(shard_uuid = %shard.shard_uuid, job_uuid = %shard.job_uuid))]
    async fn create(&self, shard: &Shard) -> TagEngineResult<()> {
        // 分片键内容派生，重复爆炸时按幂等处理
        sqlx::query(
            r#"
            INSERT INTO shards (shard_uuid, job_uuid, task_count, tasks_ran, tasks_running, tasks_success, tasks_failed, creation_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (shard_uuid) DO NOTHING
            "#,
        )
        .bind(&shard.shard_uuid)
        .bind(&shard.job_uuid)
        .bind(shard.task_count)
        .bind(shard.tasks_ran)
        .bind(shard.tasks_running)
        .bind(shard.tasks_success)
        .bind(shard.tasks_failed)
        .bind(shard.creation_time)
        .execute(&self.pool)
        .await?;

        debug!("创建分片记录: {}", shard.shard_uuid);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_task_count(&self, shard_uuid: &str, task_count: i64) -> TagEngineResult<()> {
        let result = sqlx::query("UPDATE shards SET task_count = $2 WHERE shard_uuid = $1")
            .bind(shard_uuid)
            .bind(task_count)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TagEngineError::ShardNotFound {
                shard_uuid: shard_uuid.to_string(),
            });
        }
        Ok(())
    }

    async fn apply_delta(&self, shard_uuid: &str, delta: &ShardDelta) -> TagEngineResult<()> {
        if delta.is_noop() {
            return Ok(());
        }

        // 相对增量在存储层原子生效，并发回报不会相互覆盖
        let result = sqlx::query(
            r#"
            UPDATE shards SET
                tasks_ran = tasks_ran + $2,
                tasks_running = tasks_running + $3,
                tasks_success = tasks_success + $4,
                tasks_failed = tasks_failed + $5
            WHERE shard_uuid = $1
            "#,
        )
        .bind(shard_uuid)
        .bind(delta.ran)
        .bind(delta.running)
        .bind(delta.success)
        .bind(delta.failed)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TagEngineError::ShardNotFound {
                shard_uuid: shard_uuid.to_string(),
            });
        }
        Ok(())
    }

    async fn get(&self, shard_uuid: &str) -> TagEngineResult<Option<Shard>> {
        let row = sqlx::query(&format!(
            "SELECT {SHARD_COLUMNS} FROM shards WHERE shard_uuid = $1"
        ))
        .bind(shard_uuid)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_shard).transpose()
    }

    #[instrument(skip(self))]
    async fn totals_for_job(&self, job_uuid: &str) -> TagEngineResult<ShardTotals> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(tasks_success), 0)::BIGINT AS tasks_success,
                   COALESCE(SUM(tasks_failed), 0)::BIGINT AS tasks_failed
            FROM shards WHERE job_uuid = $1
            "#,
        )
        .bind(job_uuid)
        .fetch_one(&self.pool)
        .await?;

        Ok(ShardTotals {
            tasks_success: row.try_get("tasks_success")?,
            tasks_failed: row.try_get("tasks_failed")?,
        })
    }

    async fn list_by_job(&self, job_uuid: &str) -> TagEngineResult<Vec<Shard>> {
        let rows = sqlx::query(&format!(
            "SELECT {SHARD_COLUMNS} FROM shards WHERE job_uuid = $1 ORDER BY creation_time"
        ))
        .bind(job_uuid)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_shard).collect()
    }
}
