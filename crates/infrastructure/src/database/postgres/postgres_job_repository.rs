use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use tagengine_core::models::{Job, JobMetadata, JobStatus};
use tagengine_core::traits::JobRepository;
use tagengine_core::{TagEngineError, TagEngineResult};

use super::insert_builder::InsertBuilder;

const JOB_COLUMNS: &str = "job_uuid, config_uuid, config_type, job_status, task_count, \
     tasks_ran, tasks_success, tasks_failed, creation_time, completion_time";

pub struct PostgresJobRepository {
    pool: PgPool,
}

impl PostgresJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::postgres::PgRow) -> TagEngineResult<Job> {
        Ok(Job {
            job_uuid: row.try_get("job_uuid")?,
            config_uuid: row.try_get("config_uuid")?,
            config_type: row.try_get("config_type")?,
            job_status: row.try_get("job_status")?,
            task_count: row.try_get("task_count")?,
            tasks_ran: row.try_get("tasks_ran")?,
            tasks_success: row.try_get("tasks_success")?,
            tasks_failed: row.try_get("tasks_failed")?,
            creation_time: row.try_get("creation_time")?,
            completion_time: row.try_get("completion_time")?,
        })
    }
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    #[instrument(skip(self, job), fields(job_uuid = %job.job_uuid, config_uuid = %job.config_uuid))]
    async fn create(&self, job: &Job) -> TagEngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (job_uuid, config_uuid, config_type, job_status, task_count, tasks_ran, tasks_success, tasks_failed, creation_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&job.job_uuid)
        .bind(&job.config_uuid)
        .bind(job.config_type)
        .bind(job.job_status)
        .bind(job.task_count)
        .bind(job.tasks_ran)
        .bind(job.tasks_success)
        .bind(job.tasks_failed)
        .bind(job.creation_time)
        .execute(&self.pool)
        .await?;

        debug!("创建作业记录成功: {}", job.job_uuid);
        Ok(())
    }

    #[instrument(skip(self, metadata), fields(job_uuid = %metadata.job_uuid))]
    async fn create_metadata(&self, metadata: &JobMetadata) -> TagEngineResult<()> {
        // 元数据是调用方给定的任意映射，走类型化插入构建器
        let insert = InsertBuilder::new("job_metadata")
            .field("job_uuid", metadata.job_uuid.clone())
            .field("config_uuid", metadata.config_uuid.clone())
            .field("config_type", metadata.config_type.as_str())
            .field("metadata", metadata.metadata.clone())
            .field("creation_time", metadata.creation_time);

        let sql = insert.sql();
        insert.bind_values(sqlx::query(&sql)).execute(&self.pool).await?;

        debug!("创建作业元数据记录成功: {}", metadata.job_uuid);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, job_uuid: &str) -> TagEngineResult<Option<Job>> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE job_uuid = $1"
        ))
        .bind(job_uuid)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    #[instrument(skip(self))]
    async fn set_status(&self, job_uuid: &str, status: JobStatus) -> TagEngineResult<()> {
        let result = sqlx::query("UPDATE jobs SET job_status = $2 WHERE job_uuid = $1")
            .bind(job_uuid)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TagEngineError::JobNotFound {
                job_uuid: job_uuid.to_string(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_task_count(&self, job_uuid: &str, task_count: i64) -> TagEngineResult<()> {
        let result = sqlx::query("UPDATE jobs SET task_count = $2 WHERE job_uuid = $1")
            .bind(job_uuid)
            .bind(task_count)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TagEngineError::JobNotFound {
                job_uuid: job_uuid.to_string(),
            });
        }

        debug!("记录作业任务总数: {} -> {}", job_uuid, task_count);
        Ok(())
    }

    async fn update_progress(
        &self,
        job_uuid: &str,
        tasks_ran: i64,
        tasks_success: i64,
        tasks_failed: i64,
    ) -> TagEngineResult<()> {
        // 终态作业不可回写，条件不满足时静默跳过
        sqlx::query(
            r#"
            UPDATE jobs SET job_status = 'RUNNING', tasks_ran = $2, tasks_success = $3, tasks_failed = $4
            WHERE job_uuid = $1 AND job_status NOT IN ('SUCCESS', 'ERROR')
            "#,
        )
        .bind(job_uuid)
        .bind(tasks_ran)
        .bind(tasks_success)
        .bind(tasks_failed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(job_uuid = %job_uuid, status = ?status))]
    async fn finalize(
        &self,
        job_uuid: &str,
        status: JobStatus,
        tasks_ran: i64,
        tasks_success: i64,
        tasks_failed: i64,
        completion_time: DateTime<Utc>,
    ) -> TagEngineResult<bool> {
        // 条件写保证终态流转恰好发生一次，completion_time 只被首个成功者盖章
        let result = sqlx::query(
            r#"
            UPDATE jobs SET job_status = $2, tasks_ran = $3, tasks_success = $4, tasks_failed = $5, completion_time = $6
            WHERE job_uuid = $1 AND job_status NOT IN ('SUCCESS', 'ERROR')
            "#,
        )
        .bind(job_uuid)
        .bind(status)
        .bind(tasks_ran)
        .bind(tasks_success)
        .bind(tasks_failed)
        .bind(completion_time)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_config(&self, config_uuid: &str) -> TagEngineResult<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE config_uuid = $1 ORDER BY completion_time DESC"
        ))
        .bind(config_uuid)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_job).collect()
    }
}
