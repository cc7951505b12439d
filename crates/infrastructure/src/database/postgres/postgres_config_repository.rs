use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, info, instrument};

use tagengine_core::models::{
    ConfigStatus, ConfigType, JobStatus, RefreshMode, RefreshUnit, SchedulingStatus, TagConfig,
};
use tagengine_core::traits::ConfigRepository;
use tagengine_core::{TagEngineError, TagEngineResult};

use super::insert_builder::InsertBuilder;

const CONFIG_COLUMNS: &str = "config_uuid, config_type, config_status, fields, included_uris, \
     included_uris_hash, excluded_uris, template_uuid, template_id, refresh_mode, \
     refresh_frequency, refresh_unit, scheduling_status, next_run, version, job_status, \
     service_account, creation_time";

/// 配置仓储的Postgres实现
///
/// 每种配置变体一张表，表名由封闭的 `ConfigType::table()` 映射给出。
/// 同键覆盖（先灭活旧配置再插入新配置）在单个事务内完成。
pub struct PostgresConfigRepository {
    pool: PgPool,
}

impl PostgresConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_config(row: &sqlx::postgres::PgRow) -> TagEngineResult<TagConfig> {
        let config_status: String = row.try_get("config_status")?;
        let refresh_mode: String = row.try_get("refresh_mode")?;
        let refresh_unit: String = row.try_get("refresh_unit")?;
        let scheduling_status: Option<String> = row.try_get("scheduling_status")?;
        let job_status: Option<String> = row.try_get("job_status")?;

        Ok(TagConfig {
            config_uuid: row.try_get("config_uuid")?,
            config_type: row.try_get("config_type")?,
            config_status: config_status
                .parse::<ConfigStatus>()
                .map_err(TagEngineError::Serialization)?,
            fields: row.try_get("fields")?,
            included_uris: row.try_get("included_uris")?,
            included_uris_hash: row.try_get("included_uris_hash")?,
            excluded_uris: row.try_get("excluded_uris")?,
            template_uuid: row.try_get("template_uuid")?,
            template_id: row.try_get("template_id")?,
            refresh_mode: refresh_mode
                .parse::<RefreshMode>()
                .map_err(TagEngineError::Serialization)?,
            refresh_frequency: row.try_get("refresh_frequency")?,
            refresh_unit: refresh_unit
                .parse::<RefreshUnit>()
                .map_err(TagEngineError::Serialization)?,
            scheduling_status: scheduling_status
                .map(|s| s.parse::<SchedulingStatus>())
                .transpose()
                .map_err(TagEngineError::Serialization)?,
            next_run: row.try_get("next_run")?,
            version: row.try_get("version")?,
            job_status: job_status
                .map(|s| s.parse::<JobStatus>())
                .transpose()
                .map_err(TagEngineError::Serialization)?,
            service_account: row.try_get("service_account")?,
            creation_time: row.try_get("creation_time")?,
        })
    }
}

#[async_trait]
impl ConfigRepository for PostgresConfigRepository {
    #[instrument(skip(self, config), fields(
        config_uuid = %config.config_uuid,
        config_type = %config.config_type.as_str(),
    ))]
    async fn write(&self, config: &TagConfig) -> TagEngineResult<String> {
        let table = config.config_type.table();
        let mut tx = self.pool.begin().await?;

        // 同键覆盖：旧的匹配配置先灭活，与插入同一事务，避免双活窗口
        let superseded = sqlx::query(&format!(
            r#"
            UPDATE {table} SET config_status = 'INACTIVE'
            WHERE service_account = $1 AND template_uuid = $2
              AND included_uris_hash = $3 AND config_type = $4
              AND config_status != 'INACTIVE'
            "#
        ))
        .bind(&config.service_account)
        .bind(&config.template_uuid)
        .bind(&config.included_uris_hash)
        .bind(config.config_type)
        .execute(&mut *tx)
        .await?;

        if superseded.rows_affected() > 0 {
            info!(
                "同键配置已存在，灭活 {} 条旧配置 (表 {})",
                superseded.rows_affected(),
                table
            );
        }

        let mut insert = InsertBuilder::new(table)
            .field("config_uuid", config.config_uuid.clone())
            .field("config_type", config.config_type.as_str())
            .field("config_status", config.config_status.as_str())
            .field("fields", config.fields.clone())
            .field("included_uris", config.included_uris.clone())
            .field("included_uris_hash", config.included_uris_hash.clone())
            .field("excluded_uris", config.excluded_uris.clone())
            .field("template_uuid", config.template_uuid.clone())
            .field("template_id", config.template_id.clone())
            .field("refresh_mode", config.refresh_mode.as_str())
            .field("refresh_unit", config.refresh_unit.as_str())
            .field("version", config.version)
            .field("service_account", config.service_account.clone())
            .field("creation_time", config.creation_time);

        // AUTO 模式带调度字段入库，ON_DEMAND 不参与调度扫描
        insert = match config.refresh_mode {
            RefreshMode::Auto => {
                let frequency = TagConfig::normalize_refresh_frequency(config.refresh_frequency);
                let next_run = config.next_run.unwrap_or_else(|| {
                    TagConfig::compute_next_run(Utc::now(), frequency, config.refresh_unit)
                });
                insert
                    .field("refresh_frequency", frequency)
                    .field(
                        "scheduling_status",
                        config
                            .scheduling_status
                            .unwrap_or(SchedulingStatus::Ready)
                            .as_str(),
                    )
                    .field("next_run", next_run)
            }
            RefreshMode::OnDemand => insert.field("refresh_frequency", 0i64),
        };

        let sql = insert.sql();
        insert.bind_values(sqlx::query(&sql)).execute(&mut *tx).await?;
        tx.commit().await?;

        debug!("配置写入完成: {} -> {}", table, config.config_uuid);
        Ok(config.config_uuid.clone())
    }

    async fn read(
        &self,
        service_account: &str,
        config_uuid: &str,
        config_type: ConfigType,
    ) -> TagEngineResult<Option<TagConfig>> {
        let row = sqlx::query(&format!(
            "SELECT {CONFIG_COLUMNS} FROM {} WHERE config_uuid = $1",
            config_type.table()
        ))
        .bind(config_uuid)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let config = Self::row_to_config(&row)?;
                // 归属校验是授权边界：不匹配时与不存在同样表现
                if config.service_account != service_account {
                    debug!("配置 {} 归属校验失败，按不可见处理", config_uuid);
                    return Ok(None);
                }
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn read_ready(
        &self,
        now: DateTime<Utc>,
    ) -> TagEngineResult<Vec<(String, ConfigType)>> {
        let mut ready = Vec::new();

        for config_type in ConfigType::ALL {
            let rows = sqlx::query(&format!(
                r#"
                SELECT config_uuid FROM {}
                WHERE refresh_mode = 'AUTO' AND scheduling_status = 'READY'
                  AND config_status = 'ACTIVE' AND next_run <= $1
                "#,
                config_type.table()
            ))
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

            for row in rows {
                ready.push((row.try_get::<String, _>("config_uuid")?, config_type));
            }
        }

        debug!("到期配置扫描完成: {} 条", ready.len());
        Ok(ready)
    }

    #[instrument(skip(self))]
    async fn increment_version_next_run(
        &self,
        config_uuid: &str,
        config_type: ConfigType,
        now: DateTime<Utc>,
    ) -> TagEngineResult<()> {
        let table = config_type.table();

        let row = sqlx::query(&format!(
            "SELECT refresh_frequency, refresh_unit FROM {table} WHERE config_uuid = $1"
        ))
        .bind(config_uuid)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| TagEngineError::ConfigNotFound {
            config_uuid: config_uuid.to_string(),
        })?;

        let frequency: i64 = row.try_get("refresh_frequency")?;
        let unit: String = row.try_get("refresh_unit")?;
        let unit = unit
            .parse::<RefreshUnit>()
            .map_err(TagEngineError::Serialization)?;
        let next_run = TagConfig::compute_next_run(now, frequency, unit);

        sqlx::query(&format!(
            "UPDATE {table} SET version = version + 1, next_run = $2 WHERE config_uuid = $1"
        ))
        .bind(config_uuid)
        .bind(next_run)
        .execute(&self.pool)
        .await?;

        debug!("配置 {} 版本推进，下次调度 {}", config_uuid, next_run);
        Ok(())
    }

    async fn read_service_account(
        &self,
        config_uuid: &str,
        config_type: ConfigType,
    ) -> TagEngineResult<Option<String>> {
        let row = sqlx::query(&format!(
            "SELECT service_account FROM {} WHERE config_uuid = $1",
            config_type.table()
        ))
        .bind(config_uuid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row.try_get("service_account"))
            .transpose()
            .map_err(Into::into)
    }

    async fn update_scheduling_status(
        &self,
        config_uuid: &str,
        config_type: ConfigType,
        status: SchedulingStatus,
    ) -> TagEngineResult<()> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET scheduling_status = $2 WHERE config_uuid = $1",
            config_type.table()
        ))
        .bind(config_uuid)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TagEngineError::ConfigNotFound {
                config_uuid: config_uuid.to_string(),
            });
        }
        Ok(())
    }

    async fn update_job_status(
        &self,
        config_uuid: &str,
        config_type: ConfigType,
        status: JobStatus,
    ) -> TagEngineResult<()> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET job_status = $2 WHERE config_uuid = $1",
            config_type.table()
        ))
        .bind(config_uuid)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TagEngineError::ConfigNotFound {
                config_uuid: config_uuid.to_string(),
            });
        }
        Ok(())
    }

    async fn list(
        &self,
        service_account: &str,
        config_type: Option<ConfigType>,
    ) -> TagEngineResult<Vec<TagConfig>> {
        let tables: Vec<ConfigType> = match config_type {
            Some(ct) => vec![ct],
            None => ConfigType::ALL.to_vec(),
        };

        let mut configs = Vec::new();
        for ct in tables {
            let rows = sqlx::query(&format!(
                r#"
                SELECT {CONFIG_COLUMNS} FROM {}
                WHERE service_account = $1 AND config_status != 'INACTIVE'
                ORDER BY creation_time DESC
                "#,
                ct.table()
            ))
            .bind(service_account)
            .fetch_all(&self.pool)
            .await?;

            for row in &rows {
                configs.push(Self::row_to_config(row)?);
            }
        }

        Ok(configs)
    }

    #[instrument(skip(self))]
    async fn delete(
        &self,
        service_account: &str,
        config_uuid: &str,
        config_type: ConfigType,
    ) -> TagEngineResult<()> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE config_uuid = $1 AND service_account = $2",
            config_type.table()
        ))
        .bind(config_uuid)
        .bind(service_account)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TagEngineError::ConfigNotFound {
                config_uuid: config_uuid.to_string(),
            });
        }
        Ok(())
    }

    async fn purge_inactive(
        &self,
        service_account: &str,
        config_type: Option<ConfigType>,
    ) -> TagEngineResult<u64> {
        let tables: Vec<ConfigType> = match config_type {
            Some(ct) => vec![ct],
            None => ConfigType::ALL.to_vec(),
        };

        let mut purged = 0;
        for ct in tables {
            let result = sqlx::query(&format!(
                "DELETE FROM {} WHERE config_status = 'INACTIVE' AND service_account = $1",
                ct.table()
            ))
            .bind(service_account)
            .execute(&self.pool)
            .await?;
            purged += result.rows_affected();
        }

        info!("清理 INACTIVE 配置 {} 条", purged);
        Ok(purged)
    }
}
