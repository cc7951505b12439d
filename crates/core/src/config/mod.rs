//! 应用配置
//!
//! 配置来源按优先级叠加：内置默认值 < TOML 配置文件 < `TAGENGINE__`
//! 前缀的环境变量。加载完成后做一次整体校验，校验失败直接拒绝启动。

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::errors::TagEngineError;
use crate::TagEngineResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub work_queue: WorkQueueConfig,
    pub dispatcher: DispatcherConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

/// 工作队列类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkQueueType {
    Rabbitmq,
    HttpPush,
    InMemory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkQueueConfig {
    pub r#type: WorkQueueType,
    /// RabbitMQ连接串或HTTP推送服务地址
    pub url: String,
    /// 任务队列名（RabbitMQ实现使用）
    pub task_queue: String,
    /// 作业爆炸回调端点
    pub job_handler_uri: String,
    /// 任务执行回调端点
    pub task_handler_uri: String,
    /// 随请求下发的调用方服务账号
    pub service_account: String,
    pub connection_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub enabled: bool,
    pub schedule_interval_seconds: u64,
    /// 单个分片的任务容量
    pub tasks_per_shard: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_enabled: bool,
    pub metrics_bind_address: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/tagengine".to_string(),
                max_connections: 10,
                min_connections: 1,
                connection_timeout_seconds: 30,
                idle_timeout_seconds: 600,
            },
            work_queue: WorkQueueConfig {
                r#type: WorkQueueType::InMemory,
                url: "amqp://localhost:5672".to_string(),
                task_queue: "tag-engine-queue".to_string(),
                job_handler_uri: "/_split_work".to_string(),
                task_handler_uri: "/_run_task".to_string(),
                service_account: "tag-engine@localhost".to_string(),
                connection_timeout_seconds: 30,
            },
            dispatcher: DispatcherConfig {
                enabled: true,
                schedule_interval_seconds: 60,
                tasks_per_shard: 1000,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_enabled: true,
                metrics_bind_address: "0.0.0.0:9090".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// 加载配置
    ///
    /// 给定路径时文件必须存在；未给定时按默认路径探测，全部缺席则
    /// 退回内置默认值。环境变量始终参与叠加。
    pub fn load(config_path: Option<&str>) -> TagEngineResult<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .add_source(config::Config::try_from(&defaults).map_err(|e| {
                TagEngineError::Configuration(format!("build default config failed: {e}"))
            })?);

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(TagEngineError::Configuration(format!(
                    "config file not found: {path}"
                )));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            for path in ["config/tagengine.toml", "tagengine.toml"] {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        let loaded: AppConfig = builder
            .add_source(Environment::with_prefix("TAGENGINE").separator("__"))
            .build()
            .map_err(|e| TagEngineError::Configuration(format!("load config failed: {e}")))?
            .try_deserialize()
            .map_err(|e| TagEngineError::Configuration(format!("parse config failed: {e}")))?;

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> TagEngineResult<()> {
        self.database.validate()?;
        self.work_queue.validate()?;
        self.dispatcher.validate()?;
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> TagEngineResult<()> {
        if self.url.is_empty() {
            return Err(TagEngineError::Configuration(
                "database.url must not be empty".to_string(),
            ));
        }
        if !self.url.starts_with("postgresql://") && !self.url.starts_with("postgres://") {
            return Err(TagEngineError::Configuration(
                "database.url must start with postgresql:// or postgres://".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(TagEngineError::Configuration(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(TagEngineError::Configuration(
                "database.min_connections must be less than or equal to max_connections"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl WorkQueueConfig {
    pub fn validate(&self) -> TagEngineResult<()> {
        if self.url.is_empty() {
            return Err(TagEngineError::Configuration(
                "work_queue.url must not be empty".to_string(),
            ));
        }
        if self.task_queue.is_empty() {
            return Err(TagEngineError::Configuration(
                "work_queue.task_queue must not be empty".to_string(),
            ));
        }
        if self.job_handler_uri.is_empty() || self.task_handler_uri.is_empty() {
            return Err(TagEngineError::Configuration(
                "work_queue handler uris must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> TagEngineResult<()> {
        if self.tasks_per_shard == 0 {
            return Err(TagEngineError::Configuration(
                "dispatcher.tasks_per_shard must be greater than 0".to_string(),
            ));
        }
        if self.schedule_interval_seconds == 0 {
            return Err(TagEngineError::Configuration(
                "dispatcher.schedule_interval_seconds must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dispatcher.tasks_per_shard, 1000);
    }

    #[test]
    fn test_database_config_validation() {
        let mut config = AppConfig::default();
        config.database.url = "mysql://localhost/tagengine".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.database.min_connections = 20;
        config.database.max_connections = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dispatcher_config_validation() {
        let mut config = AppConfig::default();
        config.dispatcher.tasks_per_shard = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_is_rejected() {
        let result = AppConfig::load(Some("/nonexistent/tagengine.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[database]
url = "postgresql://db.internal/tagengine"
max_connections = 20

[dispatcher]
schedule_interval_seconds = 30
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.database.url, "postgresql://db.internal/tagengine");
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.dispatcher.schedule_interval_seconds, 30);
        // 未覆盖的节保持默认值
        assert_eq!(config.dispatcher.tasks_per_shard, 1000);
        assert_eq!(config.work_queue.task_queue, "tag-engine-queue");
    }
}
