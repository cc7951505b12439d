use thiserror::Error;

/// 打标引擎错误类型定义
#[derive(Debug, Error)]
pub enum TagEngineError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("作业未找到: {job_uuid}")]
    JobNotFound { job_uuid: String },

    #[error("分片未找到: {shard_uuid}")]
    ShardNotFound { shard_uuid: String },

    #[error("任务未找到: {task_uuid}")]
    TaskNotFound { task_uuid: String },

    #[error("配置未找到: {config_uuid}")]
    ConfigNotFound { config_uuid: String },

    #[error("未知的配置类型: {0}")]
    UnknownConfigType(String),

    #[error("非法的任务状态流转: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("工作队列错误: {0}")]
    Queue(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}
