use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::ConfigType;
use crate::ids;

/// 任务记录
///
/// 最小的可分发工作单元，一个任务对应一次远程打标调用。
/// `task_id` 由作业标识、工作项内容和时间戳散列得到，作为外部队列的
/// 去重键；`task_uuid` 是存储层主键。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_uuid: String,
    pub task_id: String,
    pub shard_uuid: String,
    pub job_uuid: String,
    pub config_uuid: String,
    pub config_type: ConfigType,
    pub payload: WorkItem,
    pub status: TaskStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub creation_time: DateTime<Utc>,
}

/// 任务状态
///
/// 单调流转：`PENDING -> RUNNING -> {SUCCESS, ERROR}`，
/// 入队被拒绝时允许 `PENDING -> ERROR` 直达，终态不再流出。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "ERROR")]
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Error)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "RUNNING" => Ok(TaskStatus::Running),
            "SUCCESS" => Ok(TaskStatus::Success),
            "ERROR" => Ok(TaskStatus::Error),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for TaskStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TaskStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse::<TaskStatus>().map_err(Into::into)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for TaskStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// 工作项
///
/// 任务载荷的两种形态：裸URI标识，或调用方提供的结构化抽取记录。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum WorkItem {
    Uri(String),
    Extract(serde_json::Value),
}

impl WorkItem {
    /// 参与任务标识散列的内容形态
    pub fn identity(&self) -> String {
        match self {
            WorkItem::Uri(uri) => uri.clone(),
            WorkItem::Extract(value) => value.to_string(),
        }
    }
}

impl Task {
    /// 为一个工作项创建 PENDING 任务记录
    pub fn new(
        job_uuid: String,
        shard_uuid: String,
        config_uuid: String,
        config_type: ConfigType,
        payload: WorkItem,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_uuid: ids::new_uuid(),
            task_id: ids::task_id(&job_uuid, &payload, now),
            shard_uuid,
            job_uuid,
            config_uuid,
            config_type,
            payload,
            status: TaskStatus::Pending,
            start_time: None,
            end_time: None,
            creation_time: now,
        }
    }
}
