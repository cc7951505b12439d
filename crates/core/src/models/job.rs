use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::ConfigType;
use crate::ids;

/// 作业记录
///
/// 一个作业对应一次批量打标请求的完整生命周期，由配置触发创建，
/// 经过任务爆炸、远程分发后，依据分片汇总计数收敛到终态。
///
/// # 不变量
///
/// - `tasks_ran = tasks_success + tasks_failed` 在任意观察点成立
/// - 仅当 `tasks_ran >= task_count` 且 `task_count > 0` 时进入终态
/// - 进入终态后 `job_status` 与 `completion_time` 不再变更
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_uuid: String,
    pub config_uuid: String,
    pub config_type: ConfigType,
    pub job_status: JobStatus,
    pub task_count: i64,
    pub tasks_ran: i64,
    pub tasks_success: i64,
    pub tasks_failed: i64,
    pub creation_time: DateTime<Utc>,
    pub completion_time: Option<DateTime<Utc>>,
}

/// 作业状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "ERROR")]
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Error)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCESS" => Ok(JobStatus::Success),
            "ERROR" => Ok(JobStatus::Error),
            _ => Err(format!("Invalid job status: {s}")),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for JobStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for JobStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse::<JobStatus>().map_err(Into::into)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for JobStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

impl Job {
    /// 创建新作业，计数全部清零，由后续爆炸阶段写入 task_count
    pub fn new(config_uuid: String, config_type: ConfigType) -> Self {
        Self {
            job_uuid: ids::new_uuid(),
            config_uuid,
            config_type,
            job_status: JobStatus::Pending,
            task_count: 0,
            tasks_ran: 0,
            tasks_success: 0,
            tasks_failed: 0,
            creation_time: Utc::now(),
            completion_time: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.job_status.is_terminal()
    }
}

/// 作业元数据记录，与作业一对一，仅在调用方提供时写入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMetadata {
    pub job_uuid: String,
    pub config_uuid: String,
    pub config_type: ConfigType,
    pub metadata: serde_json::Value,
    pub creation_time: DateTime<Utc>,
}

/// 一次完成度计算的结果
#[derive(Debug, Clone, PartialEq)]
pub struct JobCompletion {
    pub tasks_success: i64,
    pub tasks_failed: i64,
    pub pct_complete: f64,
    pub job_status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Success,
            JobStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn test_new_job_has_zero_counters() {
        let job = Job::new("abc123".to_string(), ConfigType::StaticAsset);
        assert_eq!(job.job_status, JobStatus::Pending);
        assert_eq!(job.task_count, 0);
        assert_eq!(job.tasks_ran, 0);
        assert_eq!(job.tasks_success, 0);
        assert_eq!(job.tasks_failed, 0);
        assert!(job.completion_time.is_none());
        assert_eq!(job.job_uuid.len(), 32);
    }
}
