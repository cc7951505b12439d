use serde::{Deserialize, Serialize};

use super::config::ConfigType;
use super::task::WorkItem;

/// 外部工作队列的入队请求
///
/// `task_id` 由调用方提供，在支持去重的队列实现上用作幂等键；
/// `target_uri` 指向远端任务处理端点。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRequest {
    pub task_id: String,
    pub target_uri: String,
    pub payload: serde_json::Value,
    pub service_account: String,
}

/// 作业级派发载荷：通知远端处理器对作业执行任务爆炸
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_uuid: String,
    pub config_uuid: String,
    pub config_type: ConfigType,
    pub tag_creator_account: String,
    pub tag_invoker_account: String,
}

/// 任务级派发载荷：一次远程打标调用携带的全部标识与工作项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub job_uuid: String,
    pub shard_uuid: String,
    pub task_uuid: String,
    pub config_uuid: String,
    pub config_type: ConfigType,
    pub payload: WorkItem,
    pub tag_creator_account: String,
    pub tag_invoker_account: String,
}

impl QueueRequest {
    pub fn for_job(request: &JobRequest, task_id: String, target_uri: String) -> Self {
        let payload = serde_json::to_value(request).unwrap_or(serde_json::Value::Null);
        Self {
            task_id,
            target_uri,
            payload,
            service_account: request.tag_creator_account.clone(),
        }
    }

    pub fn for_task(request: &TaskRequest, task_id: String, target_uri: String) -> Self {
        let payload = serde_json::to_value(request).unwrap_or(serde_json::Value::Null);
        Self {
            task_id,
            target_uri,
            payload,
            service_account: request.tag_creator_account.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_request_payload_carries_identifiers() {
        let request = TaskRequest {
            job_uuid: "job1".to_string(),
            shard_uuid: "shard1".to_string(),
            task_uuid: "task1".to_string(),
            config_uuid: "cfg1".to_string(),
            config_type: ConfigType::StaticAsset,
            payload: WorkItem::Uri("bigquery/project/p/dataset/d".to_string()),
            tag_creator_account: "creator@example.com".to_string(),
            tag_invoker_account: "invoker@example.com".to_string(),
        };

        let queued = QueueRequest::for_task(&request, "tid".to_string(), "/_run_task".to_string());
        assert_eq!(queued.task_id, "tid");
        assert_eq!(queued.service_account, "creator@example.com");
        assert_eq!(queued.payload["shard_uuid"], json!("shard1"));
        assert_eq!(queued.payload["config_type"], json!("STATIC_TAG_ASSET"));
        assert_eq!(
            queued.payload["payload"],
            json!("bigquery/project/p/dataset/d")
        );
    }
}
