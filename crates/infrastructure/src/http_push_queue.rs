use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use tagengine_core::config::WorkQueueConfig;
use tagengine_core::models::QueueRequest;
use tagengine_core::traits::WorkQueue;
use tagengine_core::{TagEngineError, TagEngineResult};

/// HTTP推送队列实现
///
/// 把入队请求POST给外部队列服务，由队列服务负责回调
/// `target_uri` 指向的任务处理端点。`task_id` 拼入资源路径，
/// 支持去重的队列服务据此丢弃重复提交。
pub struct HttpPushQueue {
    client: reqwest::Client,
    base_url: String,
    service_account: String,
}

impl HttpPushQueue {
    pub fn new(config: &WorkQueueConfig) -> TagEngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.connection_timeout_seconds))
            .build()
            .map_err(|e| TagEngineError::Queue(format!("构建HTTP客户端失败: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            service_account: config.service_account.clone(),
        })
    }
}

#[async_trait]
impl WorkQueue for HttpPushQueue {
    async fn enqueue(&self, request: &QueueRequest) -> TagEngineResult<()> {
        let url = format!("{}/tasks/{}", self.base_url, request.task_id);

        let response = self
            .client
            .post(&url)
            .header("x-enqueue-identity", &self.service_account)
            .json(request)
            .send()
            .await
            .map_err(|e| TagEngineError::Queue(format!("入队请求发送失败: {e}")))?;

        if !response.status().is_success() {
            return Err(TagEngineError::Queue(format!(
                "队列服务拒绝入队: {} ({})",
                request.task_id,
                response.status()
            )));
        }

        debug!("入队请求 {} 已推送到 {}", request.task_id, url);
        Ok(())
    }
}
