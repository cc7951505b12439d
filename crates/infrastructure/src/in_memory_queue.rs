use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use tagengine_core::models::QueueRequest;
use tagengine_core::traits::WorkQueue;
use tagengine_core::{TagEngineError, TagEngineResult};

/// 内存工作队列实现
///
/// 基于tokio通道，用于嵌入式部署与测试。无持久化，进程退出即丢失。
pub struct InMemoryWorkQueue {
    sender: mpsc::UnboundedSender<QueueRequest>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<QueueRequest>>>,
    size: AtomicU64,
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            size: AtomicU64::new(0),
        }
    }

    /// 取出一条入队请求，队列为空时返回 `None`
    pub async fn pop(&self) -> Option<QueueRequest> {
        let mut receiver = self.receiver.lock().await;
        match receiver.try_recv() {
            Ok(request) => {
                self.size.fetch_sub(1, Ordering::SeqCst);
                Some(request)
            }
            Err(_) => None,
        }
    }

    pub fn len(&self) -> u64 {
        self.size.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn enqueue(&self, request: &QueueRequest) -> TagEngineResult<()> {
        self.sender
            .send(request.clone())
            .map_err(|e| TagEngineError::Queue(format!("内存队列已关闭: {e}")))?;
        self.size.fetch_add(1, Ordering::SeqCst);

        debug!("入队请求 {} 已写入内存队列", request.task_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(task_id: &str) -> QueueRequest {
        QueueRequest {
            task_id: task_id.to_string(),
            target_uri: "/_run_task".to_string(),
            payload: json!({"job_uuid": "j1"}),
            service_account: "sa@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_enqueue_then_pop_preserves_order() {
        let queue = InMemoryWorkQueue::new();
        queue.enqueue(&request("a")).await.unwrap();
        queue.enqueue(&request("b")).await.unwrap();
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop().await.unwrap().task_id, "a");
        assert_eq!(queue.pop().await.unwrap().task_id, "b");
        assert!(queue.pop().await.is_none());
        assert!(queue.is_empty());
    }
}
