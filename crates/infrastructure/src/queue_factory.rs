use std::sync::Arc;

use tracing::info;

use tagengine_core::config::{WorkQueueConfig, WorkQueueType};
use tagengine_core::traits::WorkQueue;
use tagengine_core::TagEngineResult;

use crate::http_push_queue::HttpPushQueue;
use crate::in_memory_queue::InMemoryWorkQueue;
use crate::rabbitmq_queue::RabbitMqWorkQueue;

/// 按配置选择工作队列实现
pub struct QueueFactory;

impl QueueFactory {
    pub async fn create(config: &WorkQueueConfig) -> TagEngineResult<Arc<dyn WorkQueue>> {
        let queue: Arc<dyn WorkQueue> = match config.r#type {
            WorkQueueType::Rabbitmq => {
                info!("使用RabbitMQ工作队列: {}", config.url);
                Arc::new(RabbitMqWorkQueue::new(config.clone()).await?)
            }
            WorkQueueType::HttpPush => {
                info!("使用HTTP推送工作队列: {}", config.url);
                Arc::new(HttpPushQueue::new(config)?)
            }
            WorkQueueType::InMemory => {
                info!("使用内存工作队列");
                Arc::new(InMemoryWorkQueue::new())
            }
        };

        Ok(queue)
    }
}
