use std::sync::Arc;

use async_trait::async_trait;
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    Queue,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use tagengine_core::config::WorkQueueConfig;
use tagengine_core::models::QueueRequest;
use tagengine_core::traits::WorkQueue;
use tagengine_core::{TagEngineError, TagEngineResult};

/// RabbitMQ工作队列实现
///
/// 入队即向持久化队列发布一条请求消息，`task_id` 写入消息的
/// `message_id` 属性供消费侧去重。投递语义为至少一次。
pub struct RabbitMqWorkQueue {
    connection: Connection,
    channel: Arc<Mutex<Channel>>,
    config: WorkQueueConfig,
}

impl RabbitMqWorkQueue {
    pub async fn new(config: WorkQueueConfig) -> TagEngineResult<Self> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| TagEngineError::Queue(format!("连接RabbitMQ失败: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| TagEngineError::Queue(format!("创建通道失败: {e}")))?;

        info!("成功连接到RabbitMQ: {}", config.url);

        let queue = Self {
            connection,
            channel: Arc::new(Mutex::new(channel)),
            config,
        };
        queue.declare_task_queue().await?;

        Ok(queue)
    }

    async fn declare_task_queue(&self) -> TagEngineResult<Queue> {
        let channel = self.channel.lock().await;
        let queue = channel
            .queue_declare(
                &self.config.task_queue,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                TagEngineError::Queue(format!("声明队列 {} 失败: {e}", self.config.task_queue))
            })?;

        debug!("队列 {} 声明成功", self.config.task_queue);
        Ok(queue)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    pub async fn close(&self) -> TagEngineResult<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| TagEngineError::Queue(format!("关闭连接失败: {e}")))?;

        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}

#[async_trait]
impl WorkQueue for RabbitMqWorkQueue {
    async fn enqueue(&self, request: &QueueRequest) -> TagEngineResult<()> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| TagEngineError::Serialization(format!("序列化入队请求失败: {e}")))?;

        let channel = self.channel.lock().await;
        let confirm = channel
            .basic_publish(
                "",
                &self.config.task_queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_message_id(request.task_id.clone().into())
                    .with_delivery_mode(2), // 2 = persistent
            )
            .await
            .map_err(|e| TagEngineError::Queue(format!("发布消息失败: {e}")))?;

        confirm
            .await
            .map_err(|e| TagEngineError::Queue(format!("消息发布确认失败: {e}")))?;

        debug!(
            "入队请求 {} 已发布到队列 {}",
            request.task_id, self.config.task_queue
        );
        Ok(())
    }
}
