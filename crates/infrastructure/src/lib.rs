pub mod database;
pub mod http_push_queue;
pub mod in_memory_queue;
pub mod metrics_collector;
pub mod queue_factory;
pub mod rabbitmq_queue;

pub use database::create_pool;
pub use database::postgres::{
    InsertBuilder, PostgresConfigRepository, PostgresJobRepository, PostgresShardRepository,
    PostgresTaskRepository,
};
pub use http_push_queue::HttpPushQueue;
pub use in_memory_queue::InMemoryWorkQueue;
pub use metrics_collector::MetricsCollector;
pub use queue_factory::QueueFactory;
pub use rabbitmq_queue::RabbitMqWorkQueue;
