pub mod insert_builder;
pub mod postgres_config_repository;
pub mod postgres_job_repository;
pub mod postgres_shard_repository;
pub mod postgres_task_repository;

pub use insert_builder::{FieldValue, InsertBuilder};
pub use postgres_config_repository::PostgresConfigRepository;
pub use postgres_job_repository::PostgresJobRepository;
pub use postgres_shard_repository::PostgresShardRepository;
pub use postgres_task_repository::PostgresTaskRepository;
