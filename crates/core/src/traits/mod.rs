pub mod queue;
pub mod repository;

pub use queue::WorkQueue;
pub use repository::{ConfigRepository, JobRepository, ShardRepository, TaskRepository};
