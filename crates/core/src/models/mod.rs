pub mod config;
pub mod job;
pub mod message;
pub mod shard;
pub mod task;

pub use config::{ConfigStatus, ConfigType, RefreshMode, RefreshUnit, SchedulingStatus, TagConfig};
pub use job::{Job, JobCompletion, JobMetadata, JobStatus};
pub use message::{JobRequest, QueueRequest, TaskRequest};
pub use shard::{Shard, ShardDelta, ShardTotals};
pub use task::{Task, TaskStatus, WorkItem};
