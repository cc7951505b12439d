use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::TaskStatus;

/// 分片记录
///
/// 固定容量的任务批次，只承担汇总计数职责，不提供任何顺序保证。
/// `shard_uuid` 由 `hash(job_uuid ++ shard_index)` 派生，重复创建幂等。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shard {
    pub shard_uuid: String,
    pub job_uuid: String,
    pub task_count: i64,
    pub tasks_ran: i64,
    pub tasks_running: i64,
    pub tasks_success: i64,
    pub tasks_failed: i64,
    pub creation_time: DateTime<Utc>,
}

impl Shard {
    pub fn new(job_uuid: String, shard_uuid: String) -> Self {
        Self {
            shard_uuid,
            job_uuid,
            task_count: 0,
            tasks_ran: 0,
            tasks_running: 0,
            tasks_success: 0,
            tasks_failed: 0,
            creation_time: Utc::now(),
        }
    }
}

/// 分片计数增量
///
/// 分片汇总计数的唯一写入形式：每次任务状态流转折算为一组带符号的
/// 相对增量，由存储层以原子自增方式应用，避免并发写入相互覆盖。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardDelta {
    pub ran: i64,
    pub running: i64,
    pub success: i64,
    pub failed: i64,
}

impl ShardDelta {
    /// 状态流转对应的计数增量表
    ///
    /// 终态不再流出，重复投递返回 `None` 由调用方幂等忽略。
    /// `PENDING -> ERROR` 覆盖入队被拒绝的场景，不触碰 running 计数。
    pub fn for_transition(prev: TaskStatus, next: TaskStatus) -> Option<ShardDelta> {
        use TaskStatus::*;

        match (prev, next) {
            (Pending, Running) => Some(ShardDelta {
                running: 1,
                ..Default::default()
            }),
            (Running, Success) => Some(ShardDelta {
                ran: 1,
                running: -1,
                success: 1,
                ..Default::default()
            }),
            (Running, Error) => Some(ShardDelta {
                ran: 1,
                running: -1,
                failed: 1,
                ..Default::default()
            }),
            // 乱序到达的终态回报与入队失败：任务从未计入 running
            (Pending, Success) => Some(ShardDelta {
                ran: 1,
                success: 1,
                ..Default::default()
            }),
            (Pending, Error) => Some(ShardDelta {
                ran: 1,
                failed: 1,
                ..Default::default()
            }),
            _ => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        *self == ShardDelta::default()
    }
}

/// 某个作业全部分片的成功/失败合计，作业完成度由此聚合得出
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardTotals {
    pub tasks_success: i64,
    pub tasks_failed: i64,
}

impl ShardTotals {
    pub fn tasks_ran(&self) -> i64 {
        self.tasks_success + self.tasks_failed
    }
}
