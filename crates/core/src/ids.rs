//! 标识符派生
//!
//! 分片与任务的标识符都由内容散列派生：分片键由作业标识与分片序号
//! 决定，重复爆炸得到同一分片；任务键额外混入时间戳，重试不会碰撞。

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use uuid::Uuid;

use crate::models::WorkItem;

/// 生成不带连字符的随机标识符
pub fn new_uuid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 任意内容的MD5十六进制摘要
pub fn content_hash(raw: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(raw.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// 分片标识：`hash(job_uuid ++ shard_index)`，可幂等重建
pub fn shard_uuid(job_uuid: &str, shard_index: usize) -> String {
    content_hash(&format!("{job_uuid}{shard_index}"))
}

/// 任务去重键：`hash(job_uuid ++ 工作项内容 ++ 时间戳)`
pub fn task_id(job_uuid: &str, item: &WorkItem, at: DateTime<Utc>) -> String {
    content_hash(&format!("{job_uuid}{}{}", item.identity(), at))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_uuid_is_deterministic() {
        let a = shard_uuid("1f1b4720839c11eca541e1ad551502cb", 0);
        let b = shard_uuid("1f1b4720839c11eca541e1ad551502cb", 0);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);

        let c = shard_uuid("1f1b4720839c11eca541e1ad551502cb", 1);
        assert_ne!(a, c);
    }

    #[test]
    fn test_task_id_varies_with_time_and_content() {
        let now = Utc::now();
        let item = WorkItem::Uri("gs://bucket/a".to_string());
        let a = task_id("job1", &item, now);
        let b = task_id("job1", &item, now + chrono::Duration::microseconds(1));
        assert_ne!(a, b);

        let other = WorkItem::Uri("gs://bucket/b".to_string());
        assert_ne!(a, task_id("job1", &other, now));
    }

    #[test]
    fn test_new_uuid_has_no_hyphens() {
        let id = new_uuid();
        assert_eq!(id.len(), 32);
        assert!(!id.contains('-'));
    }
}
