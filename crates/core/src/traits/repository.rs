//! 数据仓储层接口定义
//!
//! 持久化层的核心抽象，按实体拆分：
//! - 作业仓储 (JobRepository)
//! - 分片仓储 (ShardRepository)
//! - 任务仓储 (TaskRepository)
//! - 配置仓储 (ConfigRepository)
//!
//! 所有操作都是异步的，返回统一的 `TagEngineResult<T>`，实现必须满足
//! `Send + Sync` 以便以 `Arc<dyn …>` 的形式注入服务层。状态回报与完成度
//! 计算可能并发到达，计数类写入必须在存储层表达为原子相对增量。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    ConfigType, Job, JobMetadata, JobStatus, Shard, ShardDelta, ShardTotals, SchedulingStatus,
    TagConfig, Task, TaskStatus,
};
use crate::TagEngineResult;

/// 作业仓储接口
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// 写入新作业记录
    async fn create(&self, job: &Job) -> TagEngineResult<()>;

    /// 写入作业元数据记录（与作业一对一，可选）
    async fn create_metadata(&self, metadata: &JobMetadata) -> TagEngineResult<()>;

    /// 按标识读取作业
    async fn get(&self, job_uuid: &str) -> TagEngineResult<Option<Job>>;

    /// 覆盖写作业状态
    async fn set_status(&self, job_uuid: &str, status: JobStatus) -> TagEngineResult<()>;

    /// 记录作业的预期任务总数，爆炸完成后调用且只调用一次
    async fn record_task_count(&self, job_uuid: &str, task_count: i64) -> TagEngineResult<()>;

    /// 刷新运行中作业的聚合计数并将状态置为 RUNNING
    async fn update_progress(
        &self,
        job_uuid: &str,
        tasks_ran: i64,
        tasks_success: i64,
        tasks_failed: i64,
    ) -> TagEngineResult<()>;

    /// 尝试把作业置为终态并盖上完成时间
    ///
    /// 条件写：仅当作业尚未处于终态时生效，返回本次调用是否真正
    /// 完成了终态流转。重复调用不得改写 `completion_time`。
    async fn finalize(
        &self,
        job_uuid: &str,
        status: JobStatus,
        tasks_ran: i64,
        tasks_success: i64,
        tasks_failed: i64,
        completion_time: DateTime<Utc>,
    ) -> TagEngineResult<bool>;

    /// 某配置名下的作业列表，按完成时间倒序
    async fn list_by_config(&self, config_uuid: &str) -> TagEngineResult<Vec<Job>>;
}

/// 分片仓储接口
#[async_trait]
pub trait ShardRepository: Send + Sync {
    /// 写入分片记录
    ///
    /// 分片键是内容派生的，重复创建必须幂等（已存在时静默跳过）。
    async fn create(&self, shard: &Shard) -> TagEngineResult<()>;

    /// 固化分片的任务配额，分片填满或爆炸收尾时调用
    async fn set_task_count(&self, shard_uuid: &str, task_count: i64) -> TagEngineResult<()>;

    /// 以原子相对增量方式调整分片汇总计数
    ///
    /// 分片计数的唯一写入通道，禁止任何读-改-写式的整体覆盖。
    async fn apply_delta(&self, shard_uuid: &str, delta: &ShardDelta) -> TagEngineResult<()>;

    /// 按标识读取分片
    async fn get(&self, shard_uuid: &str) -> TagEngineResult<Option<Shard>>;

    /// 某作业全部分片的成功/失败合计
    async fn totals_for_job(&self, job_uuid: &str) -> TagEngineResult<ShardTotals>;

    /// 某作业的分片列表
    async fn list_by_job(&self, job_uuid: &str) -> TagEngineResult<Vec<Shard>>;
}

/// 任务仓储接口
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 写入 PENDING 任务记录
    async fn create(&self, task: &Task) -> TagEngineResult<()>;

    /// 受保护的任务状态流转
    ///
    /// 盖状态的同时写入相应时间戳：RUNNING 记 `start_time`，终态记
    /// `end_time`。终态不再流出；流转被接受时返回流转前的状态，
    /// 重复或非法投递返回 `None`，由调用方幂等忽略。
    async fn transition(
        &self,
        shard_uuid: &str,
        task_uuid: &str,
        status: TaskStatus,
        at: DateTime<Utc>,
    ) -> TagEngineResult<Option<TaskStatus>>;

    /// 按标识读取任务
    async fn get(&self, task_uuid: &str) -> TagEngineResult<Option<Task>>;

    /// 某分片的任务列表
    async fn list_by_shard(&self, shard_uuid: &str) -> TagEngineResult<Vec<Task>>;
}

/// 配置仓储接口
///
/// 每种配置变体一张表，写入遵循同键覆盖语义：同一
/// `(service_account, template_uuid, included_uris_hash, config_type)`
/// 键下旧的 ACTIVE 配置先被置为 INACTIVE，再插入新配置，两步在
/// 同一事务中完成。
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// 覆盖式写入配置，返回新配置的标识
    async fn write(&self, config: &TagConfig) -> TagEngineResult<String>;

    /// 按标识读取配置并校验归属
    ///
    /// `service_account` 不匹配时返回 `None`：这是授权边界而非不存在。
    async fn read(
        &self,
        service_account: &str,
        config_uuid: &str,
        config_type: ConfigType,
    ) -> TagEngineResult<Option<TagConfig>>;

    /// 跨全部变体表扫描到期可调度的配置
    ///
    /// 条件：`refresh_mode = AUTO`、`scheduling_status = READY`、
    /// `config_status = ACTIVE` 且 `next_run <= now`。
    async fn read_ready(
        &self,
        now: DateTime<Utc>,
    ) -> TagEngineResult<Vec<(String, ConfigType)>>;

    /// 版本号加一并依据刷新频率推进 `next_run`
    async fn increment_version_next_run(
        &self,
        config_uuid: &str,
        config_type: ConfigType,
        now: DateTime<Utc>,
    ) -> TagEngineResult<()>;

    /// 读取配置的归属服务账号，调度器以此身份发起作业
    async fn read_service_account(
        &self,
        config_uuid: &str,
        config_type: ConfigType,
    ) -> TagEngineResult<Option<String>>;

    /// 更新配置的调度状态
    async fn update_scheduling_status(
        &self,
        config_uuid: &str,
        config_type: ConfigType,
        status: SchedulingStatus,
    ) -> TagEngineResult<()>;

    /// 回写配置名下最近一次作业的状态，供外部回调层使用
    async fn update_job_status(
        &self,
        config_uuid: &str,
        config_type: ConfigType,
        status: JobStatus,
    ) -> TagEngineResult<()>;

    /// 某归属者名下的非 INACTIVE 配置列表，可按变体过滤
    async fn list(
        &self,
        service_account: &str,
        config_type: Option<ConfigType>,
    ) -> TagEngineResult<Vec<TagConfig>>;

    /// 删除配置，归属不匹配时不生效
    async fn delete(
        &self,
        service_account: &str,
        config_uuid: &str,
        config_type: ConfigType,
    ) -> TagEngineResult<()>;

    /// 清理归属者名下的 INACTIVE 配置，返回删除条数
    async fn purge_inactive(
        &self,
        service_account: &str,
        config_type: Option<ConfigType>,
    ) -> TagEngineResult<u64>;
}
