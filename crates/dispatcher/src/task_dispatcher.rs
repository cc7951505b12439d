use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use tagengine_core::models::{
    ConfigType, JobRequest, QueueRequest, Shard, ShardDelta, Task, TaskRequest, TaskStatus,
    WorkItem,
};
use tagengine_core::traits::{ShardRepository, TaskRepository, WorkQueue};
use tagengine_core::{ids, TagEngineError, TagEngineResult};
use tagengine_infrastructure::MetricsCollector;

use crate::job_service::JobService;

/// 任务与分片派发器
///
/// 把一次作业的工作项集合按固定容量切成分片，逐项落任务记录并向
/// 外部队列提交远程调用；任务状态回报到达时负责任务行盖章与分片
/// 汇总计数的增量调整。分片计数只允许从这里写入。
pub struct TaskDispatcher {
    task_repo: Arc<dyn TaskRepository>,
    shard_repo: Arc<dyn ShardRepository>,
    work_queue: Arc<dyn WorkQueue>,
    /// 任务执行回调端点，随入队请求下发
    task_handler_uri: String,
    /// 单个分片的任务容量
    tasks_per_shard: usize,
    metrics: Arc<MetricsCollector>,
}

impl TaskDispatcher {
    pub fn new(
        task_repo: Arc<dyn TaskRepository>,
        shard_repo: Arc<dyn ShardRepository>,
        work_queue: Arc<dyn WorkQueue>,
        task_handler_uri: String,
        tasks_per_shard: usize,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            task_repo,
            shard_repo,
            work_queue,
            task_handler_uri,
            tasks_per_shard: tasks_per_shard.max(1),
            metrics,
        }
    }

    /// 爆炸并派发一个作业的全部工作项，返回落库的任务总数
    ///
    /// 分片边界按工作项顺序切分：每满一个容量开新分片，最后一个分片
    /// 允许不满。分片键由作业标识与分片序号派生，重复爆炸不会产生
    /// 新分片。单个工作项入队被拒绝时任务直接置为 ERROR 并累计到
    /// 分片失败计数，剩余工作项继续派发。
    #[instrument(skip(self, work_items), fields(
        job_uuid = %job_uuid,
        item_count = work_items.len(),
    ))]
    pub async fn explode_and_dispatch(
        &self,
        tag_creator_account: &str,
        tag_invoker_account: &str,
        job_uuid: &str,
        config_uuid: &str,
        config_type: ConfigType,
        work_items: &[WorkItem],
    ) -> TagEngineResult<i64> {
        let start = std::time::Instant::now();
        let mut total: i64 = 0;

        for (shard_index, chunk) in work_items.chunks(self.tasks_per_shard).enumerate() {
            let shard_uuid = ids::shard_uuid(job_uuid, shard_index);
            self.shard_repo
                .create(&Shard::new(job_uuid.to_string(), shard_uuid.clone()))
                .await?;

            debug!("分片 {} ({}) 开始填充", shard_index, shard_uuid);

            for item in chunk {
                self.dispatch_one(
                    tag_creator_account,
                    tag_invoker_account,
                    job_uuid,
                    &shard_uuid,
                    config_uuid,
                    config_type,
                    item.clone(),
                )
                .await?;
                total += 1;
            }

            self.shard_repo
                .set_task_count(&shard_uuid, chunk.len() as i64)
                .await?;
        }

        self.metrics
            .record_explode_duration(start.elapsed().as_secs_f64());
        info!(
            "作业 {} 爆炸完成: {} 个任务, {} 个分片",
            job_uuid,
            total,
            work_items.chunks(self.tasks_per_shard).len()
        );

        Ok(total)
    }

    /// 落一条 PENDING 任务并提交远程调用
    #[allow(clippy::too_many_arguments)]
    async fn dispatch_one(
        &self,
        tag_creator_account: &str,
        tag_invoker_account: &str,
        job_uuid: &str,
        shard_uuid: &str,
        config_uuid: &str,
        config_type: ConfigType,
        item: WorkItem,
    ) -> TagEngineResult<()> {
        let task = Task::new(
            job_uuid.to_string(),
            shard_uuid.to_string(),
            config_uuid.to_string(),
            config_type,
            item,
        );
        self.task_repo.create(&task).await?;

        let request = TaskRequest {
            job_uuid: job_uuid.to_string(),
            shard_uuid: shard_uuid.to_string(),
            task_uuid: task.task_uuid.clone(),
            config_uuid: config_uuid.to_string(),
            config_type,
            payload: task.payload.clone(),
            tag_creator_account: tag_creator_account.to_string(),
            tag_invoker_account: tag_invoker_account.to_string(),
        };

        let enqueue_result = self
            .work_queue
            .enqueue(&QueueRequest::for_task(
                &request,
                task.task_id.clone(),
                self.task_handler_uri.clone(),
            ))
            .await;

        match enqueue_result {
            Ok(()) => {
                self.metrics.record_task_dispatched();
                Ok(())
            }
            Err(e) => {
                // 队列拒绝入队：任务就地判死，不中断剩余工作项
                warn!("任务 {} 入队被拒绝: {}", task.task_uuid, e);
                self.metrics.record_dispatch_failure();
                self.apply_transition(shard_uuid, &task.task_uuid, TaskStatus::Error)
                    .await?;
                Ok(())
            }
        }
    }

    /// 处理远端回报的任务状态流转
    ///
    /// 两步推进：先受保护地给任务行盖章，再把流转折算成分片计数
    /// 增量原子生效。任务已处于终态时整体幂等忽略，分片计数不会
    /// 被重复投递二次累加。
    #[instrument(skip(self), fields(shard_uuid = %shard_uuid, task_uuid = %task_uuid))]
    pub async fn update_task_status(
        &self,
        shard_uuid: &str,
        task_uuid: &str,
        status: TaskStatus,
    ) -> TagEngineResult<()> {
        if status == TaskStatus::Pending {
            return Err(TagEngineError::InvalidTransition {
                from: "*".to_string(),
                to: TaskStatus::Pending.as_str().to_string(),
            });
        }

        self.apply_transition(shard_uuid, task_uuid, status).await
    }

    async fn apply_transition(
        &self,
        shard_uuid: &str,
        task_uuid: &str,
        status: TaskStatus,
    ) -> TagEngineResult<()> {
        let prev = self
            .task_repo
            .transition(shard_uuid, task_uuid, status, Utc::now())
            .await?;

        let Some(prev) = prev else {
            self.metrics.record_duplicate_status_update();
            debug!("任务 {} 的 {:?} 回报被幂等忽略", task_uuid, status);
            return Ok(());
        };

        if let Some(delta) = ShardDelta::for_transition(prev, status) {
            self.shard_repo.apply_delta(shard_uuid, &delta).await?;
        }
        self.metrics.record_status_update();

        debug!("任务 {} 状态 {:?} -> {:?}", task_uuid, prev, status);
        Ok(())
    }

    /// 作业级派发请求的处理入口
    ///
    /// 远端处理器解析出工作项集合后调用：爆炸派发、回写任务总数、
    /// 把作业置为 RUNNING。
    pub async fn split_work(
        &self,
        job_service: &JobService,
        request: &JobRequest,
        work_items: &[WorkItem],
    ) -> TagEngineResult<i64> {
        let total = self
            .explode_and_dispatch(
                &request.tag_creator_account,
                &request.tag_invoker_account,
                &request.job_uuid,
                &request.config_uuid,
                request.config_type,
                work_items,
            )
            .await?;

        job_service
            .record_task_count(&request.job_uuid, total)
            .await?;
        job_service.mark_running(&request.job_uuid).await?;

        Ok(total)
    }
}
