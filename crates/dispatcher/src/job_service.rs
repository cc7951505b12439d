use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};

use tagengine_core::models::{
    ConfigType, Job, JobCompletion, JobMetadata, JobRequest, JobStatus, QueueRequest,
};
use tagengine_core::traits::{JobRepository, ShardRepository, WorkQueue};
use tagengine_core::{TagEngineError, TagEngineResult};
use tagengine_infrastructure::MetricsCollector;

/// 作业存储服务
///
/// 管理作业从创建到终态收敛的全生命周期。作业级计数不由本服务直接
/// 累加，而是在每次完成度计算时从分片汇总读出再回写，重复计算收敛
/// 到同一结果。
pub struct JobService {
    job_repo: Arc<dyn JobRepository>,
    shard_repo: Arc<dyn ShardRepository>,
    work_queue: Arc<dyn WorkQueue>,
    /// 作业爆炸回调端点，随入队请求下发
    job_handler_uri: String,
    metrics: Arc<MetricsCollector>,
}

impl JobService {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        shard_repo: Arc<dyn ShardRepository>,
        work_queue: Arc<dyn WorkQueue>,
        job_handler_uri: String,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            job_repo,
            shard_repo,
            work_queue,
            job_handler_uri,
            metrics,
        }
    }

    /// 创建作业并触发初始派发
    ///
    /// 写入 PENDING 作业记录与可选的元数据记录，再向工作队列提交一条
    /// 作业级请求，由远端处理器回调执行任务爆炸。入队失败向调用方
    /// 透传，此时作业记录已存在、计数为零，等同爆炸尚未开始。
    #[instrument(skip(self, metadata), fields(config_uuid = %config_uuid))]
    pub async fn create_job(
        &self,
        tag_creator_account: &str,
        tag_invoker_account: &str,
        config_uuid: &str,
        config_type: ConfigType,
        metadata: Option<serde_json::Value>,
    ) -> TagEngineResult<String> {
        let job = Job::new(config_uuid.to_string(), config_type);
        self.job_repo.create(&job).await?;

        if let Some(metadata) = metadata {
            self.job_repo
                .create_metadata(&JobMetadata {
                    job_uuid: job.job_uuid.clone(),
                    config_uuid: config_uuid.to_string(),
                    config_type,
                    metadata,
                    creation_time: Utc::now(),
                })
                .await?;
        }

        let request = JobRequest {
            job_uuid: job.job_uuid.clone(),
            config_uuid: config_uuid.to_string(),
            config_type,
            tag_creator_account: tag_creator_account.to_string(),
            tag_invoker_account: tag_invoker_account.to_string(),
        };
        self.work_queue
            .enqueue(&QueueRequest::for_job(
                &request,
                job.job_uuid.clone(),
                self.job_handler_uri.clone(),
            ))
            .await?;

        self.metrics.record_job_created();
        info!("作业 {} 已创建并提交初始派发", job.job_uuid);

        Ok(job.job_uuid)
    }

    /// 记录作业的预期任务总数，爆炸完成后恰好调用一次
    pub async fn record_task_count(&self, job_uuid: &str, task_count: i64) -> TagEngineResult<()> {
        self.job_repo.record_task_count(job_uuid, task_count).await
    }

    /// 把作业置为 RUNNING，可重复调用
    pub async fn mark_running(&self, job_uuid: &str) -> TagEngineResult<()> {
        self.job_repo.set_status(job_uuid, JobStatus::Running).await
    }

    /// 计算作业完成度并推进作业状态
    ///
    /// 从分片汇总读出成功/失败合计，按预期任务总数分类：
    /// - `task_count = 0` 视作爆炸未完成，不落终态、不回写计数；
    /// - 进行中则回写计数并保持 RUNNING，完成百分比保留两位小数；
    /// - `tasks_ran >= task_count` 进入终态，有任何失败即 ERROR，
    ///   `completion_time` 只由首次终态流转盖章，之后重复调用不再改写。
    #[instrument(skip(self))]
    pub async fn compute_completion(&self, job_uuid: &str) -> TagEngineResult<JobCompletion> {
        let start = std::time::Instant::now();

        let totals = self.shard_repo.totals_for_job(job_uuid).await?;
        let tasks_ran = totals.tasks_ran();
        let job = self
            .job_repo
            .get(job_uuid)
            .await?
            .ok_or_else(|| TagEngineError::JobNotFound {
                job_uuid: job_uuid.to_string(),
            })?;

        let completion = if job.task_count == 0 {
            // 任务总数未知，完成度不可信
            debug!("作业 {} 尚未记录任务总数，跳过完成度收敛", job_uuid);
            JobCompletion {
                tasks_success: totals.tasks_success,
                tasks_failed: totals.tasks_failed,
                pct_complete: 0.0,
                job_status: job.job_status,
            }
        } else if tasks_ran < job.task_count {
            self.job_repo
                .update_progress(job_uuid, tasks_ran, totals.tasks_success, totals.tasks_failed)
                .await?;

            let pct_complete = round2(tasks_ran as f64 / job.task_count as f64 * 100.0);
            debug!(
                "作业 {} 进行中: {}/{} ({:.2}%)",
                job_uuid, tasks_ran, job.task_count, pct_complete
            );

            JobCompletion {
                tasks_success: totals.tasks_success,
                tasks_failed: totals.tasks_failed,
                pct_complete,
                job_status: JobStatus::Running,
            }
        } else {
            let status = if totals.tasks_failed > 0 {
                JobStatus::Error
            } else {
                JobStatus::Success
            };

            let transitioned = self
                .job_repo
                .finalize(
                    job_uuid,
                    status,
                    tasks_ran,
                    totals.tasks_success,
                    totals.tasks_failed,
                    Utc::now(),
                )
                .await?;

            if transitioned {
                info!(
                    "作业 {} 收敛到终态 {:?}: 成功 {}, 失败 {}",
                    job_uuid, status, totals.tasks_success, totals.tasks_failed
                );
            } else {
                debug!("作业 {} 已处于终态，本次计算不改写记录", job_uuid);
            }

            JobCompletion {
                tasks_success: totals.tasks_success,
                tasks_failed: totals.tasks_failed,
                pct_complete: 100.0,
                job_status: status,
            }
        };

        self.metrics
            .record_completion_duration(start.elapsed().as_secs_f64());
        Ok(completion)
    }

    /// 读取作业记录
    pub async fn get_status(&self, job_uuid: &str) -> TagEngineResult<Job> {
        self.job_repo
            .get(job_uuid)
            .await?
            .ok_or_else(|| TagEngineError::JobNotFound {
                job_uuid: job_uuid.to_string(),
            })
    }

    /// 覆盖写作业状态
    pub async fn set_status(&self, job_uuid: &str, status: JobStatus) -> TagEngineResult<()> {
        self.job_repo.set_status(job_uuid, status).await
    }

    /// 某配置名下的作业列表
    pub async fn jobs_for_config(&self, config_uuid: &str) -> TagEngineResult<Vec<Job>> {
        self.job_repo.list_by_config(config_uuid).await
    }

    /// 由作业反查其配置
    pub async fn config_for_job(&self, job_uuid: &str) -> TagEngineResult<(String, ConfigType)> {
        let job = self.get_status(job_uuid).await?;
        Ok((job.config_uuid, job.config_type))
    }
}

/// 保留两位小数
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
