use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use tagengine_core::models::{ConfigType, SchedulingStatus};
use tagengine_core::traits::ConfigRepository;
use tagengine_core::{TagEngineError, TagEngineResult};

use crate::job_service::JobService;

/// 调度控制器
///
/// 周期性扫描到期的自动刷新配置，为每条配置推进版本与下次调度
/// 时间并发起一个新作业。单条配置的失败只记录日志，不影响同一轮
/// 其余配置。
pub struct ScheduleController {
    config_repo: Arc<dyn ConfigRepository>,
    job_service: Arc<JobService>,
    interval: Duration,
}

impl ScheduleController {
    pub fn new(
        config_repo: Arc<dyn ConfigRepository>,
        job_service: Arc<JobService>,
        interval: Duration,
    ) -> Self {
        Self {
            config_repo,
            job_service,
            interval,
        }
    }

    /// 执行一轮调度，返回本轮成功发起的作业数
    #[instrument(skip(self))]
    pub async fn tick(&self) -> TagEngineResult<usize> {
        let now = Utc::now();
        let ready = self.config_repo.read_ready(now).await?;

        if ready.is_empty() {
            return Ok(0);
        }
        info!("本轮发现 {} 条到期配置", ready.len());

        let mut scheduled = 0;
        for (config_uuid, config_type) in ready {
            match self.schedule_config(&config_uuid, config_type).await {
                Ok(job_uuid) => {
                    info!("配置 {} 触发作业 {}", config_uuid, job_uuid);
                    scheduled += 1;
                }
                Err(e) => {
                    error!("配置 {} 调度失败: {}", config_uuid, e);
                }
            }
        }

        Ok(scheduled)
    }

    /// 为单条到期配置发起作业
    ///
    /// 先把调度状态压成 PENDING 占住本轮窗口，推进 next_run 后发起
    /// 作业；无论成败最后都把调度状态放回 READY——next_run 已前移，
    /// 配置要到下个周期才会再次到期。
    async fn schedule_config(
        &self,
        config_uuid: &str,
        config_type: ConfigType,
    ) -> TagEngineResult<String> {
        let service_account = self
            .config_repo
            .read_service_account(config_uuid, config_type)
            .await?
            .ok_or_else(|| TagEngineError::ConfigNotFound {
                config_uuid: config_uuid.to_string(),
            })?;

        self.config_repo
            .update_scheduling_status(config_uuid, config_type, SchedulingStatus::Pending)
            .await?;
        self.config_repo
            .increment_version_next_run(config_uuid, config_type, Utc::now())
            .await?;

        let result = self
            .job_service
            .create_job(
                &service_account,
                &service_account,
                config_uuid,
                config_type,
                None,
            )
            .await;

        if let Err(e) = self
            .config_repo
            .update_scheduling_status(config_uuid, config_type, SchedulingStatus::Ready)
            .await
        {
            warn!("配置 {} 调度状态复位失败: {}", config_uuid, e);
        }

        result
    }

    /// 调度主循环，收到关闭信号后退出
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> TagEngineResult<()> {
        let mut ticker = tokio::time::interval(self.interval);
        info!("调度控制器启动，周期 {:?}", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("调度循环出错: {}", e);
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("调度控制器收到关闭信号");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}
