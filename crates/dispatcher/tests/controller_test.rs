#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use tagengine_core::models::{ConfigStatus, ConfigType, RefreshUnit, SchedulingStatus};
    use tagengine_core::traits::ConfigRepository;
    use tagengine_dispatcher::{JobService, ScheduleController};
    use tagengine_infrastructure::MetricsCollector;
    use tagengine_testing_utils::{
        MockConfigRepository, MockJobRepository, MockShardRepository, MockWorkQueue,
        TagConfigBuilder,
    };

    struct Harness {
        config_repo: Arc<MockConfigRepository>,
        job_repo: Arc<MockJobRepository>,
        queue: Arc<MockWorkQueue>,
        controller: ScheduleController,
    }

    fn harness() -> Harness {
        let config_repo = Arc::new(MockConfigRepository::new());
        let job_repo = Arc::new(MockJobRepository::new());
        let shard_repo = Arc::new(MockShardRepository::new());
        let queue = Arc::new(MockWorkQueue::new());
        let metrics = Arc::new(MetricsCollector::new());

        let job_service = Arc::new(JobService::new(
            job_repo.clone(),
            shard_repo,
            queue.clone(),
            "/_split_work".to_string(),
            metrics,
        ));
        let controller = ScheduleController::new(
            config_repo.clone(),
            job_service,
            Duration::from_secs(60),
        );

        Harness {
            config_repo,
            job_repo,
            queue,
            controller,
        }
    }

    /// 到期配置触发作业：版本推进、next_run前移、派发入队
    #[tokio::test]
    async fn test_tick_schedules_due_configs() {
        let h = harness();
        let config = TagConfigBuilder::new()
            .with_config_uuid("cfg-due")
            .with_refresh(6, RefreshUnit::Hours)
            .overdue()
            .build();
        h.config_repo.insert(config);

        let scheduled = h.controller.tick().await.unwrap();
        assert_eq!(scheduled, 1);
        assert_eq!(h.job_repo.count(), 1);
        assert_eq!(h.queue.len(), 1);

        let stored = h.config_repo.get_config("cfg-due").unwrap();
        assert_eq!(stored.version, 2);
        assert!(stored.next_run.unwrap() > Utc::now());
        // 本轮结束后调度状态回到 READY，等待下个周期
        assert_eq!(stored.scheduling_status, Some(SchedulingStatus::Ready));
    }

    #[tokio::test]
    async fn test_tick_skips_configs_that_are_not_due() {
        let h = harness();

        // 未到期
        h.config_repo.insert(
            TagConfigBuilder::new()
                .with_config_uuid("cfg-future")
                .due_at(Utc::now() + chrono::Duration::hours(1))
                .build(),
        );
        // 已灭活
        h.config_repo.insert(
            TagConfigBuilder::new()
                .with_config_uuid("cfg-inactive")
                .overdue()
                .inactive()
                .build(),
        );
        // 按需模式不参与调度
        h.config_repo.insert(
            TagConfigBuilder::new()
                .with_config_uuid("cfg-on-demand")
                .on_demand()
                .build(),
        );
        // 上一轮调度尚未收尾
        h.config_repo.insert(
            TagConfigBuilder::new()
                .with_config_uuid("cfg-pending")
                .overdue()
                .scheduling_pending()
                .build(),
        );

        let scheduled = h.controller.tick().await.unwrap();
        assert_eq!(scheduled, 0);
        assert_eq!(h.job_repo.count(), 0);
        assert!(h.queue.is_empty());
    }

    /// 单条配置失败不拖垮整轮调度
    #[tokio::test]
    async fn test_tick_continues_after_per_config_failure() {
        let h = harness();
        h.config_repo.insert(
            TagConfigBuilder::new()
                .with_config_uuid("cfg-a")
                .overdue()
                .build(),
        );
        h.config_repo.insert(
            TagConfigBuilder::new()
                .with_config_uuid("cfg-b")
                .overdue()
                .build(),
        );
        // 队列整体不可用：两条配置都失败，但tick本身不报错
        h.queue.fail_all(true);

        let scheduled = h.controller.tick().await.unwrap();
        assert_eq!(scheduled, 0);

        // 队列恢复后下一轮才可再次调度（next_run已前移，本例直接验证无惊群）
        h.queue.fail_all(false);
        let scheduled = h.controller.tick().await.unwrap();
        assert_eq!(scheduled, 0);
    }

    /// 同键覆盖：第二次写入恰好灭活一条旧配置，键下只剩一条 ACTIVE
    #[tokio::test]
    async fn test_config_supersede_on_write() {
        let h = harness();

        let first = TagConfigBuilder::new()
            .with_config_uuid("cfg-old")
            .with_template_uuid("tpl-1")
            .with_included_uris("bigquery/project/p/dataset/d/")
            .build();
        let service_account = first.service_account.clone();
        let hash = first.included_uris_hash.clone();
        h.config_repo.write(&first).await.unwrap();

        let second = TagConfigBuilder::new()
            .with_config_uuid("cfg-new")
            .with_template_uuid("tpl-1")
            .with_included_uris("bigquery/project/p/dataset/d/")
            .build();
        h.config_repo.write(&second).await.unwrap();

        assert_eq!(
            h.config_repo.active_count_for_key(
                &service_account,
                "tpl-1",
                &hash,
                ConfigType::StaticAsset
            ),
            1
        );
        assert_eq!(
            h.config_repo.get_config("cfg-old").unwrap().config_status,
            ConfigStatus::Inactive
        );
        assert_eq!(
            h.config_repo.get_config("cfg-new").unwrap().config_status,
            ConfigStatus::Active
        );

        // 不同键互不影响
        let other_key = TagConfigBuilder::new()
            .with_config_uuid("cfg-other")
            .with_template_uuid("tpl-2")
            .with_included_uris("bigquery/project/p/dataset/other/")
            .build();
        h.config_repo.write(&other_key).await.unwrap();
        assert_eq!(
            h.config_repo.get_config("cfg-new").unwrap().config_status,
            ConfigStatus::Active
        );
    }

    /// 归属校验是授权边界：他人读取得到空结果
    #[tokio::test]
    async fn test_config_read_enforces_owner() {
        let h = harness();
        let config = TagConfigBuilder::new()
            .with_config_uuid("cfg-owned")
            .with_service_account("owner@test.iam.gserviceaccount.com")
            .build();
        h.config_repo.write(&config).await.unwrap();

        let owned = h
            .config_repo
            .read(
                "owner@test.iam.gserviceaccount.com",
                "cfg-owned",
                ConfigType::StaticAsset,
            )
            .await
            .unwrap();
        assert!(owned.is_some());

        let foreign = h
            .config_repo
            .read(
                "intruder@test.iam.gserviceaccount.com",
                "cfg-owned",
                ConfigType::StaticAsset,
            )
            .await
            .unwrap();
        assert!(foreign.is_none());
    }
}
