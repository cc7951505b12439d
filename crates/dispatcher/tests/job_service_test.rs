#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use tagengine_core::models::{ConfigType, JobStatus, ShardDelta, TaskStatus, WorkItem};
    use tagengine_core::traits::ShardRepository;
    use tagengine_dispatcher::{JobService, TaskDispatcher};
    use tagengine_infrastructure::MetricsCollector;
    use tagengine_testing_utils::{
        MockJobRepository, MockShardRepository, MockTaskRepository, MockWorkQueue,
    };

    struct Harness {
        job_repo: Arc<MockJobRepository>,
        shard_repo: Arc<MockShardRepository>,
        task_repo: Arc<MockTaskRepository>,
        queue: Arc<MockWorkQueue>,
        job_service: JobService,
        dispatcher: TaskDispatcher,
    }

    fn harness() -> Harness {
        let job_repo = Arc::new(MockJobRepository::new());
        let shard_repo = Arc::new(MockShardRepository::new());
        let task_repo = Arc::new(MockTaskRepository::new());
        let queue = Arc::new(MockWorkQueue::new());
        let metrics = Arc::new(MetricsCollector::new());

        let job_service = JobService::new(
            job_repo.clone(),
            shard_repo.clone(),
            queue.clone(),
            "/_split_work".to_string(),
            metrics.clone(),
        );
        let dispatcher = TaskDispatcher::new(
            task_repo.clone(),
            shard_repo.clone(),
            queue.clone(),
            "/_run_task".to_string(),
            1000,
            metrics,
        );

        Harness {
            job_repo,
            shard_repo,
            task_repo,
            queue,
            job_service,
            dispatcher,
        }
    }

    const CREATOR: &str = "creator@test.iam.gserviceaccount.com";
    const INVOKER: &str = "invoker@test.iam.gserviceaccount.com";

    #[tokio::test]
    async fn test_create_job_persists_pending_record_and_dispatches() {
        let h = harness();

        let job_uuid = h
            .job_service
            .create_job(CREATOR, INVOKER, "cfg1", ConfigType::StaticAsset, None)
            .await
            .unwrap();

        let job = h.job_service.get_status(&job_uuid).await.unwrap();
        assert_eq!(job.job_status, JobStatus::Pending);
        assert_eq!(job.task_count, 0);
        assert_eq!(job.tasks_ran, 0);
        assert!(job.completion_time.is_none());

        // 一条作业级派发请求已入队
        let requests = h.queue.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].task_id, job_uuid);
        assert_eq!(requests[0].target_uri, "/_split_work");
        assert_eq!(requests[0].payload["config_uuid"], json!("cfg1"));

        assert!(h.job_repo.metadata_for(&job_uuid).is_none());
    }

    #[tokio::test]
    async fn test_create_job_with_metadata_writes_sibling_record() {
        let h = harness();

        let metadata = json!({"source": "csv-import", "row_count": 42});
        let job_uuid = h
            .job_service
            .create_job(
                CREATOR,
                INVOKER,
                "cfg1",
                ConfigType::Import,
                Some(metadata.clone()),
            )
            .await
            .unwrap();

        let record = h.job_repo.metadata_for(&job_uuid).unwrap();
        assert_eq!(record.metadata, metadata);
        assert_eq!(record.config_uuid, "cfg1");
    }

    #[tokio::test]
    async fn test_create_job_propagates_queue_rejection() {
        let h = harness();
        h.queue.fail_all(true);

        let result = h
            .job_service
            .create_job(CREATOR, INVOKER, "cfg1", ConfigType::StaticAsset, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_completion_with_zero_task_count_never_terminal() {
        let h = harness();
        let job_uuid = h
            .job_service
            .create_job(CREATOR, INVOKER, "cfg1", ConfigType::StaticAsset, None)
            .await
            .unwrap();

        // 任务总数尚未记录，重复计算也不得收敛到终态
        for _ in 0..3 {
            let completion = h.job_service.compute_completion(&job_uuid).await.unwrap();
            assert!(!completion.job_status.is_terminal());
            assert_eq!(completion.pct_complete, 0.0);
        }

        let job = h.job_service.get_status(&job_uuid).await.unwrap();
        assert_eq!(job.job_status, JobStatus::Pending);
        assert!(job.completion_time.is_none());
    }

    /// 爆炸两项、回报部分完成，验证进行中的百分比与计数不变量
    #[tokio::test]
    async fn test_completion_mid_flight_reports_percentage() {
        let h = harness();
        let job_uuid = h
            .job_service
            .create_job(CREATOR, INVOKER, "cfg1", ConfigType::DynamicTable, None)
            .await
            .unwrap();

        let items: Vec<WorkItem> = (0..3)
            .map(|i| WorkItem::Uri(format!("bigquery/project/p/dataset/d/table/t{i}")))
            .collect();
        let total = h
            .dispatcher
            .explode_and_dispatch(
                CREATOR,
                INVOKER,
                &job_uuid,
                "cfg1",
                ConfigType::DynamicTable,
                &items,
            )
            .await
            .unwrap();
        h.job_service
            .record_task_count(&job_uuid, total)
            .await
            .unwrap();
        h.job_service.mark_running(&job_uuid).await.unwrap();

        let tasks = h.task_repo.all_tasks();
        let (shard, task) = (&tasks[0].shard_uuid, &tasks[0].task_uuid);
        h.dispatcher
            .update_task_status(shard, task, TaskStatus::Running)
            .await
            .unwrap();
        h.dispatcher
            .update_task_status(shard, task, TaskStatus::Success)
            .await
            .unwrap();

        let completion = h.job_service.compute_completion(&job_uuid).await.unwrap();
        assert_eq!(completion.job_status, JobStatus::Running);
        assert_eq!(completion.tasks_success, 1);
        assert_eq!(completion.tasks_failed, 0);
        assert_eq!(completion.pct_complete, 33.33);

        let job = h.job_service.get_status(&job_uuid).await.unwrap();
        assert_eq!(job.tasks_ran, job.tasks_success + job.tasks_failed);
    }

    /// 三个任务 SUCCESS, SUCCESS, ERROR，完成后作业收敛到 ERROR
    #[tokio::test]
    async fn test_completion_with_failures_converges_to_error() {
        let h = harness();
        let job_uuid = h
            .job_service
            .create_job(CREATOR, INVOKER, "cfg1", ConfigType::StaticAsset, None)
            .await
            .unwrap();

        let items: Vec<WorkItem> = (0..3)
            .map(|i| WorkItem::Uri(format!("gs://bucket/object{i}")))
            .collect();
        let total = h
            .dispatcher
            .explode_and_dispatch(
                CREATOR,
                INVOKER,
                &job_uuid,
                "cfg1",
                ConfigType::StaticAsset,
                &items,
            )
            .await
            .unwrap();
        h.job_service
            .record_task_count(&job_uuid, total)
            .await
            .unwrap();

        let tasks = h.task_repo.all_tasks();
        for (task, outcome) in tasks.iter().zip([
            TaskStatus::Success,
            TaskStatus::Success,
            TaskStatus::Error,
        ]) {
            h.dispatcher
                .update_task_status(&task.shard_uuid, &task.task_uuid, TaskStatus::Running)
                .await
                .unwrap();
            h.dispatcher
                .update_task_status(&task.shard_uuid, &task.task_uuid, outcome)
                .await
                .unwrap();
        }

        let completion = h.job_service.compute_completion(&job_uuid).await.unwrap();
        assert_eq!(completion.tasks_success, 2);
        assert_eq!(completion.tasks_failed, 1);
        assert_eq!(completion.pct_complete, 100.0);
        assert_eq!(completion.job_status, JobStatus::Error);

        let job = h.job_service.get_status(&job_uuid).await.unwrap();
        assert_eq!(job.job_status, JobStatus::Error);
        assert_eq!(job.tasks_ran, 3);
        assert!(job.completion_time.is_some());
    }

    /// 全部成功时收敛到 SUCCESS，且终态流转只发生一次
    #[tokio::test]
    async fn test_completion_time_is_stamped_exactly_once() {
        let h = harness();
        let job_uuid = h
            .job_service
            .create_job(CREATOR, INVOKER, "cfg1", ConfigType::StaticAsset, None)
            .await
            .unwrap();

        // 两个已完成的分片，绕过队列直接铺底汇总数据
        let shard = tagengine_core::models::Shard::new(
            job_uuid.clone(),
            tagengine_core::ids::shard_uuid(&job_uuid, 0),
        );
        h.shard_repo.create(&shard).await.unwrap();
        h.shard_repo
            .set_task_count(&shard.shard_uuid, 2)
            .await
            .unwrap();
        h.shard_repo
            .apply_delta(
                &shard.shard_uuid,
                &ShardDelta {
                    ran: 2,
                    running: 0,
                    success: 2,
                    failed: 0,
                },
            )
            .await
            .unwrap();
        h.job_service.record_task_count(&job_uuid, 2).await.unwrap();

        let first = h.job_service.compute_completion(&job_uuid).await.unwrap();
        assert_eq!(first.job_status, JobStatus::Success);
        let stamped = h
            .job_service
            .get_status(&job_uuid)
            .await
            .unwrap()
            .completion_time
            .unwrap();

        // 再算两次，终态与完成时间都保持不变
        for _ in 0..2 {
            let again = h.job_service.compute_completion(&job_uuid).await.unwrap();
            assert_eq!(again.job_status, JobStatus::Success);
            assert_eq!(again.pct_complete, 100.0);
        }
        let job = h.job_service.get_status(&job_uuid).await.unwrap();
        assert_eq!(job.completion_time.unwrap(), stamped);
    }

    #[tokio::test]
    async fn test_config_for_job_round_trip() {
        let h = harness();
        let job_uuid = h
            .job_service
            .create_job(CREATOR, INVOKER, "cfg9", ConfigType::Export, None)
            .await
            .unwrap();

        let (config_uuid, config_type) = h.job_service.config_for_job(&job_uuid).await.unwrap();
        assert_eq!(config_uuid, "cfg9");
        assert_eq!(config_type, ConfigType::Export);

        let jobs = h.job_service.jobs_for_config("cfg9").await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_uuid, job_uuid);
    }

    #[tokio::test]
    async fn test_get_status_unknown_job_is_an_error() {
        let h = harness();
        let result = h.job_service.get_status("no-such-job").await;
        assert!(result.is_err());
    }
}
