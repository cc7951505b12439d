#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tagengine_core::ids;
    use tagengine_core::models::{ConfigType, JobRequest, JobStatus, TaskStatus, WorkItem};
    use tagengine_dispatcher::{JobService, TaskDispatcher};
    use tagengine_infrastructure::MetricsCollector;
    use tagengine_testing_utils::{
        MockJobRepository, MockShardRepository, MockTaskRepository, MockWorkQueue,
    };
    use serde_json::json;

    struct Harness {
        shard_repo: Arc<MockShardRepository>,
        task_repo: Arc<MockTaskRepository>,
        queue: Arc<MockWorkQueue>,
        job_service: JobService,
        dispatcher: TaskDispatcher,
    }

    fn harness_with_shard_size(tasks_per_shard: usize) -> Harness {
        let job_repo = Arc::new(MockJobRepository::new());
        let shard_repo = Arc::new(MockShardRepository::new());
        let task_repo = Arc::new(MockTaskRepository::new());
        let queue = Arc::new(MockWorkQueue::new());
        let metrics = Arc::new(MetricsCollector::new());

        let job_service = JobService::new(
            job_repo,
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
            tasks_per_shard,
            metrics,
        );

        Harness {
            shard_repo,
            task_repo,
            queue,
            job_service,
            dispatcher,
        }
    }

    fn harness() -> Harness {
        harness_with_shard_size(1000)
    }

    const CREATOR: &str = "creator@test.iam.gserviceaccount.com";
    const INVOKER: &str = "invoker@test.iam.gserviceaccount.com";
    const JOB: &str = "1f1b4720839c11eca541e1ad551502cb";

    fn uris(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| WorkItem::Uri(format!("bigquery/project/p/dataset/d/table/t{i}")))
            .collect()
    }

    /// 2500个工作项、分片容量1000，应得到1000/1000/500三个分片
    #[tokio::test]
    async fn test_explode_creates_ceil_m_over_s_shards() {
        let h = harness();
        let items = uris(2500);

        let total = h
            .dispatcher
            .explode_and_dispatch(CREATOR, INVOKER, JOB, "cfg1", ConfigType::StaticAsset, &items)
            .await
            .unwrap();

        assert_eq!(total, 2500);
        assert_eq!(h.shard_repo.count(), 3);
        assert_eq!(h.task_repo.count(), 2500);
        assert_eq!(h.queue.len(), 2500);

        let sizes: Vec<i64> = (0..3)
            .map(|index| {
                h.shard_repo
                    .get_shard(&ids::shard_uuid(JOB, index))
                    .unwrap()
                    .task_count
            })
            .collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);
        assert_eq!(sizes.iter().sum::<i64>(), 2500);
    }

    #[tokio::test]
    async fn test_explode_with_no_items_creates_no_shards() {
        let h = harness();
        let total = h
            .dispatcher
            .explode_and_dispatch(CREATOR, INVOKER, JOB, "cfg1", ConfigType::StaticAsset, &[])
            .await
            .unwrap();

        assert_eq!(total, 0);
        assert_eq!(h.shard_repo.count(), 0);
        assert!(h.queue.is_empty());
    }

    /// 分片键内容派生：重复爆炸落在同一批分片上
    #[tokio::test]
    async fn test_shard_ids_are_idempotent_across_explosions() {
        let h = harness_with_shard_size(2);
        let items = uris(3);

        h.dispatcher
            .explode_and_dispatch(CREATOR, INVOKER, JOB, "cfg1", ConfigType::StaticAsset, &items)
            .await
            .unwrap();
        assert_eq!(h.shard_repo.count(), 2);

        h.dispatcher
            .explode_and_dispatch(CREATOR, INVOKER, JOB, "cfg1", ConfigType::StaticAsset, &items)
            .await
            .unwrap();
        // 分片不增殖，任务因混入时间戳而各自独立
        assert_eq!(h.shard_repo.count(), 2);
        assert_eq!(h.task_repo.count(), 6);
    }

    /// 入队被拒绝的任务直接判死并计入分片失败，其余工作项继续派发
    #[tokio::test]
    async fn test_rejected_enqueue_marks_task_error_and_continues() {
        let h = harness();
        h.queue.fail_matching("table/t1");

        let items = uris(3);
        let total = h
            .dispatcher
            .explode_and_dispatch(CREATOR, INVOKER, JOB, "cfg1", ConfigType::StaticAsset, &items)
            .await
            .unwrap();

        // 三个任务都落了库，其中一个入队失败
        assert_eq!(total, 3);
        assert_eq!(h.task_repo.count(), 3);
        assert_eq!(h.queue.len(), 2);

        let failed: Vec<_> = h
            .task_repo
            .all_tasks()
            .into_iter()
            .filter(|t| t.status == TaskStatus::Error)
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].end_time.is_some());
        assert!(failed[0].start_time.is_none());

        let shard = h.shard_repo.get_shard(&ids::shard_uuid(JOB, 0)).unwrap();
        assert_eq!(shard.tasks_failed, 1);
        assert_eq!(shard.tasks_running, 0);
        assert_eq!(shard.tasks_success, 0);
    }

    #[tokio::test]
    async fn test_update_task_status_walks_the_state_machine() {
        let h = harness();
        h.dispatcher
            .explode_and_dispatch(CREATOR, INVOKER, JOB, "cfg1", ConfigType::StaticAsset, &uris(1))
            .await
            .unwrap();

        let tasks = h.task_repo.all_tasks();
        let task = &tasks[0];
        let shard_uuid = task.shard_uuid.clone();
        let task_uuid = task.task_uuid.clone();

        h.dispatcher
            .update_task_status(&shard_uuid, &task_uuid, TaskStatus::Running)
            .await
            .unwrap();
        let shard = h.shard_repo.get_shard(&shard_uuid).unwrap();
        assert_eq!(shard.tasks_running, 1);

        let stored = h.task_repo.all_tasks().pop().unwrap();
        assert_eq!(stored.status, TaskStatus::Running);
        assert!(stored.start_time.is_some());
        assert!(stored.end_time.is_none());

        h.dispatcher
            .update_task_status(&shard_uuid, &task_uuid, TaskStatus::Success)
            .await
            .unwrap();
        let shard = h.shard_repo.get_shard(&shard_uuid).unwrap();
        assert_eq!(shard.tasks_running, 0);
        assert_eq!(shard.tasks_success, 1);
        assert_eq!(shard.tasks_ran, 1);

        let stored = h.task_repo.all_tasks().pop().unwrap();
        assert_eq!(stored.status, TaskStatus::Success);
        assert!(stored.end_time.is_some());
    }

    /// 重复投递的终态回报被幂等忽略，分片计数不被二次累加
    #[tokio::test]
    async fn test_duplicate_terminal_update_is_ignored() {
        let h = harness();
        h.dispatcher
            .explode_and_dispatch(CREATOR, INVOKER, JOB, "cfg1", ConfigType::StaticAsset, &uris(1))
            .await
            .unwrap();

        let tasks = h.task_repo.all_tasks();
        let task = &tasks[0];
        let (shard_uuid, task_uuid) = (task.shard_uuid.clone(), task.task_uuid.clone());

        h.dispatcher
            .update_task_status(&shard_uuid, &task_uuid, TaskStatus::Running)
            .await
            .unwrap();
        h.dispatcher
            .update_task_status(&shard_uuid, &task_uuid, TaskStatus::Success)
            .await
            .unwrap();

        // 同一终态重复投递，以及终态后的反向流转，都不得再动计数
        h.dispatcher
            .update_task_status(&shard_uuid, &task_uuid, TaskStatus::Success)
            .await
            .unwrap();
        h.dispatcher
            .update_task_status(&shard_uuid, &task_uuid, TaskStatus::Error)
            .await
            .unwrap();
        h.dispatcher
            .update_task_status(&shard_uuid, &task_uuid, TaskStatus::Running)
            .await
            .unwrap();

        let shard = h.shard_repo.get_shard(&shard_uuid).unwrap();
        assert_eq!(shard.tasks_success, 1);
        assert_eq!(shard.tasks_failed, 0);
        assert_eq!(shard.tasks_running, 0);
        assert_eq!(shard.tasks_ran, 1);

        let stored = h.task_repo.all_tasks().pop().unwrap();
        assert_eq!(stored.status, TaskStatus::Success);
    }

    /// 终态回报乱序先到时直接生效，不产生负的 running 计数
    #[tokio::test]
    async fn test_out_of_order_terminal_before_running() {
        let h = harness();
        h.dispatcher
            .explode_and_dispatch(CREATOR, INVOKER, JOB, "cfg1", ConfigType::StaticAsset, &uris(1))
            .await
            .unwrap();

        let tasks = h.task_repo.all_tasks();
        let task = &tasks[0];
        let (shard_uuid, task_uuid) = (task.shard_uuid.clone(), task.task_uuid.clone());

        h.dispatcher
            .update_task_status(&shard_uuid, &task_uuid, TaskStatus::Success)
            .await
            .unwrap();
        // 迟到的 RUNNING 回报被忽略
        h.dispatcher
            .update_task_status(&shard_uuid, &task_uuid, TaskStatus::Running)
            .await
            .unwrap();

        let shard = h.shard_repo.get_shard(&shard_uuid).unwrap();
        assert_eq!(shard.tasks_success, 1);
        assert_eq!(shard.tasks_running, 0);
    }

    #[tokio::test]
    async fn test_update_to_pending_is_rejected() {
        let h = harness();
        h.dispatcher
            .explode_and_dispatch(CREATOR, INVOKER, JOB, "cfg1", ConfigType::StaticAsset, &uris(1))
            .await
            .unwrap();

        let tasks = h.task_repo.all_tasks();
        let task = &tasks[0];
        let result = h
            .dispatcher
            .update_task_status(&task.shard_uuid, &task.task_uuid, TaskStatus::Pending)
            .await;
        assert!(result.is_err());
    }

    /// 结构化抽取记录与裸URI混合派发
    #[tokio::test]
    async fn test_heterogeneous_payload_shapes() {
        let h = harness();
        let items = vec![
            WorkItem::Uri("bigquery/project/p/dataset/d/table/t".to_string()),
            WorkItem::Extract(json!({"dataset": "d", "table": "t", "column": "c"})),
        ];

        h.dispatcher
            .explode_and_dispatch(CREATOR, INVOKER, JOB, "cfg1", ConfigType::DynamicColumn, &items)
            .await
            .unwrap();

        let requests = h.queue.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].payload["payload"],
            json!("bigquery/project/p/dataset/d/table/t")
        );
        assert_eq!(requests[1].payload["payload"]["column"], json!("c"));

        // 两种形态派生出互不相同的任务去重键
        let tasks = h.task_repo.all_tasks();
        assert_ne!(tasks[0].task_id, tasks[1].task_id);
    }

    /// 作业级请求处理入口：爆炸、回写任务总数、置为 RUNNING
    #[tokio::test]
    async fn test_split_work_records_count_and_marks_running() {
        let h = harness_with_shard_size(2);
        let job_uuid = h
            .job_service
            .create_job(CREATOR, INVOKER, "cfg1", ConfigType::StaticAsset, None)
            .await
            .unwrap();

        let request = JobRequest {
            job_uuid: job_uuid.clone(),
            config_uuid: "cfg1".to_string(),
            config_type: ConfigType::StaticAsset,
            tag_creator_account: CREATOR.to_string(),
            tag_invoker_account: INVOKER.to_string(),
        };

        let total = h
            .dispatcher
            .split_work(&h.job_service, &request, &uris(5))
            .await
            .unwrap();
        assert_eq!(total, 5);

        let job = h.job_service.get_status(&job_uuid).await.unwrap();
        assert_eq!(job.job_status, JobStatus::Running);
        assert_eq!(job.task_count, 5);
        assert_eq!(h.shard_repo.count(), 3);
    }
}
