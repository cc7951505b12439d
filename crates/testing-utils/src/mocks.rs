//! Mock implementations for all repository and queue traits
//!
//! These mirror the contracts the Postgres implementations honor, including
//! the guarded task transitions, idempotent shard creation, relative-delta
//! counter updates, and conditional job finalization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tagengine_core::models::{
    ConfigStatus, ConfigType, Job, JobMetadata, JobStatus, QueueRequest, RefreshMode,
    SchedulingStatus, Shard, ShardDelta, ShardTotals, TagConfig, Task, TaskStatus,
};
use tagengine_core::traits::{
    ConfigRepository, JobRepository, ShardRepository, TaskRepository, WorkQueue,
};
use tagengine_core::{TagEngineError, TagEngineResult};

/// Mock implementation of JobRepository
#[derive(Clone, Default)]
pub struct MockJobRepository {
    jobs: Arc<Mutex<HashMap<String, Job>>>,
    metadata: Arc<Mutex<HashMap<String, JobMetadata>>>,
}

impl MockJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn metadata_for(&self, job_uuid: &str) -> Option<JobMetadata> {
        self.metadata.lock().unwrap().get(job_uuid).cloned()
    }
}

#[async_trait]
impl JobRepository for MockJobRepository {
    async fn create(&self, job: &Job) -> TagEngineResult<()> {
        self.jobs
            .lock()
            .unwrap()
            .insert(job.job_uuid.clone(), job.clone());
        Ok(())
    }

    async fn create_metadata(&self, metadata: &JobMetadata) -> TagEngineResult<()> {
        self.metadata
            .lock()
            .unwrap()
            .insert(metadata.job_uuid.clone(), metadata.clone());
        Ok(())
    }

    async fn get(&self, job_uuid: &str) -> TagEngineResult<Option<Job>> {
        Ok(self.jobs.lock().unwrap().get(job_uuid).cloned())
    }

    async fn set_status(&self, job_uuid: &str, status: JobStatus) -> TagEngineResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(job_uuid)
            .ok_or_else(|| TagEngineError::JobNotFound {
                job_uuid: job_uuid.to_string(),
            })?;
        job.job_status = status;
        Ok(())
    }

    async fn record_task_count(&self, job_uuid: &str, task_count: i64) -> TagEngineResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(job_uuid)
            .ok_or_else(|| TagEngineError::JobNotFound {
                job_uuid: job_uuid.to_string(),
            })?;
        job.task_count = task_count;
        Ok(())
    }

    async fn update_progress(
        &self,
        job_uuid: &str,
        tasks_ran: i64,
        tasks_success: i64,
        tasks_failed: i64,
    ) -> TagEngineResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(job_uuid) {
            // Terminal jobs are immutable, same as the conditional SQL update
            if !job.job_status.is_terminal() {
                job.job_status = JobStatus::Running;
                job.tasks_ran = tasks_ran;
                job.tasks_success = tasks_success;
                job.tasks_failed = tasks_failed;
            }
        }
        Ok(())
    }

    async fn finalize(
        &self,
        job_uuid: &str,
        status: JobStatus,
        tasks_ran: i64,
        tasks_success: i64,
        tasks_failed: i64,
        completion_time: DateTime<Utc>,
    ) -> TagEngineResult<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs.get_mut(job_uuid) else {
            return Ok(false);
        };
        if job.job_status.is_terminal() {
            return Ok(false);
        }
        job.job_status = status;
        job.tasks_ran = tasks_ran;
        job.tasks_success = tasks_success;
        job.tasks_failed = tasks_failed;
        job.completion_time = Some(completion_time);
        Ok(true)
    }

    async fn list_by_config(&self, config_uuid: &str) -> TagEngineResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|job| job.config_uuid == config_uuid)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.completion_time.cmp(&a.completion_time));
        Ok(jobs)
    }
}

/// Mock implementation of ShardRepository
#[derive(Clone, Default)]
pub struct MockShardRepository {
    shards: Arc<Mutex<HashMap<String, Shard>>>,
}

impl MockShardRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.shards.lock().unwrap().len()
    }

    pub fn get_shard(&self, shard_uuid: &str) -> Option<Shard> {
        self.shards.lock().unwrap().get(shard_uuid).cloned()
    }
}

#[async_trait]
impl ShardRepository for MockShardRepository {
    async fn create(&self, shard: &Shard) -> TagEngineResult<()> {
        // Idempotent: content-derived key, re-creation is a no-op
        self.shards
            .lock()
            .unwrap()
            .entry(shard.shard_uuid.clone())
            .or_insert_with(|| shard.clone());
        Ok(())
    }

    async fn set_task_count(&self, shard_uuid: &str, task_count: i64) -> TagEngineResult<()> {
        let mut shards = self.shards.lock().unwrap();
        let shard = shards
            .get_mut(shard_uuid)
            .ok_or_else(|| TagEngineError::ShardNotFound {
                shard_uuid: shard_uuid.to_string(),
            })?;
        shard.task_count = task_count;
        Ok(())
    }

    async fn apply_delta(&self, shard_uuid: &str, delta: &ShardDelta) -> TagEngineResult<()> {
        let mut shards = self.shards.lock().unwrap();
        let shard = shards
            .get_mut(shard_uuid)
            .ok_or_else(|| TagEngineError::ShardNotFound {
                shard_uuid: shard_uuid.to_string(),
            })?;
        shard.tasks_ran += delta.ran;
        shard.tasks_running += delta.running;
        shard.tasks_success += delta.success;
        shard.tasks_failed += delta.failed;
        Ok(())
    }

    async fn get(&self, shard_uuid: &str) -> TagEngineResult<Option<Shard>> {
        Ok(self.shards.lock().unwrap().get(shard_uuid).cloned())
    }

    async fn totals_for_job(&self, job_uuid: &str) -> TagEngineResult<ShardTotals> {
        let shards = self.shards.lock().unwrap();
        let mut totals = ShardTotals::default();
        for shard in shards.values().filter(|s| s.job_uuid == job_uuid) {
            totals.tasks_success += shard.tasks_success;
            totals.tasks_failed += shard.tasks_failed;
        }
        Ok(totals)
    }

    async fn list_by_job(&self, job_uuid: &str) -> TagEngineResult<Vec<Shard>> {
        let mut shards: Vec<Shard> = self
            .shards
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.job_uuid == job_uuid)
            .cloned()
            .collect();
        shards.sort_by(|a, b| a.creation_time.cmp(&b.creation_time));
        Ok(shards)
    }
}

/// Mock implementation of TaskRepository
#[derive(Clone, Default)]
pub struct MockTaskRepository {
    tasks: Arc<Mutex<HashMap<String, Task>>>,
}

impl MockTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn all_tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl TaskRepository for MockTaskRepository {
    async fn create(&self, task: &Task) -> TagEngineResult<()> {
        self.tasks
            .lock()
            .unwrap()
            .insert(task.task_uuid.clone(), task.clone());
        Ok(())
    }

    async fn transition(
        &self,
        shard_uuid: &str,
        task_uuid: &str,
        status: TaskStatus,
        at: DateTime<Utc>,
    ) -> TagEngineResult<Option<TaskStatus>> {
        let mut tasks = self.tasks.lock().unwrap();
        let Some(task) = tasks.get_mut(task_uuid) else {
            return Ok(None);
        };
        if task.shard_uuid != shard_uuid {
            return Ok(None);
        }

        let prev = task.status;
        let accepted = match status {
            TaskStatus::Running => prev == TaskStatus::Pending,
            TaskStatus::Success | TaskStatus::Error => !prev.is_terminal(),
            TaskStatus::Pending => {
                return Err(TagEngineError::InvalidTransition {
                    from: prev.as_str().to_string(),
                    to: status.as_str().to_string(),
                })
            }
        };
        if !accepted || prev == status {
            return Ok(None);
        }

        task.status = status;
        match status {
            TaskStatus::Running => task.start_time = Some(at),
            TaskStatus::Success | TaskStatus::Error => task.end_time = Some(at),
            TaskStatus::Pending => unreachable!(),
        }
        Ok(Some(prev))
    }

    async fn get(&self, task_uuid: &str) -> TagEngineResult<Option<Task>> {
        Ok(self.tasks.lock().unwrap().get(task_uuid).cloned())
    }

    async fn list_by_shard(&self, shard_uuid: &str) -> TagEngineResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.shard_uuid == shard_uuid)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.creation_time.cmp(&b.creation_time));
        Ok(tasks)
    }
}

/// Mock implementation of ConfigRepository
#[derive(Clone, Default)]
pub struct MockConfigRepository {
    configs: Arc<Mutex<HashMap<String, TagConfig>>>,
}

impl MockConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, config: TagConfig) {
        self.configs
            .lock()
            .unwrap()
            .insert(config.config_uuid.clone(), config);
    }

    pub fn get_config(&self, config_uuid: &str) -> Option<TagConfig> {
        self.configs.lock().unwrap().get(config_uuid).cloned()
    }

    pub fn active_count_for_key(
        &self,
        service_account: &str,
        template_uuid: &str,
        included_uris_hash: &str,
        config_type: ConfigType,
    ) -> usize {
        self.configs
            .lock()
            .unwrap()
            .values()
            .filter(|c| {
                c.service_account == service_account
                    && c.template_uuid == template_uuid
                    && c.included_uris_hash == included_uris_hash
                    && c.config_type == config_type
                    && c.config_status == ConfigStatus::Active
            })
            .count()
    }
}

#[async_trait]
impl ConfigRepository for MockConfigRepository {
    async fn write(&self, config: &TagConfig) -> TagEngineResult<String> {
        let mut configs = self.configs.lock().unwrap();

        // Supersede-on-write: deactivate every active config sharing the key
        for existing in configs.values_mut() {
            if existing.service_account == config.service_account
                && existing.template_uuid == config.template_uuid
                && existing.included_uris_hash == config.included_uris_hash
                && existing.config_type == config.config_type
                && existing.config_status != ConfigStatus::Inactive
            {
                existing.config_status = ConfigStatus::Inactive;
            }
        }

        let mut stored = config.clone();
        match stored.refresh_mode {
            RefreshMode::Auto => {
                stored.refresh_frequency =
                    TagConfig::normalize_refresh_frequency(stored.refresh_frequency);
                if stored.scheduling_status.is_none() {
                    stored.scheduling_status = Some(SchedulingStatus::Ready);
                }
                if stored.next_run.is_none() {
                    stored.next_run = Some(TagConfig::compute_next_run(
                        Utc::now(),
                        stored.refresh_frequency,
                        stored.refresh_unit,
                    ));
                }
            }
            RefreshMode::OnDemand => {
                stored.refresh_frequency = 0;
                stored.scheduling_status = None;
                stored.next_run = None;
            }
        }

        configs.insert(stored.config_uuid.clone(), stored.clone());
        Ok(stored.config_uuid)
    }

    async fn read(
        &self,
        service_account: &str,
        config_uuid: &str,
        config_type: ConfigType,
    ) -> TagEngineResult<Option<TagConfig>> {
        let configs = self.configs.lock().unwrap();
        Ok(configs
            .get(config_uuid)
            .filter(|c| c.config_type == config_type && c.service_account == service_account)
            .cloned())
    }

    async fn read_ready(
        &self,
        now: DateTime<Utc>,
    ) -> TagEngineResult<Vec<(String, ConfigType)>> {
        let configs = self.configs.lock().unwrap();
        Ok(configs
            .values()
            .filter(|c| {
                c.refresh_mode == RefreshMode::Auto
                    && c.scheduling_status == Some(SchedulingStatus::Ready)
                    && c.config_status == ConfigStatus::Active
                    && c.next_run.is_some_and(|next_run| next_run <= now)
            })
            .map(|c| (c.config_uuid.clone(), c.config_type))
            .collect())
    }

    async fn increment_version_next_run(
        &self,
        config_uuid: &str,
        config_type: ConfigType,
        now: DateTime<Utc>,
    ) -> TagEngineResult<()> {
        let mut configs = self.configs.lock().unwrap();
        let config = configs
            .get_mut(config_uuid)
            .filter(|c| c.config_type == config_type)
            .ok_or_else(|| TagEngineError::ConfigNotFound {
                config_uuid: config_uuid.to_string(),
            })?;
        config.version += 1;
        config.next_run = Some(TagConfig::compute_next_run(
            now,
            config.refresh_frequency,
            config.refresh_unit,
        ));
        Ok(())
    }

    async fn read_service_account(
        &self,
        config_uuid: &str,
        config_type: ConfigType,
    ) -> TagEngineResult<Option<String>> {
        let configs = self.configs.lock().unwrap();
        Ok(configs
            .get(config_uuid)
            .filter(|c| c.config_type == config_type)
            .map(|c| c.service_account.clone()))
    }

    async fn update_scheduling_status(
        &self,
        config_uuid: &str,
        config_type: ConfigType,
        status: SchedulingStatus,
    ) -> TagEngineResult<()> {
        let mut configs = self.configs.lock().unwrap();
        let config = configs
            .get_mut(config_uuid)
            .filter(|c| c.config_type == config_type)
            .ok_or_else(|| TagEngineError::ConfigNotFound {
                config_uuid: config_uuid.to_string(),
            })?;
        config.scheduling_status = Some(status);
        Ok(())
    }

    async fn update_job_status(
        &self,
        config_uuid: &str,
        config_type: ConfigType,
        status: JobStatus,
    ) -> TagEngineResult<()> {
        let mut configs = self.configs.lock().unwrap();
        let config = configs
            .get_mut(config_uuid)
            .filter(|c| c.config_type == config_type)
            .ok_or_else(|| TagEngineError::ConfigNotFound {
                config_uuid: config_uuid.to_string(),
            })?;
        config.job_status = Some(status);
        Ok(())
    }

    async fn list(
        &self,
        service_account: &str,
        config_type: Option<ConfigType>,
    ) -> TagEngineResult<Vec<TagConfig>> {
        let configs = self.configs.lock().unwrap();
        Ok(configs
            .values()
            .filter(|c| {
                c.service_account == service_account
                    && c.config_status != ConfigStatus::Inactive
                    && config_type.is_none_or(|ct| c.config_type == ct)
            })
            .cloned()
            .collect())
    }

    async fn delete(
        &self,
        service_account: &str,
        config_uuid: &str,
        config_type: ConfigType,
    ) -> TagEngineResult<()> {
        let mut configs = self.configs.lock().unwrap();
        let matches = configs
            .get(config_uuid)
            .is_some_and(|c| c.config_type == config_type && c.service_account == service_account);
        if !matches {
            return Err(TagEngineError::ConfigNotFound {
                config_uuid: config_uuid.to_string(),
            });
        }
        configs.remove(config_uuid);
        Ok(())
    }

    async fn purge_inactive(
        &self,
        service_account: &str,
        config_type: Option<ConfigType>,
    ) -> TagEngineResult<u64> {
        let mut configs = self.configs.lock().unwrap();
        let before = configs.len();
        configs.retain(|_, c| {
            !(c.service_account == service_account
                && c.config_status == ConfigStatus::Inactive
                && config_type.is_none_or(|ct| c.config_type == ct))
        });
        Ok((before - configs.len()) as u64)
    }
}

/// Mock implementation of WorkQueue with failure injection
#[derive(Clone, Default)]
pub struct MockWorkQueue {
    requests: Arc<Mutex<Vec<QueueRequest>>>,
    /// Requests whose serialized payload contains this marker are rejected
    fail_marker: Arc<Mutex<Option<String>>>,
    fail_all: Arc<Mutex<bool>>,
}

impl MockWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every enqueue whose payload contains the given marker
    pub fn fail_matching(&self, marker: &str) {
        *self.fail_marker.lock().unwrap() = Some(marker.to_string());
    }

    pub fn fail_all(&self, fail: bool) {
        *self.fail_all.lock().unwrap() = fail;
    }

    pub fn requests(&self) -> Vec<QueueRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WorkQueue for MockWorkQueue {
    async fn enqueue(&self, request: &QueueRequest) -> TagEngineResult<()> {
        if *self.fail_all.lock().unwrap() {
            return Err(TagEngineError::Queue("queue unavailable".to_string()));
        }
        if let Some(marker) = self.fail_marker.lock().unwrap().as_ref() {
            if request.payload.to_string().contains(marker) {
                return Err(TagEngineError::Queue(format!(
                    "enqueue rejected: {}",
                    request.task_id
                )));
            }
        }
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}
