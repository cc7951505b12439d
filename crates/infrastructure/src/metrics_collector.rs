//! Metrics collector for the tag engine core
//!
//! Thin wrapper over the `metrics` facade; an exporter is installed by the
//! binary when metrics are enabled.

use metrics::{counter, histogram, Counter, Histogram};

pub struct MetricsCollector {
    jobs_created_total: Counter,
    tasks_dispatched_total: Counter,
    dispatch_failures_total: Counter,
    status_updates_total: Counter,
    duplicate_status_updates_total: Counter,
    explode_duration: Histogram,
    completion_duration: Histogram,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            jobs_created_total: counter!("tagengine_jobs_created_total"),
            tasks_dispatched_total: counter!("tagengine_tasks_dispatched_total"),
            dispatch_failures_total: counter!("tagengine_dispatch_failures_total"),
            status_updates_total: counter!("tagengine_status_updates_total"),
            duplicate_status_updates_total: counter!("tagengine_duplicate_status_updates_total"),
            explode_duration: histogram!("tagengine_explode_duration_seconds"),
            completion_duration: histogram!("tagengine_completion_compute_duration_seconds"),
        }
    }

    pub fn record_job_created(&self) {
        self.jobs_created_total.increment(1);
    }

    pub fn record_task_dispatched(&self) {
        self.tasks_dispatched_total.increment(1);
    }

    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures_total.increment(1);
    }

    pub fn record_status_update(&self) {
        self.status_updates_total.increment(1);
    }

    pub fn record_duplicate_status_update(&self) {
        self.duplicate_status_updates_total.increment(1);
    }

    pub fn record_explode_duration(&self, duration_seconds: f64) {
        self.explode_duration.record(duration_seconds);
    }

    pub fn record_completion_duration(&self, duration_seconds: f64) {
        self.completion_duration.record(duration_seconds);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
