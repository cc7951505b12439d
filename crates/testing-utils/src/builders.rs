//! Fluent builders for test fixtures

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use tagengine_core::ids;
use tagengine_core::models::{
    ConfigStatus, ConfigType, RefreshMode, RefreshUnit, SchedulingStatus, TagConfig,
};

/// Builder for `TagConfig` fixtures with sensible defaults
pub struct TagConfigBuilder {
    config: TagConfig,
}

impl TagConfigBuilder {
    pub fn new() -> Self {
        let included_uris = "bigquery/project/test-project/dataset/test-dataset/".to_string();
        Self {
            config: TagConfig {
                config_uuid: ids::new_uuid(),
                config_type: ConfigType::StaticAsset,
                config_status: ConfigStatus::Active,
                fields: json!([{"field_id": "data_owner", "field_value": "test"}]),
                included_uris_hash: ids::content_hash(&included_uris),
                included_uris,
                excluded_uris: String::new(),
                template_uuid: "template-uuid-1".to_string(),
                template_id: "data_governance".to_string(),
                refresh_mode: RefreshMode::Auto,
                refresh_frequency: 24,
                refresh_unit: RefreshUnit::Hours,
                scheduling_status: Some(SchedulingStatus::Ready),
                next_run: Some(Utc::now()),
                version: 1,
                job_status: None,
                service_account: "tag-creator@test-project.iam.gserviceaccount.com".to_string(),
                creation_time: Utc::now(),
            },
        }
    }

    pub fn with_config_uuid(mut self, config_uuid: &str) -> Self {
        self.config.config_uuid = config_uuid.to_string();
        self
    }

    pub fn with_config_type(mut self, config_type: ConfigType) -> Self {
        self.config.config_type = config_type;
        self
    }

    pub fn with_service_account(mut self, service_account: &str) -> Self {
        self.config.service_account = service_account.to_string();
        self
    }

    pub fn with_template_uuid(mut self, template_uuid: &str) -> Self {
        self.config.template_uuid = template_uuid.to_string();
        self
    }

    pub fn with_included_uris(mut self, included_uris: &str) -> Self {
        self.config.included_uris = included_uris.to_string();
        self.config.included_uris_hash = ids::content_hash(included_uris);
        self
    }

    pub fn with_refresh(mut self, frequency: i64, unit: RefreshUnit) -> Self {
        self.config.refresh_mode = RefreshMode::Auto;
        self.config.refresh_frequency = frequency;
        self.config.refresh_unit = unit;
        self
    }

    pub fn on_demand(mut self) -> Self {
        self.config.refresh_mode = RefreshMode::OnDemand;
        self.config.scheduling_status = None;
        self.config.next_run = None;
        self
    }

    pub fn due_at(mut self, next_run: DateTime<Utc>) -> Self {
        self.config.next_run = Some(next_run);
        self
    }

    /// Next run already in the past, config is due for scheduling
    pub fn overdue(self) -> Self {
        let next_run = Utc::now() - Duration::minutes(5);
        self.due_at(next_run)
    }

    pub fn inactive(mut self) -> Self {
        self.config.config_status = ConfigStatus::Inactive;
        self
    }

    pub fn scheduling_pending(mut self) -> Self {
        self.config.scheduling_status = Some(SchedulingStatus::Pending);
        self
    }

    pub fn build(self) -> TagConfig {
        self.config
    }
}

impl Default for TagConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
