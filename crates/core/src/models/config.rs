use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::TagEngineError;

/// 配置类型
///
/// 每种打标配置变体对应一张独立的存储表。映射关系是封闭的：
/// 新增变体必须同时给出枚举值与表名，不存在运行期可变的注册表。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ConfigType {
    #[serde(rename = "STATIC_TAG_ASSET")]
    StaticAsset,
    #[serde(rename = "DYNAMIC_TAG_TABLE")]
    DynamicTable,
    #[serde(rename = "DYNAMIC_TAG_COLUMN")]
    DynamicColumn,
    #[serde(rename = "ENTRY_CREATE")]
    EntryCreate,
    #[serde(rename = "GLOSSARY_TAG_ASSET")]
    GlossaryAsset,
    #[serde(rename = "SENSITIVE_TAG_COLUMN")]
    SensitiveColumn,
    #[serde(rename = "TAG_RESTORE")]
    Restore,
    #[serde(rename = "TAG_IMPORT")]
    Import,
    #[serde(rename = "TAG_EXPORT")]
    Export,
}

impl ConfigType {
    pub const ALL: [ConfigType; 9] = [
        ConfigType::StaticAsset,
        ConfigType::DynamicTable,
        ConfigType::DynamicColumn,
        ConfigType::EntryCreate,
        ConfigType::GlossaryAsset,
        ConfigType::SensitiveColumn,
        ConfigType::Restore,
        ConfigType::Import,
        ConfigType::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::StaticAsset => "STATIC_TAG_ASSET",
            ConfigType::DynamicTable => "DYNAMIC_TAG_TABLE",
            ConfigType::DynamicColumn => "DYNAMIC_TAG_COLUMN",
            ConfigType::EntryCreate => "ENTRY_CREATE",
            ConfigType::GlossaryAsset => "GLOSSARY_TAG_ASSET",
            ConfigType::SensitiveColumn => "SENSITIVE_TAG_COLUMN",
            ConfigType::Restore => "TAG_RESTORE",
            ConfigType::Import => "TAG_IMPORT",
            ConfigType::Export => "TAG_EXPORT",
        }
    }

    /// 配置变体对应的存储表
    pub fn table(&self) -> &'static str {
        match self {
            ConfigType::StaticAsset => "static_asset_configs",
            ConfigType::DynamicTable => "dynamic_table_configs",
            ConfigType::DynamicColumn => "dynamic_column_configs",
            ConfigType::EntryCreate => "entry_configs",
            ConfigType::GlossaryAsset => "glossary_asset_configs",
            ConfigType::SensitiveColumn => "sensitive_column_configs",
            ConfigType::Restore => "restore_configs",
            ConfigType::Import => "import_configs",
            ConfigType::Export => "export_configs",
        }
    }
}

impl std::str::FromStr for ConfigType {
    type Err = TagEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigType::ALL
            .iter()
            .copied()
            .find(|ct| ct.as_str() == s.trim())
            .ok_or_else(|| TagEngineError::UnknownConfigType(s.to_string()))
    }
}

impl sqlx::Type<sqlx::Postgres> for ConfigType {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ConfigType {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse::<ConfigType>().map_err(Into::into)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for ConfigType {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// 配置启停状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConfigStatus {
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "INACTIVE")]
    Inactive,
}

impl ConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigStatus::Active => "ACTIVE",
            ConfigStatus::Inactive => "INACTIVE",
        }
    }
}

impl std::str::FromStr for ConfigStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(ConfigStatus::Active),
            "INACTIVE" => Ok(ConfigStatus::Inactive),
            _ => Err(format!("Invalid config status: {s}")),
        }
    }
}

/// 刷新模式：定时自动或按需触发
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RefreshMode {
    #[serde(rename = "AUTO")]
    Auto,
    #[serde(rename = "ON_DEMAND")]
    OnDemand,
}

impl RefreshMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshMode::Auto => "AUTO",
            RefreshMode::OnDemand => "ON_DEMAND",
        }
    }
}

impl std::str::FromStr for RefreshMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AUTO" => Ok(RefreshMode::Auto),
            "ON_DEMAND" => Ok(RefreshMode::OnDemand),
            _ => Err(format!("Invalid refresh mode: {s}")),
        }
    }
}

/// 刷新频率单位
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RefreshUnit {
    #[serde(rename = "minutes")]
    Minutes,
    #[serde(rename = "hours")]
    Hours,
    #[serde(rename = "days")]
    Days,
}

impl RefreshUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshUnit::Minutes => "minutes",
            RefreshUnit::Hours => "hours",
            RefreshUnit::Days => "days",
        }
    }

    /// 把频率折算为时间间隔
    pub fn to_duration(&self, frequency: i64) -> chrono::Duration {
        match self {
            RefreshUnit::Minutes => chrono::Duration::minutes(frequency),
            RefreshUnit::Hours => chrono::Duration::hours(frequency),
            RefreshUnit::Days => chrono::Duration::days(frequency),
        }
    }
}

impl std::str::FromStr for RefreshUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minutes" => Ok(RefreshUnit::Minutes),
            "hours" => Ok(RefreshUnit::Hours),
            "days" => Ok(RefreshUnit::Days),
            _ => Err(format!("Invalid refresh unit: {s}")),
        }
    }
}

/// 调度状态：READY 表示可被调度器拾取，PENDING 表示正处于一轮调度中
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SchedulingStatus {
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "PENDING")]
    Pending,
}

impl SchedulingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulingStatus::Ready => "READY",
            SchedulingStatus::Pending => "PENDING",
        }
    }
}

impl std::str::FromStr for SchedulingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(SchedulingStatus::Ready),
            "PENDING" => Ok(SchedulingStatus::Pending),
            _ => Err(format!("Invalid scheduling status: {s}")),
        }
    }
}

/// 打标配置记录
///
/// 长生命周期的配置文档，作业的分发决策以其为参数。
/// 同一 `(service_account, template_uuid, included_uris_hash, config_type)`
/// 键下最多存在一条 ACTIVE 配置，新写入会先覆盖掉旧的匹配项。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagConfig {
    pub config_uuid: String,
    pub config_type: ConfigType,
    pub config_status: ConfigStatus,
    pub fields: serde_json::Value,
    pub included_uris: String,
    pub included_uris_hash: String,
    pub excluded_uris: String,
    pub template_uuid: String,
    pub template_id: String,
    pub refresh_mode: RefreshMode,
    pub refresh_frequency: i64,
    pub refresh_unit: RefreshUnit,
    pub scheduling_status: Option<SchedulingStatus>,
    pub next_run: Option<DateTime<Utc>>,
    pub version: i64,
    pub job_status: Option<super::job::JobStatus>,
    pub service_account: String,
    pub creation_time: DateTime<Utc>,
}

impl TagConfig {
    /// 校正自动刷新参数：非正的频率回落到24
    pub fn normalize_refresh_frequency(frequency: i64) -> i64 {
        if frequency > 0 {
            frequency
        } else {
            24
        }
    }

    /// 依据刷新频率计算下一次调度时间
    pub fn compute_next_run(
        now: DateTime<Utc>,
        refresh_frequency: i64,
        refresh_unit: RefreshUnit,
    ) -> DateTime<Utc> {
        let delta = Self::normalize_refresh_frequency(refresh_frequency);
        now + refresh_unit.to_duration(delta)
    }
}
