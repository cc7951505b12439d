//! 参数化插入语句构建器
//!
//! 把「列名 -> 带类型的值」映射翻译成一条参数化INSERT语句与对应的
//! 绑定序列。布尔、整数、时间戳、JSON与文本各走各的类型编码，
//! 语句本身只包含列名与占位符，不内插任何值。

use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

/// 带类型的列值
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    Text(String),
    Null,
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        FieldValue::Json(value)
    }
}

/// 插入语句构建器，纯函数式、无内部状态共享
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<String>,
    values: Vec<FieldValue>,
}

impl InsertBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn field(mut self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.columns.push(column.to_string());
        self.values.push(value.into());
        self
    }

    /// 渲染参数化语句文本
    pub fn sql(&self) -> String {
        let placeholders: Vec<String> = (1..=self.columns.len()).map(|i| format!("${i}")).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            placeholders.join(", ")
        )
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// 把全部值按类型绑定到查询上
    pub fn bind_values<'q>(
        &self,
        mut query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        for value in &self.values {
            query = match value {
                FieldValue::Bool(b) => query.bind(*b),
                FieldValue::Int(i) => query.bind(*i),
                FieldValue::Timestamp(t) => query.bind(*t),
                FieldValue::Json(j) => query.bind(j.clone()),
                FieldValue::Text(s) => query.bind(s.clone()),
                FieldValue::Null => query.bind(Option::<String>::None),
            };
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_placeholder_numbering() {
        let builder = InsertBuilder::new("jobs")
            .field("job_uuid", "abc")
            .field("task_count", 0i64)
            .field("creation_time", Utc::now());

        assert_eq!(
            builder.sql(),
            "INSERT INTO jobs (job_uuid, task_count, creation_time) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn test_typed_values_are_preserved() {
        let now = Utc::now();
        let builder = InsertBuilder::new("static_asset_configs")
            .field("config_uuid", "c1")
            .field("version", 1i64)
            .field("fields", json!([{"field_id": "owner"}]))
            .field("creation_time", now)
            .field("overwrite", true);

        assert_eq!(
            builder.values(),
            &[
                FieldValue::Text("c1".to_string()),
                FieldValue::Int(1),
                FieldValue::Json(json!([{"field_id": "owner"}])),
                FieldValue::Timestamp(now),
                FieldValue::Bool(true),
            ]
        );
    }

    #[test]
    fn test_single_column_statement() {
        let builder = InsertBuilder::new("t").field("a", FieldValue::Null);
        assert_eq!(builder.sql(), "INSERT INTO t (a) VALUES ($1)");
    }
}
