pub mod postgres;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use tagengine_core::config::DatabaseConfig;
use tagengine_core::TagEngineResult;

/// 依据配置构建Postgres连接池
pub async fn create_pool(config: &DatabaseConfig) -> TagEngineResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect(&config.url)
        .await?;

    info!("数据库连接池就绪: max={}", config.max_connections);
    Ok(pool)
}
