use scheduler_config::DatabaseConfig;
use scheduler_errors::{SchedulerError, SchedulerResult};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// 根据配置创建 Postgres 连接池
pub async fn create_pool(config: &DatabaseConfig) -> SchedulerResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect(&config.url)
        .await
        .map_err(SchedulerError::Database)?;

    info!(
        "数据库连接池已创建 (max: {}, min: {})",
        config.max_connections, config.min_connections
    );
    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> SchedulerResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(SchedulerError::Database)?;
    Ok(())
}

/// 执行 `migrations/` 下的建表脚本
pub async fn run_migrations(pool: &PgPool) -> SchedulerResult<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| SchedulerError::DatabaseOperation(format!("数据库迁移失败: {e}")))?;
    info!("数据库迁移完成");
    Ok(())
}
