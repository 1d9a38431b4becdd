use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scheduler_domain::{entities::TaskLogEntry, repositories::TaskLogRepository};
use scheduler_errors::SchedulerResult;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::error_handling::{OperationContext, RepositoryErrorHelpers, RepositoryOperation};

const TABLE: &str = "task_logs";

/// 任务执行日志，只追加，过期后由清理动作删除
pub struct PostgresTaskLogRepository {
    pool: PgPool,
}

impl PostgresTaskLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskLogRepository for PostgresTaskLogRepository {
    #[instrument(skip(self, entry), fields(
        task_id = %entry.task_id,
        task_type = %entry.task_type,
        success = entry.success,
        retry_count = entry.retry_count,
    ))]
    async fn append(&self, entry: &TaskLogEntry) -> SchedulerResult<()> {
        let context = OperationContext::new(RepositoryOperation::Create, TABLE)
            .with_entity_id(entry.task_id.clone());

        sqlx::query(
            r#"
            INSERT INTO task_logs (task_id, task_type, priority, success, execution_time_ms, retry_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&entry.task_id)
        .bind(&entry.task_type)
        .bind(entry.priority.as_str())
        .bind(entry.success)
        .bind(entry.execution_time_ms.min(i64::MAX as u64) as i64)
        .bind(entry.retry_count.min(i32::MAX as u32) as i32)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        debug!("写入任务执行日志: {} (success: {})", entry.task_id, entry.success);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> SchedulerResult<u64> {
        let context = OperationContext::new(RepositoryOperation::Delete, TABLE)
            .with_additional_info(format!("created_at < {}", cutoff.to_rfc3339()));

        let result = sqlx::query("DELETE FROM task_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let deleted_count = result.rows_affected();
        RepositoryErrorHelpers::log_operation_success(
            &context,
            Some(&format!("删除了 {deleted_count} 条过期记录")),
        );
        Ok(deleted_count)
    }
}
