use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scheduler_domain::repositories::DeviceHistoryRepository;
use scheduler_errors::SchedulerResult;
use sqlx::PgPool;
use tracing::instrument;

use crate::error_handling::{OperationContext, RepositoryErrorHelpers, RepositoryOperation};

/// 设备历史数据由业务应用写入，这里只负责按保留期删除
pub struct PostgresDeviceHistoryRepository {
    pool: PgPool,
}

impl PostgresDeviceHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceHistoryRepository for PostgresDeviceHistoryRepository {
    #[instrument(skip(self))]
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> SchedulerResult<u64> {
        let context = OperationContext::new(RepositoryOperation::Delete, "device_history")
            .with_additional_info(format!("created_at < {}", cutoff.to_rfc3339()));

        let result = sqlx::query("DELETE FROM device_history WHERE created_at < $1")
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
