use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scheduler_domain::{entities::ScheduleDefinition, repositories::ScheduleRepository};
use scheduler_errors::SchedulerResult;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use crate::error_handling::{OperationContext, RepositoryErrorHelpers, RepositoryOperation};

const TABLE: &str = "home_assistant_schedules";

pub struct PostgresScheduleRepository {
    pool: PgPool,
}

impl PostgresScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_schedule(row: &sqlx::postgres::PgRow) -> SchedulerResult<ScheduleDefinition> {
        let cron_expression: String = row.try_get("cron_expression")?;
        Ok(ScheduleDefinition::new(
            row.try_get::<String, _>("id")?,
            row.try_get::<String, _>("user_id")?,
            row.try_get("is_active")?,
            &cron_expression,
            row.try_get("last_executed")?,
        ))
    }
}

#[async_trait]
impl ScheduleRepository for PostgresScheduleRepository {
    #[instrument(skip(self))]
    async fn find_active(&self) -> SchedulerResult<Vec<ScheduleDefinition>> {
        let context = OperationContext::new(RepositoryOperation::Read, TABLE)
            .with_additional_info("is_active = true".to_string());

        let rows = sqlx::query(
            r#"
            SELECT id::text AS id, user_id::text AS user_id, is_active, cron_expression, last_executed
            FROM home_assistant_schedules
            WHERE is_active = true
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let schedules = rows
            .iter()
            .map(Self::row_to_schedule)
            .collect::<SchedulerResult<Vec<_>>>()?;

        debug!("加载了 {} 个启用的调度定义", schedules.len());
        Ok(schedules)
    }

    #[instrument(skip(self), fields(schedule_id = %schedule_id))]
    async fn mark_executed(
        &self,
        schedule_id: &str,
        executed_at: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        let context =
            OperationContext::new(RepositoryOperation::Update, TABLE).with_entity_id(schedule_id);

        let result = sqlx::query(
            "UPDATE home_assistant_schedules SET last_executed = $2 WHERE id::text = $1",
        )
        .bind(schedule_id)
        .bind(executed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryErrorHelpers::database_error(
                &context,
                sqlx::Error::RowNotFound,
            ));
        }

        RepositoryErrorHelpers::log_operation_success(&context, Some(&executed_at.to_rfc3339()));
        Ok(())
    }
}
