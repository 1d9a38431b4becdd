//! Error handling for repository and broker operations with rich context
//!
//! Every failing SQL call is converted into a `SchedulerError` here so the
//! log line carries the operation, the table and the entity involved.

use scheduler_errors::SchedulerError;
use sqlx::Error as SqlxError;
use std::fmt;
use tracing::{debug, error};

/// Operation context for repository operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "查询"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Delete => write!(f, "删除"),
        }
    }
}

/// Context information for a single repository call
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: RepositoryOperation,
    pub table: &'static str,
    pub entity_id: Option<String>,
    pub additional_info: Option<String>,
}

impl OperationContext {
    pub fn new(operation: RepositoryOperation, table: &'static str) -> Self {
        Self {
            operation,
            table,
            entity_id: None,
            additional_info: None,
        }
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_additional_info(mut self, info: String) -> Self {
        self.additional_info = Some(info);
        self
    }

    pub fn entity_description(&self) -> String {
        match &self.entity_id {
            Some(id) => format!("{} (ID: {})", self.table, id),
            None => self.table.to_string(),
        }
    }
}

/// Helpers shared by the Postgres repositories
pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    /// Convert a sqlx error into a `SchedulerError`, logging the context
    pub fn database_error(context: &OperationContext, err: SqlxError) -> SchedulerError {
        error!(
            operation = %context.operation,
            table = context.table,
            entity_id = ?context.entity_id,
            additional_info = ?context.additional_info,
            "{}{}失败: {}",
            context.operation,
            context.entity_description(),
            err
        );
        match err {
            SqlxError::RowNotFound => SchedulerError::DatabaseOperation(format!(
                "{}{}失败: 记录不存在",
                context.operation,
                context.entity_description()
            )),
            other => SchedulerError::Database(other),
        }
    }

    pub fn log_operation_success(context: &OperationContext, detail: Option<&str>) {
        debug!(
            operation = %context.operation,
            table = context.table,
            "{}{}成功{}",
            context.operation,
            context.entity_description(),
            detail.map(|d| format!(": {d}")).unwrap_or_default()
        );
    }
}

/// Convert a broker-side sqlx error into `SchedulerError::Broker`
pub fn broker_error(operation: &str, queue: &str, err: SqlxError) -> SchedulerError {
    error!(operation, queue, "消息代理调用失败: {}", err);
    SchedulerError::Broker(format!("{operation}({queue}) 失败: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_operation_error() {
        let context = OperationContext::new(RepositoryOperation::Update, "home_assistant_schedules")
            .with_entity_id("s1");
        let err = RepositoryErrorHelpers::database_error(&context, SqlxError::RowNotFound);
        match err {
            SchedulerError::DatabaseOperation(msg) => {
                assert!(msg.contains("home_assistant_schedules (ID: s1)"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_broker_error_is_retryable() {
        let err = broker_error("pgmq.pop", "critical_tasks", SqlxError::PoolTimedOut);
        assert!(matches!(err, SchedulerError::Broker(ref msg) if msg.starts_with("pgmq.pop(critical_tasks)")));
        assert!(err.is_retryable());
    }
}
