//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scheduler_errors::SchedulerResult;

use crate::entities::{ScheduleDefinition, TaskLogEntry};

/// 调度定义仓储抽象
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// 加载所有 `is_active = true` 的调度定义
    async fn find_active(&self) -> SchedulerResult<Vec<ScheduleDefinition>>;
    /// 回写最近一次成功分发的时间
    async fn mark_executed(
        &self,
        schedule_id: &str,
        executed_at: DateTime<Utc>,
    ) -> SchedulerResult<()>;
}

/// 任务执行日志仓储抽象（只追加）
#[async_trait]
pub trait TaskLogRepository: Send + Sync {
    async fn append(&self, entry: &TaskLogEntry) -> SchedulerResult<()>;
    /// 删除 `created_at` 早于 `cutoff` 的日志，返回删除条数
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> SchedulerResult<u64>;
}

/// 设备历史仓储抽象（仅用于保留期清理）
#[async_trait]
pub trait DeviceHistoryRepository: Send + Sync {
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> SchedulerResult<u64>;
}
