use chrono::{DateTime, Duration, Utc};
use scheduler_config::RetentionConfig;
use scheduler_domain::clock::Clock;
use scheduler_domain::repositories::{DeviceHistoryRepository, TaskLogRepository};
use scheduler_errors::SchedulerResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// 清理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub task_logs_deleted: u64,
    pub device_history_deleted: u64,
}

/// 数据清理服务
///
/// 按保留期删除过期的任务执行日志和设备历史，防止数据库无限增长。
/// 两张表互相独立，任一删除失败都会中止本次清理。
pub struct CleanupService {
    task_log_repository: Arc<dyn TaskLogRepository>,
    device_history_repository: Arc<dyn DeviceHistoryRepository>,
    clock: Arc<dyn Clock>,
    retention: RetentionConfig,
}

impl CleanupService {
    pub fn new(
        task_log_repository: Arc<dyn TaskLogRepository>,
        device_history_repository: Arc<dyn DeviceHistoryRepository>,
        clock: Arc<dyn Clock>,
        retention: RetentionConfig,
    ) -> Self {
        Self {
            task_log_repository,
            device_history_repository,
            clock,
            retention,
        }
    }

    /// 计算保留期截止时间
    pub fn cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
        now - Duration::days(i64::from(retention_days))
    }

    /// 执行一次清理
    pub async fn run(&self) -> SchedulerResult<CleanupReport> {
        let now = self.clock.now();
        let task_log_cutoff = Self::cutoff(now, self.retention.task_log_days);
        let device_history_cutoff = Self::cutoff(now, self.retention.device_history_days);

        debug!(
            "清理截止时间: 执行日志 {}, 设备历史 {}",
            task_log_cutoff, device_history_cutoff
        );

        let task_logs_deleted = self
            .task_log_repository
            .delete_older_than(task_log_cutoff)
            .await?;
        let device_history_deleted = self
            .device_history_repository
            .delete_older_than(device_history_cutoff)
            .await?;

        info!(
            "清理完成: 删除了 {} 条执行日志, {} 条设备历史",
            task_logs_deleted, device_history_deleted
        );

        Ok(CleanupReport {
            task_logs_deleted,
            device_history_deleted,
        })
    }
}
