//! 进程内仓储实现
//!
//! 与内存消息代理配合用于无数据库的本地运行，进程退出即丢失全部数据。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scheduler_domain::entities::{ScheduleDefinition, TaskLogEntry};
use scheduler_domain::repositories::{
    DeviceHistoryRepository, ScheduleRepository, TaskLogRepository,
};
use scheduler_errors::{SchedulerError, SchedulerResult};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
pub struct InMemoryScheduleRepository {
    schedules: RwLock<Vec<ScheduleDefinition>>,
}

impl InMemoryScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schedules(schedules: Vec<ScheduleDefinition>) -> Self {
        Self {
            schedules: RwLock::new(schedules),
        }
    }

    /// 新增或替换同ID的调度定义
    pub async fn upsert(&self, schedule: ScheduleDefinition) {
        let mut schedules = self.schedules.write().await;
        match schedules.iter_mut().find(|s| s.id == schedule.id) {
            Some(existing) => *existing = schedule,
            None => schedules.push(schedule),
        }
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryScheduleRepository {
    async fn find_active(&self) -> SchedulerResult<Vec<ScheduleDefinition>> {
        let schedules = self.schedules.read().await;
        Ok(schedules.iter().filter(|s| s.is_active).cloned().collect())
    }

    async fn mark_executed(
        &self,
        schedule_id: &str,
        executed_at: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        let mut schedules = self.schedules.write().await;
        let schedule = schedules
            .iter_mut()
            .find(|s| s.id == schedule_id)
            .ok_or_else(|| SchedulerError::database_error(format!("调度定义 {schedule_id} 不存在")))?;
        schedule.last_executed = Some(executed_at);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTaskLogRepository {
    entries: RwLock<Vec<TaskLogEntry>>,
}

impl InMemoryTaskLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<TaskLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl TaskLogRepository for InMemoryTaskLogRepository {
    async fn append(&self, entry: &TaskLogEntry) -> SchedulerResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> SchedulerResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| entry.created_at >= cutoff);
        let deleted = (before - entries.len()) as u64;
        debug!("删除了 {} 条过期执行日志", deleted);
        Ok(deleted)
    }
}

/// 本地运行时没有设备历史数据，清理总是返回0
#[derive(Default)]
pub struct InMemoryDeviceHistoryRepository;

#[async_trait]
impl DeviceHistoryRepository for InMemoryDeviceHistoryRepository {
    async fn delete_older_than(&self, _cutoff: DateTime<Utc>) -> SchedulerResult<u64> {
        Ok(0)
    }
}
