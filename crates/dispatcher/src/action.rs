use std::fmt;
use std::str::FromStr;

use scheduler_domain::entities::ProcessReport;
use scheduler_errors::{SchedulerError, SchedulerResult};
use serde::{Deserialize, Serialize};

use crate::cleanup_service::CleanupReport;

/// 调度器支持的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerAction {
    #[default]
    ProcessQueues,
    ScheduleRecurringTasks,
    CleanupOldTasks,
}

impl SchedulerAction {
    pub const ALL: [SchedulerAction; 3] = [
        SchedulerAction::ProcessQueues,
        SchedulerAction::ScheduleRecurringTasks,
        SchedulerAction::CleanupOldTasks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerAction::ProcessQueues => "process_queues",
            SchedulerAction::ScheduleRecurringTasks => "schedule_recurring_tasks",
            SchedulerAction::CleanupOldTasks => "cleanup_old_tasks",
        }
    }
}

impl fmt::Display for SchedulerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulerAction {
    type Err = SchedulerError;

    fn from_str(s: &str) -> SchedulerResult<Self> {
        SchedulerAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| SchedulerError::UnknownAction(s.to_string()))
    }
}

/// `schedule_recurring_tasks` 的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleReport {
    /// 成功发送的任务信封数量
    pub scheduled: usize,
    /// 发送失败的调度定义数量
    pub failed: usize,
    /// 参与到期判断的调度定义数量
    pub evaluated: usize,
}

/// 各动作特有的返回字段
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionDetails {
    ProcessQueues(ProcessReport),
    ScheduleRecurringTasks(ScheduleReport),
    CleanupOldTasks(CleanupReport),
}

/// 动作执行结果，序列化为 `{success, action, ...fields}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub action: SchedulerAction,
    #[serde(flatten)]
    pub details: ActionDetails,
}

impl ActionResponse {
    pub fn completed(action: SchedulerAction, details: ActionDetails) -> Self {
        Self {
            success: true,
            action,
            details,
        }
    }
}
