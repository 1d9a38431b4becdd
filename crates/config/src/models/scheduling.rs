use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// 周期调度配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 到期调度生成的任务类型
    pub scheduled_task_type: String,
    /// 生成任务的 max_retries
    pub max_retries: u32,
    /// 分发成功后回写调度定义的 last_executed
    pub write_back_last_executed: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduled_task_type: "home_assistant.scheduled_action".to_string(),
            max_retries: 3,
            write_back_last_executed: true,
        }
    }
}

impl ConfigValidator for SchedulerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(
            &self.scheduled_task_type,
            "scheduler.scheduled_task_type",
        )?;
        if self.max_retries > 100 {
            return Err(crate::ConfigError::Validation(
                "scheduler.max_retries must be less than or equal to 100".to_string(),
            ));
        }
        Ok(())
    }
}

/// 数据保留期（天）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub task_log_days: u32,
    pub device_history_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            task_log_days: 30,
            device_history_days: 90,
        }
    }
}

impl ConfigValidator for RetentionConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_count(self.task_log_days as usize, "retention.task_log_days")?;
        ValidationUtils::validate_count(
            self.device_history_days as usize,
            "retention.device_history_days",
        )?;
        Ok(())
    }
}
