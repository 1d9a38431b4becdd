use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// 单次 process_queues 中每个队列最多弹出的任务数
    pub max_tasks_per_queue: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_queue: 10,
        }
    }
}

impl ConfigValidator for ProcessorConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_count(self.max_tasks_per_queue, "processor.max_tasks_per_queue")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    None,
    Fixed,
    #[default]
    Exponential,
}

/// 失败任务重新入队的退避配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 全局重试上限，与信封自带的 max_retries 取较小者；不设置则只看信封
    pub max_retries: Option<u32>,
    pub backoff_strategy: BackoffStrategy,
    pub base_delay_seconds: u64,
    pub multiplier: f64,
    pub max_delay_seconds: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            backoff_strategy: BackoffStrategy::Exponential,
            base_delay_seconds: 30,
            multiplier: 2.0,
            max_delay_seconds: 900,
            jitter_factor: 0.1,
        }
    }
}

impl ConfigValidator for RetryConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.backoff_strategy == BackoffStrategy::None {
            return Ok(());
        }

        ValidationUtils::validate_timeout_seconds(self.base_delay_seconds, "retry.base_delay_seconds")?;

        if self.backoff_strategy == BackoffStrategy::Exponential {
            if self.multiplier < 1.0 {
                return Err(crate::ConfigError::Validation(
                    "retry.multiplier must be at least 1.0".to_string(),
                ));
            }
            if !(0.0..=1.0).contains(&self.jitter_factor) {
                return Err(crate::ConfigError::Validation(
                    "retry.jitter_factor must be between 0.0 and 1.0".to_string(),
                ));
            }
            if self.max_delay_seconds < self.base_delay_seconds {
                return Err(crate::ConfigError::Validation(
                    "retry.max_delay_seconds must be greater than or equal to base_delay_seconds"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }
}
