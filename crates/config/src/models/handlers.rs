use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 把某一任务类型转发到HTTP端点的处理器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpHandlerConfig {
    pub task_type: String,
    pub url: String,
    #[serde(default = "default_handler_timeout")]
    pub timeout_seconds: u64,
}

fn default_handler_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlersConfig {
    pub http: Vec<HttpHandlerConfig>,
}

impl ConfigValidator for HandlersConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        let mut seen = HashSet::new();
        for handler in &self.http {
            ValidationUtils::validate_not_empty(&handler.task_type, "handlers.http.task_type")?;
            ValidationUtils::validate_url(&handler.url, "handlers.http.url")?;
            ValidationUtils::validate_timeout_seconds(
                handler.timeout_seconds,
                "handlers.http.timeout_seconds",
            )?;
            if !seen.insert(handler.task_type.as_str()) {
                return Err(crate::ConfigError::Validation(format!(
                    "handlers.http has duplicate task_type: {}",
                    handler.task_type
                )));
            }
        }
        Ok(())
    }
}
