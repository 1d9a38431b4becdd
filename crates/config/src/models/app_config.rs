use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    api_observability::{ApiConfig, ObservabilityConfig},
    broker::BrokerConfig,
    database::DatabaseConfig,
    handlers::HandlersConfig,
    processing::{ProcessorConfig, RetryConfig},
    scheduling::{RetentionConfig, SchedulerConfig},
};
use crate::validation::ConfigValidator;

/// 未指定配置文件时依次查找的路径
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/scheduler.toml",
    "scheduler.toml",
    "/etc/priority-scheduler/config.toml",
];

/// 环境变量前缀，嵌套字段用 `__` 分隔，例如 `SCHEDULER_DATABASE__URL`
pub const ENV_PREFIX: &str = "SCHEDULER";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub broker: BrokerConfig,
    pub processor: ProcessorConfig,
    pub retry: RetryConfig,
    pub scheduler: SchedulerConfig,
    pub retention: RetentionConfig,
    pub api: ApiConfig,
    pub observability: ObservabilityConfig,
    pub handlers: HandlersConfig,
}

impl AppConfig {
    /// 加载配置：内置默认值 → 配置文件 → 环境变量，后者覆盖前者
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults =
            ConfigBuilder::try_from(&AppConfig::default()).context("构建默认配置失败")?;
        let mut builder = ConfigBuilder::builder().add_source(defaults);

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.broker.requires_database() {
            self.database.validate()?;
        }
        self.broker.validate()?;
        self.processor.validate()?;
        self.retry.validate()?;
        self.scheduler.validate()?;
        self.retention.validate()?;
        self.api.validate()?;
        self.observability.validate()?;
        self.handlers.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BackoffStrategy, BrokerType, LogFormat};
    use std::io::Write;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.broker.r#type, BrokerType::Pgmq);
        assert_eq!(config.processor.max_tasks_per_queue, 10);
        assert_eq!(config.retry.backoff_strategy, BackoffStrategy::Exponential);
        assert_eq!(config.retention.task_log_days, 30);
        assert_eq!(config.retention.device_history_days, 90);
        assert_eq!(config.api.bind_address, "0.0.0.0:8080");
        assert!(config.handlers.http.is_empty());
    }

    #[test]
    fn test_app_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_not_validated_for_in_memory_broker() {
        let mut config = AppConfig::default();
        config.database.url = String::new();
        assert!(config.validate().is_err());

        config.broker.r#type = BrokerType::InMemory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_app_config_from_partial_toml() {
        let toml_str = r#"
[broker]
type = "in_memory"

[processor]
max_tasks_per_queue = 25

[retry]
max_retries = 5
backoff_strategy = "fixed"
base_delay_seconds = 10

[scheduler]
write_back_last_executed = false

[observability]
log_format = "pretty"

[[handlers.http]]
task_type = "home_assistant.scheduled_action"
url = "http://localhost:8123/api/scheduler"
"#;

        let config = AppConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.broker.r#type, BrokerType::InMemory);
        assert_eq!(config.processor.max_tasks_per_queue, 25);
        assert_eq!(config.retry.max_retries, Some(5));
        assert_eq!(config.retry.backoff_strategy, BackoffStrategy::Fixed);
        assert!(!config.scheduler.write_back_last_executed);
        assert_eq!(config.scheduler.max_retries, 3);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert_eq!(config.handlers.http.len(), 1);
        // 未出现的段落使用默认值
        assert_eq!(config.retention.device_history_days, 90);
    }

    #[test]
    fn test_app_config_from_invalid_toml() {
        assert!(AppConfig::from_toml("[processor]\nmax_tasks_per_queue = 0\n").is_err());
        assert!(AppConfig::from_toml("[broker]\ntype = \"kafka\"\n").is_err());
        assert!(AppConfig::from_toml("not toml at all [").is_err());
    }

    #[test]
    fn test_to_toml_can_be_read_back() {
        let mut config = AppConfig::default();
        config.retention.task_log_days = 7;
        let text = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[database]
url = "postgres://scheduler@db/farm"

[retention]
task_log_days = 14
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.database.url, "postgres://scheduler@db/farm");
        assert_eq!(config.retention.task_log_days, 14);
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = AppConfig::load(Some("/definitely/not/here/scheduler.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[api]\nbind_address = \"nowhere\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        assert!(AppConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[retention]\ndevice_history_days = 60").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        std::env::set_var("SCHEDULER_RETENTION__DEVICE_HISTORY_DAYS", "120");
        let result = AppConfig::load(Some(&path));
        std::env::remove_var("SCHEDULER_RETENTION__DEVICE_HISTORY_DAYS");

        assert_eq!(result.unwrap().retention.device_history_days, 120);
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = AppConfig::from_toml(include_str!("../../../../config/scheduler.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.handlers.http.len(), 1);
    }
}
