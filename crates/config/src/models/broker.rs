use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// 消息代理实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrokerType {
    /// Postgres + pgmq 扩展，使用 `database` 配置的连接池
    #[default]
    Pgmq,
    /// 进程内队列，仅用于本地运行与测试，重启即丢失
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub r#type: BrokerType,
    /// 启动时创建四个优先级队列（pgmq.create 是幂等的）
    pub create_queues: bool,
    /// 单条消息的最大字节数，超过则拒绝发送
    pub max_message_bytes: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            r#type: BrokerType::Pgmq,
            create_queues: true,
            max_message_bytes: 256 * 1024,
        }
    }
}

impl BrokerConfig {
    pub fn requires_database(&self) -> bool {
        self.r#type == BrokerType::Pgmq
    }
}

impl ConfigValidator for BrokerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.max_message_bytes < 1024 {
            return Err(crate::ConfigError::Validation(
                "broker.max_message_bytes must be at least 1024".to_string(),
            ));
        }
        ValidationUtils::validate_count(
            self.max_message_bytes / 1024,
            "broker.max_message_bytes (KiB)",
        )?;
        Ok(())
    }
}
