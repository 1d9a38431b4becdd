use std::sync::Arc;

use scheduler_config::{BrokerConfig, BrokerType};
use scheduler_domain::clock::Clock;
use scheduler_domain::messaging::MessageBroker;
use scheduler_errors::{SchedulerError, SchedulerResult};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::in_memory_broker::{InMemoryBroker, InMemoryBrokerConfig};
use crate::observability::MetricsCollector;
use crate::pgmq_broker::PgmqBroker;

pub struct BrokerFactory;

impl BrokerFactory {
    /// 根据配置创建消息代理
    ///
    /// pgmq 需要数据库连接池；内存代理使用传入的时钟。
    pub async fn create(
        config: &BrokerConfig,
        pool: Option<PgPool>,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsCollector>,
    ) -> SchedulerResult<Arc<dyn MessageBroker>> {
        debug!("Creating message broker with type: {:?}", config.r#type);

        match config.r#type {
            BrokerType::Pgmq => {
                let pool = pool.ok_or_else(|| {
                    SchedulerError::Configuration("pgmq 消息代理需要数据库连接池".to_string())
                })?;
                info!("Initializing pgmq message broker");
                let broker =
                    PgmqBroker::new(pool, config.max_message_bytes).with_metrics(metrics);
                if config.create_queues {
                    broker.ensure_priority_queues().await?;
                }
                Ok(Arc::new(broker))
            }
            BrokerType::InMemory => {
                info!("Initializing in-memory message broker");
                let broker = InMemoryBroker::with_config(
                    InMemoryBrokerConfig {
                        max_message_bytes: config.max_message_bytes,
                        ..InMemoryBrokerConfig::default()
                    },
                    clock,
                );
                Ok(Arc::new(broker))
            }
        }
    }
}
