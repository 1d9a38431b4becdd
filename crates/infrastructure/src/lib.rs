pub mod broker_factory;
pub mod database;
pub mod error_handling;
pub mod in_memory_broker;
pub mod observability;
pub mod pgmq_broker;

pub use broker_factory::BrokerFactory;
pub use database::*;
pub use in_memory_broker::{InMemoryBroker, InMemoryBrokerConfig, QueueStats};
pub use observability::*;
pub use pgmq_broker::PgmqBroker;
