pub mod memory;
pub mod pool;
pub mod postgres;

pub use memory::{
    InMemoryDeviceHistoryRepository, InMemoryScheduleRepository, InMemoryTaskLogRepository,
};
pub use pool::{create_pool, health_check, run_migrations};
pub use postgres::{
    PostgresDeviceHistoryRepository, PostgresScheduleRepository, PostgresTaskLogRepository,
};
