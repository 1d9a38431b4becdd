pub mod postgres_device_history_repository;
pub mod postgres_schedule_repository;
pub mod postgres_task_log_repository;

pub use postgres_device_history_repository::PostgresDeviceHistoryRepository;
pub use postgres_schedule_repository::PostgresScheduleRepository;
pub use postgres_task_log_repository::PostgresTaskLogRepository;
