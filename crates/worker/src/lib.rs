//! # 任务处理
//!
//! 队列消费端：按优先级从队列中弹出任务、调用注册的处理器、
//! 写执行日志，并按重试策略把失败任务重新入队。

pub mod handler_registry;
pub mod handlers;
pub mod processor;

pub use handler_registry::HandlerRegistry;
pub use handlers::HttpTaskHandler;
pub use processor::{retry_policy_from_config, TaskProcessor};
