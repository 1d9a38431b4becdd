//! # 领域模型
//!
//! 优先级任务队列的核心数据结构与抽象接口：
//!
//! - [`entities`] - 任务信封、优先级、调度定义、执行日志
//! - [`value_objects`] - 周期规则与重试策略
//! - [`recurrence`] - 判断调度定义是否到期
//! - [`messaging`] - 消息代理接口（send / send_batch / read / pop）
//! - [`repositories`] - 调度定义、执行日志、设备历史的仓储接口
//! - [`services`] - 队列处理服务接口
//! - [`clock`] - 可注入的时钟
//!
//! 此crate不包含任何I/O实现，具体实现位于 `scheduler-infrastructure`。

pub mod clock;
pub mod entities;
pub mod messaging;
pub mod recurrence;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use clock::*;
pub use entities::*;
pub use messaging::*;
pub use recurrence::*;
pub use repositories::*;
pub use scheduler_errors::{SchedulerError, SchedulerResult};
pub use services::*;
pub use value_objects::*;
