//! # 调度器
//!
//! 由外部触发器（cron 或 HTTP）按动作名调用的短生命周期调度入口：
//!
//! - `process_queues` - 委托给队列处理服务按优先级消费任务
//! - `schedule_recurring_tasks` - 检查到期的调度定义并分发任务信封
//! - `cleanup_old_tasks` - 按保留期清理执行日志与设备历史

pub mod action;
pub mod cleanup_service;
pub mod producer;
pub mod scheduler;

pub use action::{ActionDetails, ActionResponse, ScheduleReport, SchedulerAction};
pub use cleanup_service::{CleanupReport, CleanupService};
pub use producer::TaskProducer;
pub use scheduler::{Scheduler, SchedulerDependencies};
