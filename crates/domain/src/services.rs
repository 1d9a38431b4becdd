use async_trait::async_trait;
use scheduler_errors::SchedulerResult;

use crate::entities::{ProcessReport, TaskEnvelope};

/// 队列处理服务接口
///
/// 调度器的 `process_queues` 动作委托给此接口，由 worker 实现：
/// 按优先级顺序弹出任务、执行处理器、写执行日志、决定是否重新入队。
#[async_trait]
pub trait QueueProcessor: Send + Sync {
    async fn process_queues(&self) -> SchedulerResult<ProcessReport>;
}

/// 任务处理器接口
///
/// 按 `envelope.task_type` 注册。返回错误即视为本次执行失败，
/// 是否重试由处理方根据重试策略决定。投递语义为至少一次，
/// 实现需要幂等或依据 `envelope.id` 去重。
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// 执行任务
    async fn handle(&self, envelope: &TaskEnvelope) -> SchedulerResult<()>;

    /// 处理器名称
    fn name(&self) -> &str;
}
