use async_trait::async_trait;
use scheduler_errors::SchedulerResult;

use crate::entities::{QueueMessage, TaskEnvelope};

/// 消息代理客户端接口
///
/// 对持久化、按优先级分区的队列存储的薄封装。所有操作都是远程调用，
/// 都可能以 `SchedulerError::Broker` 失败；客户端本身不做重试，
/// 由调用方判断错误是否可恢复。
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// 发送一条消息，`delay_seconds` 为 0 时立即可见，返回消息ID
    async fn send(
        &self,
        queue: &str,
        envelope: &TaskEnvelope,
        delay_seconds: u64,
    ) -> SchedulerResult<i64>;

    /// 批量发送消息
    ///
    /// 部分失败不做拆分：调用失败即视为整批失败，由调用方整体重发。
    async fn send_batch(
        &self,
        queue: &str,
        envelopes: &[TaskEnvelope],
        delay_seconds: u64,
    ) -> SchedulerResult<Vec<i64>>;

    /// 读取最多 `max_count` 条可见消息，并在 `visibility_timeout_seconds` 内对其他读取者隐藏
    ///
    /// 消息不会被删除，超时后未被弹出的消息重新可见（至少一次投递）。
    async fn read(
        &self,
        queue: &str,
        visibility_timeout_seconds: u64,
        max_count: usize,
    ) -> SchedulerResult<Vec<QueueMessage>>;

    /// 原子地读取并删除一条消息，队列为空时返回 `None`
    async fn pop(&self, queue: &str) -> SchedulerResult<Option<QueueMessage>>;
}
