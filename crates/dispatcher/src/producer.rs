use std::sync::Arc;

use scheduler_domain::entities::{Priority, TaskEnvelope};
use scheduler_domain::messaging::MessageBroker;
use scheduler_errors::SchedulerResult;
use tracing::debug;

/// 任务生产者
///
/// 根据信封的优先级选择目标队列后交给消息代理。
#[derive(Clone)]
pub struct TaskProducer {
    broker: Arc<dyn MessageBroker>,
}

impl TaskProducer {
    pub fn new(broker: Arc<dyn MessageBroker>) -> Self {
        Self { broker }
    }

    /// 发送单个任务信封，返回代理分配的消息ID
    pub async fn enqueue(&self, envelope: &TaskEnvelope, delay_seconds: u64) -> SchedulerResult<i64> {
        let queue = envelope.queue_name();
        let msg_id = self.broker.send(&queue, envelope, delay_seconds).await?;
        debug!("任务 {} 已入队 {} (msg_id: {})", envelope.id, queue, msg_id);
        Ok(msg_id)
    }

    /// 批量发送
    ///
    /// 按优先级分组，每个非空队列调用一次 `send_batch`，顺序为
    /// critical → high → normal → low。任一批次失败即返回错误，
    /// 已发送的批次不会撤回，由调用方决定是否整体重发。
    pub async fn enqueue_batch(
        &self,
        envelopes: &[TaskEnvelope],
        delay_seconds: u64,
    ) -> SchedulerResult<Vec<i64>> {
        let mut msg_ids = Vec::with_capacity(envelopes.len());

        for priority in Priority::ALL {
            let group: Vec<TaskEnvelope> = envelopes
                .iter()
                .filter(|envelope| envelope.priority == priority)
                .cloned()
                .collect();
            if group.is_empty() {
                continue;
            }

            let queue = priority.queue_name();
            let ids = self.broker.send_batch(&queue, &group, delay_seconds).await?;
            debug!("批量入队 {} 个任务到 {}", ids.len(), queue);
            msg_ids.extend(ids);
        }

        Ok(msg_ids)
    }
}
