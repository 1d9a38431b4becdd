use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use scheduler_domain::clock::{Clock, SystemClock};
use scheduler_domain::entities::{QueueMessage, TaskEnvelope};
use scheduler_domain::messaging::MessageBroker;
use scheduler_errors::{SchedulerError, SchedulerResult};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// 内存消息代理
///
/// 语义与 pgmq 一致：延迟发送、可见性超时读取、原子弹出。
/// 时间由注入的 [`Clock`] 决定，测试中可以手动推进时钟验证超时后重新可见。
/// 队列在第一次使用时自动创建；进程退出即丢失全部消息，仅用于本地运行和测试。
pub struct InMemoryBroker {
    /// 队列存储：队列名 -> 按发送顺序排列的消息
    queues: Mutex<HashMap<String, VecDeque<StoredMessage>>>,
    next_msg_id: Mutex<i64>,
    clock: Arc<dyn Clock>,
    config: InMemoryBrokerConfig,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    msg_id: i64,
    read_ct: i32,
    enqueued_at: DateTime<Utc>,
    /// 不早于此时间才对读取者可见
    visible_at: DateTime<Utc>,
    message: TaskEnvelope,
}

impl StoredMessage {
    fn to_queue_message(&self) -> QueueMessage {
        QueueMessage {
            msg_id: self.msg_id,
            read_ct: self.read_ct,
            enqueued_at: self.enqueued_at,
            vt: self.visible_at,
            message: self.message.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryBrokerConfig {
    /// 单个队列最大容量（0表示无限制）
    pub max_queue_size: usize,
    /// 单条消息序列化后的最大字节数
    pub max_message_bytes: usize,
}

impl Default for InMemoryBrokerConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10000,
            max_message_bytes: 256 * 1024,
        }
    }
}

/// 队列统计信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStats {
    pub name: String,
    pub total: usize,
    /// 当前可被读取的消息数
    pub visible: usize,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(InMemoryBrokerConfig::default(), clock)
    }

    pub fn with_config(config: InMemoryBrokerConfig, clock: Arc<dyn Clock>) -> Self {
        info!("Creating in-memory broker with config: {:?}", config);
        Self {
            queues: Mutex::new(HashMap::new()),
            next_msg_id: Mutex::new(0),
            clock,
            config,
        }
    }

    /// 队列中的消息总数（包括暂不可见的）
    pub async fn queue_size(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .await
            .get(queue)
            .map(|q| q.len())
            .unwrap_or(0)
    }

    /// 获取所有队列的统计信息，按队列名排序
    pub async fn queue_stats(&self) -> Vec<QueueStats> {
        let now = self.clock.now();
        let queues = self.queues.lock().await;
        let mut stats: Vec<QueueStats> = queues
            .iter()
            .map(|(name, messages)| QueueStats {
                name: name.clone(),
                total: messages.len(),
                visible: messages.iter().filter(|m| m.visible_at <= now).count(),
            })
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// 清空指定队列，返回删除的消息数
    pub async fn purge(&self, queue: &str) -> usize {
        let mut queues = self.queues.lock().await;
        let purged = queues.get_mut(queue).map(|q| {
            let count = q.len();
            q.clear();
            count
        });
        purged.unwrap_or(0)
    }

    fn check_message_size(&self, envelope: &TaskEnvelope) -> SchedulerResult<()> {
        let size = serde_json::to_vec(envelope)?.len();
        if size > self.config.max_message_bytes {
            return Err(SchedulerError::Broker(format!(
                "消息 {} 大小 {} 字节超过上限 {} 字节",
                envelope.id, size, self.config.max_message_bytes
            )));
        }
        Ok(())
    }

    async fn allocate_ids(&self, count: usize) -> Vec<i64> {
        let mut next = self.next_msg_id.lock().await;
        (0..count)
            .map(|_| {
                *next += 1;
                *next
            })
            .collect()
    }

    async fn enqueue(
        &self,
        queue: &str,
        envelopes: &[TaskEnvelope],
        delay_seconds: u64,
    ) -> SchedulerResult<Vec<i64>> {
        for envelope in envelopes {
            self.check_message_size(envelope)?;
        }

        let now = self.clock.now();
        let visible_at = offset(now, delay_seconds);

        let mut queues = self.queues.lock().await;
        let messages = queues.entry(queue.to_string()).or_insert_with(|| {
            debug!("Creating new queue: {}", queue);
            VecDeque::new()
        });

        if self.config.max_queue_size > 0
            && messages.len() + envelopes.len() > self.config.max_queue_size
        {
            return Err(SchedulerError::Broker(format!(
                "队列 '{}' 已满 (最大 {} 条消息)",
                queue, self.config.max_queue_size
            )));
        }

        let ids = self.allocate_ids(envelopes.len()).await;
        for (msg_id, envelope) in ids.iter().zip(envelopes) {
            messages.push_back(StoredMessage {
                msg_id: *msg_id,
                read_ct: 0,
                enqueued_at: now,
                visible_at,
                message: envelope.clone(),
            });
        }

        debug!(
            "Sent {} message(s) to queue '{}' with delay {}s",
            envelopes.len(),
            queue,
            delay_seconds
        );
        Ok(ids)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// 与 pgmq 一样把秒数限制在 i32 范围内
fn offset(now: DateTime<Utc>, seconds: u64) -> DateTime<Utc> {
    let seconds = seconds.min(i32::MAX as u64) as i64;
    now.checked_add_signed(Duration::seconds(seconds))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn send(
        &self,
        queue: &str,
        envelope: &TaskEnvelope,
        delay_seconds: u64,
    ) -> SchedulerResult<i64> {
        let ids = self
            .enqueue(queue, std::slice::from_ref(envelope), delay_seconds)
            .await?;
        ids.into_iter()
            .next()
            .ok_or_else(|| SchedulerError::Internal("send returned no message id".to_string()))
    }

    async fn send_batch(
        &self,
        queue: &str,
        envelopes: &[TaskEnvelope],
        delay_seconds: u64,
    ) -> SchedulerResult<Vec<i64>> {
        self.enqueue(queue, envelopes, delay_seconds).await
    }

    async fn read(
        &self,
        queue: &str,
        visibility_timeout_seconds: u64,
        max_count: usize,
    ) -> SchedulerResult<Vec<QueueMessage>> {
        let now = self.clock.now();
        let hidden_until = offset(now, visibility_timeout_seconds);

        let mut queues = self.queues.lock().await;
        let Some(messages) = queues.get_mut(queue) else {
            return Ok(Vec::new());
        };

        let read: Vec<QueueMessage> = messages
            .iter_mut()
            .filter(|m| m.visible_at <= now)
            .take(max_count)
            .map(|m| {
                m.read_ct += 1;
                m.visible_at = hidden_until;
                m.to_queue_message()
            })
            .collect();

        debug!("Read {} message(s) from queue '{}'", read.len(), queue);
        Ok(read)
    }

    async fn pop(&self, queue: &str) -> SchedulerResult<Option<QueueMessage>> {
        let now = self.clock.now();
        let mut queues = self.queues.lock().await;
        let Some(messages) = queues.get_mut(queue) else {
            return Ok(None);
        };

        let popped = messages
            .iter()
            .position(|m| m.visible_at <= now)
            .and_then(|index| messages.remove(index))
            .map(|m| m.to_queue_message());

        if let Some(message) = &popped {
            debug!(
                "Popped message {} (task {}) from queue '{}'",
                message.msg_id, message.message.id, queue
            );
        }
        Ok(popped)
    }
}
