use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scheduler_domain::entities::{Priority, QueueMessage, TaskEnvelope};
use scheduler_domain::messaging::MessageBroker;
use scheduler_errors::{SchedulerError, SchedulerResult};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::error_handling::broker_error;
use crate::observability::MetricsCollector;

const MESSAGE_COLUMNS: &str = "msg_id, read_ct, enqueued_at, vt, message";

/// 基于 Postgres pgmq 扩展的消息代理客户端
///
/// 只调用 `pgmq.send` / `pgmq.send_batch` / `pgmq.read` / `pgmq.pop` 等SQL函数，
/// 队列本身由 pgmq 维护。客户端不做重试。
pub struct PgmqBroker {
    pool: PgPool,
    max_message_bytes: usize,
    metrics: Option<std::sync::Arc<MetricsCollector>>,
}

impl PgmqBroker {
    pub fn new(pool: PgPool, max_message_bytes: usize) -> Self {
        Self {
            pool,
            max_message_bytes,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: std::sync::Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 创建队列，pgmq.create 对已存在的队列是幂等的
    #[instrument(skip(self))]
    pub async fn create_queue(&self, queue: &str) -> SchedulerResult<()> {
        sqlx::query("SELECT pgmq.create($1)")
            .bind(queue)
            .execute(&self.pool)
            .await
            .map_err(|e| broker_error("pgmq.create", queue, e))?;
        debug!("pgmq 队列已就绪: {}", queue);
        Ok(())
    }

    /// 确保四个优先级队列都存在
    pub async fn ensure_priority_queues(&self) -> SchedulerResult<()> {
        for priority in Priority::ALL {
            self.create_queue(&priority.queue_name()).await?;
        }
        info!("已创建/确认 {} 个优先级队列", Priority::ALL.len());
        Ok(())
    }

    fn encode(&self, envelope: &TaskEnvelope) -> SchedulerResult<Value> {
        let value = serde_json::to_value(envelope)?;
        let size = value.to_string().len();
        if size > self.max_message_bytes {
            return Err(SchedulerError::Broker(format!(
                "消息 {} 大小 {} 字节超过上限 {} 字节",
                envelope.id, size, self.max_message_bytes
            )));
        }
        Ok(value)
    }

    fn decode(queue: &str, row: &PgRow) -> SchedulerResult<QueueMessage> {
        let map_err = |e| broker_error("decode", queue, e);
        let msg_id: i64 = row.try_get("msg_id").map_err(map_err)?;
        let read_ct: i32 = row.try_get("read_ct").map_err(map_err)?;
        let enqueued_at: DateTime<Utc> = row.try_get("enqueued_at").map_err(map_err)?;
        let vt: DateTime<Utc> = row.try_get("vt").map_err(map_err)?;
        let body: Value = row.try_get("message").map_err(map_err)?;

        let message: TaskEnvelope = serde_json::from_value(body).map_err(|e| {
            SchedulerError::Serialization(format!(
                "队列 {queue} 中的消息 {msg_id} 不是有效的任务信封: {e}"
            ))
        })?;

        Ok(QueueMessage {
            msg_id,
            read_ct,
            enqueued_at,
            vt,
            message,
        })
    }

    fn record(&self, operation: &str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_broker_operation(operation, started.elapsed().as_secs_f64());
        }
    }
}

fn delay_param(delay_seconds: u64) -> i32 {
    delay_seconds.min(i32::MAX as u64) as i32
}

#[async_trait]
impl MessageBroker for PgmqBroker {
    #[instrument(skip(self, envelope), fields(task_id = %envelope.id))]
    async fn send(
        &self,
        queue: &str,
        envelope: &TaskEnvelope,
        delay_seconds: u64,
    ) -> SchedulerResult<i64> {
        let started = Instant::now();
        let body = self.encode(envelope)?;

        let msg_id: i64 = sqlx::query_scalar("SELECT * FROM pgmq.send($1, $2, $3)")
            .bind(queue)
            .bind(body)
            .bind(delay_param(delay_seconds))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| broker_error("pgmq.send", queue, e))?;

        self.record("send", started);
        debug!("任务 {} 已发送到 {} (msg_id: {})", envelope.id, queue, msg_id);
        Ok(msg_id)
    }

    #[instrument(skip(self, envelopes), fields(count = envelopes.len()))]
    async fn send_batch(
        &self,
        queue: &str,
        envelopes: &[TaskEnvelope],
        delay_seconds: u64,
    ) -> SchedulerResult<Vec<i64>> {
        if envelopes.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let bodies = envelopes
            .iter()
            .map(|envelope| self.encode(envelope))
            .collect::<SchedulerResult<Vec<Value>>>()?;

        let msg_ids: Vec<i64> =
            sqlx::query_scalar("SELECT * FROM pgmq.send_batch($1, $2::jsonb[], $3)")
                .bind(queue)
                .bind(bodies)
                .bind(delay_param(delay_seconds))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| broker_error("pgmq.send_batch", queue, e))?;

        self.record("send_batch", started);
        debug!("批量发送 {} 条消息到 {}", msg_ids.len(), queue);
        Ok(msg_ids)
    }

    #[instrument(skip(self))]
    async fn read(
        &self,
        queue: &str,
        visibility_timeout_seconds: u64,
        max_count: usize,
    ) -> SchedulerResult<Vec<QueueMessage>> {
        let started = Instant::now();
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM pgmq.read($1, $2, $3)");
        let rows = sqlx::query(&sql)
            .bind(queue)
            .bind(delay_param(visibility_timeout_seconds))
            .bind(max_count.min(i32::MAX as usize) as i32)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| broker_error("pgmq.read", queue, e))?;

        self.record("read", started);
        rows.iter().map(|row| Self::decode(queue, row)).collect()
    }

    #[instrument(skip(self))]
    async fn pop(&self, queue: &str) -> SchedulerResult<Option<QueueMessage>> {
        let started = Instant::now();
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM pgmq.pop($1)");
        let row = sqlx::query(&sql)
            .bind(queue)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| broker_error("pgmq.pop", queue, e))?;

        self.record("pop", started);
        row.map(|row| Self::decode(queue, &row)).transpose()
    }
}
