use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use scheduler_config::{BackoffStrategy, RetryConfig};
use scheduler_domain::clock::Clock;
use scheduler_domain::entities::{
    Priority, ProcessReport, QueueMessage, QueueReport, TaskEnvelope, TaskLogEntry,
};
use scheduler_domain::messaging::MessageBroker;
use scheduler_domain::repositories::TaskLogRepository;
use scheduler_domain::services::QueueProcessor;
use scheduler_domain::value_objects::{Backoff, RetryPolicy};
use scheduler_errors::{SchedulerError, SchedulerResult};
use scheduler_infrastructure::MetricsCollector;
use tracing::{debug, error, info, instrument, warn};

use crate::handler_registry::HandlerRegistry;

/// 根据重试配置构造重试策略
pub fn retry_policy_from_config(config: &RetryConfig) -> RetryPolicy {
    let backoff = match config.backoff_strategy {
        BackoffStrategy::None => Backoff::None,
        BackoffStrategy::Fixed => Backoff::Fixed {
            seconds: config.base_delay_seconds,
        },
        BackoffStrategy::Exponential => Backoff::Exponential {
            base_seconds: config.base_delay_seconds,
            multiplier: config.multiplier,
            max_seconds: config.max_delay_seconds,
            jitter_factor: config.jitter_factor,
        },
    };
    RetryPolicy::new(config.max_retries, backoff)
}

/// 单个任务的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    Requeued,
    Failed,
}

/// 任务处理器
///
/// 严格按 critical → high → normal → low 顺序处理：当前队列弹空或达到
/// 单队列上限之后才会访问下一个队列。消息代理的错误直接向上传播，
/// 执行日志写入失败只记录错误日志。
pub struct TaskProcessor {
    broker: Arc<dyn MessageBroker>,
    registry: Arc<HandlerRegistry>,
    task_log_repository: Arc<dyn TaskLogRepository>,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsCollector>,
    retry_policy: RetryPolicy,
    max_tasks_per_queue: usize,
}

impl TaskProcessor {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        registry: Arc<HandlerRegistry>,
        task_log_repository: Arc<dyn TaskLogRepository>,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            broker,
            registry,
            task_log_repository,
            clock,
            metrics,
            retry_policy: RetryPolicy::default(),
            max_tasks_per_queue: 10,
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_max_tasks_per_queue(mut self, max_tasks_per_queue: usize) -> Self {
        self.max_tasks_per_queue = max_tasks_per_queue;
        self
    }

    /// 处理单个队列，返回本次弹出的任务数
    async fn drain_queue(&self, queue: &str, report: &mut ProcessReport) -> SchedulerResult<usize> {
        let mut processed = 0;

        while processed < self.max_tasks_per_queue {
            let Some(message) = self.broker.pop(queue).await? else {
                debug!("队列 {} 已空", queue);
                break;
            };

            match self.process_message(message).await? {
                Outcome::Succeeded => report.succeeded += 1,
                Outcome::Requeued => {
                    report.failed += 1;
                    report.requeued += 1;
                }
                Outcome::Failed => report.failed += 1,
            }
            processed += 1;
        }

        if processed == self.max_tasks_per_queue {
            debug!("队列 {} 达到单次处理上限 {}", queue, self.max_tasks_per_queue);
        }
        Ok(processed)
    }

    #[instrument(skip(self, message), fields(task_id = %message.message.id, msg_id = message.msg_id))]
    async fn process_message(&self, message: QueueMessage) -> SchedulerResult<Outcome> {
        let envelope = message.message;
        let priority = envelope.priority.as_str();

        let start_time = Instant::now();
        let result = match self.registry.get(&envelope.task_type) {
            Some(handler) => handler.handle(&envelope).await,
            None => Err(SchedulerError::HandlerNotFound(envelope.task_type.clone())),
        };
        let elapsed = start_time.elapsed();
        let execution_time_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        self.metrics.record_task_execution(
            &envelope.task_type,
            priority,
            result.is_ok(),
            elapsed.as_secs_f64(),
        );

        let outcome = match result {
            Ok(()) => {
                info!(
                    "任务 {} 执行成功，耗时 {}ms",
                    envelope.id, execution_time_ms
                );
                Outcome::Succeeded
            }
            Err(e) => {
                self.metrics
                    .record_task_failure(&envelope.task_type, error_kind(&e));
                match self.handle_failure(&envelope, &e).await {
                    Ok(outcome) => outcome,
                    Err(send_error) => {
                        // 消息已被弹出，重试副本未发出，先记录本次失败再上报
                        self.write_log(&envelope, false, execution_time_ms).await;
                        return Err(send_error);
                    }
                }
            }
        };

        self.write_log(&envelope, outcome == Outcome::Succeeded, execution_time_ms)
            .await;
        Ok(outcome)
    }

    /// 失败后根据重试策略决定是否发送重试副本
    async fn handle_failure(
        &self,
        envelope: &TaskEnvelope,
        error: &SchedulerError,
    ) -> SchedulerResult<Outcome> {
        let retryable = !matches!(error, SchedulerError::HandlerNotFound(_))
            && self.retry_policy.should_retry(envelope);

        if !retryable {
            error!(
                "任务 {} 执行失败且不再重试 (重试次数 {}/{}): {}",
                envelope.id, envelope.metadata.retry_count, envelope.metadata.max_retries, error
            );
            return Ok(Outcome::Failed);
        }

        let retry = envelope.retry_copy();
        let delay_seconds = self.retry_policy.delay_for(retry.metadata.retry_count);
        self.broker
            .send(&envelope.queue_name(), &retry, delay_seconds)
            .await?;

        self.metrics
            .record_task_retry(&envelope.task_type, retry.metadata.retry_count);
        warn!(
            "任务 {} 执行失败: {}，{} 秒后进行第 {} 次重试",
            envelope.id, error, delay_seconds, retry.metadata.retry_count
        );
        Ok(Outcome::Requeued)
    }

    async fn write_log(&self, envelope: &TaskEnvelope, success: bool, execution_time_ms: u64) {
        let entry = TaskLogEntry::for_attempt(envelope, success, execution_time_ms, self.clock.now());
        if let Err(e) = self.task_log_repository.append(&entry).await {
            error!("写入任务 {} 的执行日志失败: {}", envelope.id, e);
        }
    }
}

fn error_kind(error: &SchedulerError) -> &'static str {
    match error {
        SchedulerError::HandlerNotFound(_) => "handler_not_found",
        SchedulerError::TaskExecution(_) => "handler_error",
        SchedulerError::Serialization(_) => "serialization",
        _ => "internal",
    }
}

#[async_trait]
impl QueueProcessor for TaskProcessor {
    async fn process_queues(&self) -> SchedulerResult<ProcessReport> {
        let mut report = ProcessReport::default();

        for priority in Priority::ALL {
            let queue = priority.queue_name();
            let processed = self.drain_queue(&queue, &mut report).await?;
            report.processed += processed;
            report.queues.push(QueueReport { queue, processed });
        }

        info!(
            "本轮处理完成: 共 {} 个任务, 成功 {}, 失败 {}, 重新入队 {}",
            report.processed, report.succeeded, report.failed, report.requeued
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_from_config() {
        let fixed = retry_policy_from_config(&RetryConfig {
            backoff_strategy: BackoffStrategy::Fixed,
            base_delay_seconds: 45,
            max_retries: Some(2),
            ..RetryConfig::default()
        });
        assert_eq!(fixed.max_retries, Some(2));
        assert_eq!(fixed.delay_for(3), 45);

        let none = retry_policy_from_config(&RetryConfig {
            backoff_strategy: BackoffStrategy::None,
            ..RetryConfig::default()
        });
        assert_eq!(none.backoff, Backoff::None);

        let exponential = retry_policy_from_config(&RetryConfig::default());
        assert_eq!(
            exponential.backoff,
            Backoff::Exponential {
                base_seconds: 30,
                multiplier: 2.0,
                max_seconds: 900,
                jitter_factor: 0.1,
            }
        );
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            error_kind(&SchedulerError::HandlerNotFound("x".into())),
            "handler_not_found"
        );
        assert_eq!(
            error_kind(&SchedulerError::task_execution("boom")),
            "handler_error"
        );
        assert_eq!(error_kind(&SchedulerError::Internal("x".into())), "internal");
    }
}
