use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};

use scheduler_config::{RetentionConfig, SchedulerConfig};
use scheduler_domain::clock::Clock;
use scheduler_domain::entities::{
    Priority, ProcessReport, ScheduleDefinition, TaskEnvelope, TaskMetadata,
};
use scheduler_domain::messaging::MessageBroker;
use scheduler_domain::recurrence::is_due;
use scheduler_domain::repositories::{
    DeviceHistoryRepository, ScheduleRepository, TaskLogRepository,
};
use scheduler_domain::services::QueueProcessor;
use scheduler_errors::SchedulerResult;
use scheduler_infrastructure::MetricsCollector;

use crate::action::{ActionDetails, ActionResponse, ScheduleReport, SchedulerAction};
use crate::cleanup_service::{CleanupReport, CleanupService};
use crate::producer::TaskProducer;

/// 调度器依赖，在进程启动时构造一次后注入
pub struct SchedulerDependencies {
    pub broker: Arc<dyn MessageBroker>,
    pub processor: Arc<dyn QueueProcessor>,
    pub schedule_repository: Arc<dyn ScheduleRepository>,
    pub task_log_repository: Arc<dyn TaskLogRepository>,
    pub device_history_repository: Arc<dyn DeviceHistoryRepository>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<MetricsCollector>,
}

/// 调度器
///
/// 每次调用都是无状态的请求/响应，调用之间不持有任何共享状态。
pub struct Scheduler {
    processor: Arc<dyn QueueProcessor>,
    producer: TaskProducer,
    schedule_repository: Arc<dyn ScheduleRepository>,
    cleanup: CleanupService,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsCollector>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        deps: SchedulerDependencies,
        config: SchedulerConfig,
        retention: RetentionConfig,
    ) -> Self {
        let cleanup = CleanupService::new(
            deps.task_log_repository,
            deps.device_history_repository,
            deps.clock.clone(),
            retention,
        );

        Self {
            processor: deps.processor,
            producer: TaskProducer::new(deps.broker),
            schedule_repository: deps.schedule_repository,
            cleanup,
            clock: deps.clock,
            metrics: deps.metrics,
            config,
        }
    }

    /// 执行指定动作
    #[instrument(skip(self), fields(action = %action))]
    pub async fn execute(&self, action: SchedulerAction) -> SchedulerResult<ActionResponse> {
        info!("开始执行调度动作: {}", action);

        let result = match action {
            SchedulerAction::ProcessQueues => self
                .process_queues()
                .await
                .map(ActionDetails::ProcessQueues),
            SchedulerAction::ScheduleRecurringTasks => self
                .schedule_recurring_tasks()
                .await
                .map(ActionDetails::ScheduleRecurringTasks),
            SchedulerAction::CleanupOldTasks => self
                .cleanup_old_tasks()
                .await
                .map(ActionDetails::CleanupOldTasks),
        };

        self.metrics.record_action(action.as_str(), result.is_ok());
        match result {
            Ok(details) => Ok(ActionResponse::completed(action, details)),
            Err(e) => {
                error!("调度动作 {} 执行失败: {}", action, e);
                Err(e)
            }
        }
    }

    /// 按优先级消费队列，错误直接向上传播
    pub async fn process_queues(&self) -> SchedulerResult<ProcessReport> {
        let report = self.processor.process_queues().await?;
        info!(
            "队列处理完成: 处理 {} 个, 成功 {} 个, 失败 {} 个, 重新入队 {} 个",
            report.processed, report.succeeded, report.failed, report.requeued
        );
        Ok(report)
    }

    /// 检查所有启用的调度定义，为到期的调度发送任务信封
    ///
    /// 加载失败直接返回错误；单个调度的发送或回写失败只记录日志，不影响其余调度。
    pub async fn schedule_recurring_tasks(&self) -> SchedulerResult<ScheduleReport> {
        let now = self.clock.now();
        let schedules: Vec<_> = self
            .schedule_repository
            .find_active()
            .await?
            .into_iter()
            .filter(|s| s.is_active)
            .collect();

        let mut report = ScheduleReport {
            evaluated: schedules.len(),
            ..ScheduleReport::default()
        };
        debug!("加载了 {} 个启用的调度定义", schedules.len());

        for schedule in &schedules {
            if !is_due(schedule, now) {
                debug!("调度 {} 尚未到期", schedule.id);
                continue;
            }

            let envelope = self.build_envelope(schedule, now);
            match self.producer.enqueue(&envelope, 0).await {
                Ok(msg_id) => {
                    report.scheduled += 1;
                    info!(
                        "调度 {} 已分发任务 {} (msg_id: {})",
                        schedule.id, envelope.id, msg_id
                    );
                    self.write_back(schedule, now).await;
                }
                Err(e) => {
                    report.failed += 1;
                    error!("调度 {} 分发任务失败: {}", schedule.id, e);
                }
            }
        }

        self.metrics
            .record_schedule_run(report.evaluated, report.scheduled, report.failed);
        info!("本次调度完成，共调度了 {} 个任务", report.scheduled);
        Ok(report)
    }

    /// 按保留期清理执行日志与设备历史
    pub async fn cleanup_old_tasks(&self) -> SchedulerResult<CleanupReport> {
        let report = self.cleanup.run().await?;
        self.metrics
            .record_cleanup(report.task_logs_deleted, report.device_history_deleted);
        Ok(report)
    }

    fn build_envelope(&self, schedule: &ScheduleDefinition, now: DateTime<Utc>) -> TaskEnvelope {
        let task_type = &self.config.scheduled_task_type;

        let mut payload = Map::new();
        payload.insert(
            "schedule_id".to_string(),
            Value::String(schedule.id.clone()),
        );
        payload.insert(
            "user_id".to_string(),
            Value::String(schedule.user_id.clone()),
        );

        TaskEnvelope::new(
            TaskEnvelope::generate_id(task_type, &schedule.id, now),
            task_type.clone(),
            Priority::Normal,
            payload,
            TaskMetadata {
                created_at: now,
                retry_count: 0,
                max_retries: self.config.max_retries,
                user_id: Some(schedule.user_id.clone()),
            },
        )
    }

    async fn write_back(&self, schedule: &ScheduleDefinition, now: DateTime<Utc>) {
        if !self.config.write_back_last_executed {
            return;
        }
        if let Err(e) = self
            .schedule_repository
            .mark_executed(&schedule.id, now)
            .await
        {
            warn!("调度 {} 回写 last_executed 失败: {}", schedule.id, e);
        }
    }
}
