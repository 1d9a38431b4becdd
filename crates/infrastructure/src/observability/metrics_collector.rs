//! Metrics collector for the priority scheduler
//!
//! Thin wrapper over the `metrics` facade. Without an installed recorder every
//! call is a no-op, so tests can construct it freely.

use metrics::{counter, histogram, Counter, Histogram};
use tracing::debug;

/// Metrics collector for task processing, scheduling and cleanup
pub struct MetricsCollector {
    // Task execution metrics
    task_executions_total: Counter,
    task_execution_duration: Histogram,
    task_failures_total: Counter,
    task_retries_total: Counter,

    // Scheduling metrics
    schedules_evaluated_total: Counter,
    envelopes_scheduled_total: Counter,
    schedule_failures_total: Counter,

    // Cleanup metrics
    task_logs_deleted_total: Counter,
    device_history_deleted_total: Counter,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            task_executions_total: counter!("scheduler_task_executions_total"),
            task_execution_duration: histogram!("scheduler_task_execution_duration_seconds"),
            task_failures_total: counter!("scheduler_task_failures_total"),
            task_retries_total: counter!("scheduler_task_retries_total"),
            schedules_evaluated_total: counter!("scheduler_schedules_evaluated_total"),
            envelopes_scheduled_total: counter!("scheduler_envelopes_scheduled_total"),
            schedule_failures_total: counter!("scheduler_schedule_failures_total"),
            task_logs_deleted_total: counter!("scheduler_task_logs_deleted_total"),
            device_history_deleted_total: counter!("scheduler_device_history_deleted_total"),
        }
    }

    // Task execution metrics

    /// Record a completed handler invocation
    pub fn record_task_execution(
        &self,
        task_type: &str,
        priority: &str,
        success: bool,
        duration_seconds: f64,
    ) {
        self.task_executions_total.increment(1);
        self.task_execution_duration.record(duration_seconds);
        counter!(
            "scheduler_task_executions_by_type_total",
            "task_type" => task_type.to_string(),
            "priority" => priority.to_string(),
            "status" => if success { "success" } else { "failure" }
        )
        .increment(1);

        debug!(
            task_type = task_type,
            priority = priority,
            success = success,
            duration_seconds = duration_seconds,
            "Task execution completed"
        );
    }

    /// Record a task failure
    pub fn record_task_failure(&self, task_type: &str, error_type: &str) {
        self.task_failures_total.increment(1);
        counter!(
            "scheduler_task_failures_by_type_total",
            "task_type" => task_type.to_string(),
            "error_type" => error_type.to_string()
        )
        .increment(1);
    }

    /// Record a task retry
    pub fn record_task_retry(&self, task_type: &str, retry_count: u32) {
        self.task_retries_total.increment(1);

        debug!(
            task_type = task_type,
            retry_count = retry_count,
            "Task retry initiated"
        );
    }

    // Scheduling metrics

    pub fn record_schedule_run(&self, evaluated: usize, scheduled: usize, failed: usize) {
        self.schedules_evaluated_total.increment(evaluated as u64);
        self.envelopes_scheduled_total.increment(scheduled as u64);
        self.schedule_failures_total.increment(failed as u64);
    }

    // Cleanup metrics

    pub fn record_cleanup(&self, task_logs_deleted: u64, device_history_deleted: u64) {
        self.task_logs_deleted_total.increment(task_logs_deleted);
        self.device_history_deleted_total
            .increment(device_history_deleted);
    }

    // Broker metrics

    /// Record broker call duration
    pub fn record_broker_operation(&self, operation: &str, duration_seconds: f64) {
        histogram!(
            "scheduler_broker_operation_duration_seconds",
            "operation" => operation.to_string()
        )
        .record(duration_seconds);
    }

    /// Record the action triggered through the scheduler entry point
    pub fn record_action(&self, action: &str, success: bool) {
        counter!(
            "scheduler_actions_total",
            "action" => action.to_string(),
            "status" => if success { "success" } else { "failure" }
        )
        .increment(1);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder_are_noops() {
        let metrics = MetricsCollector::new();
        metrics.record_task_execution("demo", "normal", true, 0.01);
        metrics.record_task_failure("demo", "handler_error");
        metrics.record_task_retry("demo", 1);
        metrics.record_schedule_run(3, 2, 1);
        metrics.record_cleanup(10, 0);
        metrics.record_broker_operation("pop", 0.002);
        metrics.record_action("process_queues", true);
    }
}
