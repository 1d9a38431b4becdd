//! Mock implementations for the broker, repository and handler traits
//!
//! These are in-memory doubles that record every interaction so tests can
//! assert on call order and arguments without a database or a real broker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scheduler_domain::entities::{
    ProcessReport, QueueMessage, ScheduleDefinition, TaskEnvelope, TaskLogEntry,
};
use scheduler_domain::messaging::MessageBroker;
use scheduler_domain::repositories::{
    DeviceHistoryRepository, ScheduleRepository, TaskLogRepository,
};
use scheduler_domain::services::{QueueProcessor, TaskHandler};
use scheduler_errors::{SchedulerError, SchedulerResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A single interaction with [`MockBroker`]
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerCall {
    Send {
        queue: String,
        task_id: String,
        delay_seconds: u64,
    },
    SendBatch {
        queue: String,
        task_ids: Vec<String>,
        delay_seconds: u64,
    },
    Read {
        queue: String,
    },
    Pop {
        queue: String,
    },
}

impl BrokerCall {
    pub fn queue(&self) -> &str {
        match self {
            BrokerCall::Send { queue, .. }
            | BrokerCall::SendBatch { queue, .. }
            | BrokerCall::Read { queue }
            | BrokerCall::Pop { queue } => queue,
        }
    }
}

/// Mock implementation of MessageBroker for testing
///
/// Messages are FIFO per queue. Delays and visibility timeouts are recorded but
/// not enforced; use the in-memory broker from infrastructure for those.
#[derive(Debug, Clone, Default)]
pub struct MockBroker {
    queues: Arc<Mutex<HashMap<String, VecDeque<QueueMessage>>>>,
    calls: Arc<Mutex<Vec<BrokerCall>>>,
    next_id: Arc<Mutex<i64>>,
    fail_send: Arc<AtomicBool>,
    fail_pop: Arc<AtomicBool>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send/send_batch fail
    pub fn fail_sends(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent pop/read fail
    pub fn fail_pops(&self, fail: bool) {
        self.fail_pop.store(fail, Ordering::SeqCst);
    }

    /// Seed a queue directly without recording a call
    pub fn push(&self, queue: &str, envelope: TaskEnvelope) -> i64 {
        let msg_id = self.allocate_id();
        let now = Utc::now();
        self.queues
            .lock()
            .unwrap()
            .entry(queue.to_string())
            .or_default()
            .push_back(QueueMessage {
                msg_id,
                read_ct: 0,
                enqueued_at: now,
                vt: now,
                message: envelope,
            });
        msg_id
    }

    pub fn calls(&self) -> Vec<BrokerCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Queues touched by pop, in call order
    pub fn popped_queues(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BrokerCall::Pop { queue } => Some(queue),
                _ => None,
            })
            .collect()
    }

    /// Number of send and send_batch calls
    pub fn send_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, BrokerCall::Send { .. } | BrokerCall::SendBatch { .. }))
            .count()
    }

    pub fn queue_messages(&self, queue: &str) -> Vec<TaskEnvelope> {
        self.queues
            .lock()
            .unwrap()
            .get(queue)
            .map(|q| q.iter().map(|m| m.message.clone()).collect())
            .unwrap_or_default()
    }

    pub fn queue_len(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .unwrap()
            .get(queue)
            .map(|q| q.len())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        self.queues.lock().unwrap().clear();
        self.calls.lock().unwrap().clear();
    }

    fn allocate_id(&self) -> i64 {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        *next_id
    }

    fn record(&self, call: BrokerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MessageBroker for MockBroker {
    async fn send(
        &self,
        queue: &str,
        envelope: &TaskEnvelope,
        delay_seconds: u64,
    ) -> SchedulerResult<i64> {
        self.record(BrokerCall::Send {
            queue: queue.to_string(),
            task_id: envelope.id.clone(),
            delay_seconds,
        });
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(SchedulerError::Broker(format!("mock send to {queue} failed")));
        }
        Ok(self.push(queue, envelope.clone()))
    }

    async fn send_batch(
        &self,
        queue: &str,
        envelopes: &[TaskEnvelope],
        delay_seconds: u64,
    ) -> SchedulerResult<Vec<i64>> {
        self.record(BrokerCall::SendBatch {
            queue: queue.to_string(),
            task_ids: envelopes.iter().map(|e| e.id.clone()).collect(),
            delay_seconds,
        });
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(SchedulerError::Broker(format!(
                "mock send_batch to {queue} failed"
            )));
        }
        Ok(envelopes
            .iter()
            .map(|envelope| self.push(queue, envelope.clone()))
            .collect())
    }

    async fn read(
        &self,
        queue: &str,
        _visibility_timeout_seconds: u64,
        max_count: usize,
    ) -> SchedulerResult<Vec<QueueMessage>> {
        self.record(BrokerCall::Read {
            queue: queue.to_string(),
        });
        if self.fail_pop.load(Ordering::SeqCst) {
            return Err(SchedulerError::Broker(format!("mock read from {queue} failed")));
        }
        let mut queues = self.queues.lock().unwrap();
        let messages = queues
            .get_mut(queue)
            .map(|q| {
                q.iter_mut()
                    .take(max_count)
                    .map(|m| {
                        m.read_ct += 1;
                        m.clone()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(messages)
    }

    async fn pop(&self, queue: &str) -> SchedulerResult<Option<QueueMessage>> {
        self.record(BrokerCall::Pop {
            queue: queue.to_string(),
        });
        if self.fail_pop.load(Ordering::SeqCst) {
            return Err(SchedulerError::Broker(format!("mock pop from {queue} failed")));
        }
        let mut queues = self.queues.lock().unwrap();
        Ok(queues.get_mut(queue).and_then(|q| q.pop_front()))
    }
}

/// Mock implementation of ScheduleRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockScheduleRepository {
    schedules: Arc<Mutex<Vec<ScheduleDefinition>>>,
    executed: Arc<Mutex<Vec<(String, DateTime<Utc>)>>>,
    fail_load: Arc<AtomicBool>,
    fail_mark: Arc<AtomicBool>,
    return_inactive: Arc<AtomicBool>,
}

impl MockScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schedules(schedules: Vec<ScheduleDefinition>) -> Self {
        let repo = Self::new();
        *repo.schedules.lock().unwrap() = schedules;
        repo
    }

    pub fn fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    /// Return inactive rows from `find_active` as well, like a store without an index filter
    pub fn return_inactive(&self, include: bool) {
        self.return_inactive.store(include, Ordering::SeqCst);
    }

    pub fn fail_mark_executed(&self, fail: bool) {
        self.fail_mark.store(fail, Ordering::SeqCst);
    }

    /// `(schedule_id, executed_at)` pairs passed to `mark_executed`
    pub fn executed(&self) -> Vec<(String, DateTime<Utc>)> {
        self.executed.lock().unwrap().clone()
    }

    pub fn get(&self, schedule_id: &str) -> Option<ScheduleDefinition> {
        self.schedules
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == schedule_id)
            .cloned()
    }
}

#[async_trait]
impl ScheduleRepository for MockScheduleRepository {
    async fn find_active(&self) -> SchedulerResult<Vec<ScheduleDefinition>> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(SchedulerError::DatabaseOperation(
                "mock schedule load failed".to_string(),
            ));
        }
        let include_inactive = self.return_inactive.load(Ordering::SeqCst);
        Ok(self
            .schedules
            .lock()
            .unwrap()
            .iter()
            .filter(|s| include_inactive || s.is_active)
            .cloned()
            .collect())
    }

    async fn mark_executed(
        &self,
        schedule_id: &str,
        executed_at: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        if self.fail_mark.load(Ordering::SeqCst) {
            return Err(SchedulerError::DatabaseOperation(format!(
                "mock mark_executed for {schedule_id} failed"
            )));
        }
        self.executed
            .lock()
            .unwrap()
            .push((schedule_id.to_string(), executed_at));
        let mut schedules = self.schedules.lock().unwrap();
        if let Some(schedule) = schedules.iter_mut().find(|s| s.id == schedule_id) {
            schedule.last_executed = Some(executed_at);
        }
        Ok(())
    }
}

/// Mock implementation of TaskLogRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockTaskLogRepository {
    entries: Arc<Mutex<Vec<TaskLogEntry>>>,
    fail_append: Arc<AtomicBool>,
    fail_delete: Arc<AtomicBool>,
}

impl MockTaskLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<TaskLogEntry>) -> Self {
        let repo = Self::new();
        *repo.entries.lock().unwrap() = entries;
        repo
    }

    pub fn fail_append(&self, fail: bool) {
        self.fail_append.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<TaskLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskLogRepository for MockTaskLogRepository {
    async fn append(&self, entry: &TaskLogEntry) -> SchedulerResult<()> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(SchedulerError::DatabaseOperation(
                "mock task log append failed".to_string(),
            ));
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> SchedulerResult<u64> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(SchedulerError::DatabaseOperation(
                "mock task log cleanup failed".to_string(),
            ));
        }
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.created_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }
}

/// Mock implementation of DeviceHistoryRepository for testing
///
/// Rows are represented only by their `created_at` timestamp.
#[derive(Debug, Clone, Default)]
pub struct MockDeviceHistoryRepository {
    rows: Arc<Mutex<Vec<DateTime<Utc>>>>,
    fail_delete: Arc<AtomicBool>,
}

impl MockDeviceHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<DateTime<Utc>>) -> Self {
        let repo = Self::new();
        *repo.rows.lock().unwrap() = rows;
        repo
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl DeviceHistoryRepository for MockDeviceHistoryRepository {
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> SchedulerResult<u64> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(SchedulerError::DatabaseOperation(
                "mock device history cleanup failed".to_string(),
            ));
        }
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|created_at| *created_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }
}

/// Task handler with a scripted outcome that counts its invocations
#[derive(Debug, Clone)]
pub struct MockTaskHandler {
    name: String,
    fail: Arc<AtomicBool>,
    invocations: Arc<AtomicUsize>,
    handled: Arc<Mutex<Vec<TaskEnvelope>>>,
}

impl MockTaskHandler {
    pub fn succeeding(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: Arc::new(AtomicBool::new(false)),
            invocations: Arc::new(AtomicUsize::new(0)),
            handled: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(name: &str) -> Self {
        let handler = Self::succeeding(name);
        handler.set_failing(true);
        handler
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn handled(&self) -> Vec<TaskEnvelope> {
        self.handled.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskHandler for MockTaskHandler {
    async fn handle(&self, envelope: &TaskEnvelope) -> SchedulerResult<()> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.handled.lock().unwrap().push(envelope.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(SchedulerError::TaskExecution(format!(
                "{} failed for task {}",
                self.name, envelope.id
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Queue processor returning a scripted report
#[derive(Debug, Clone, Default)]
pub struct MockQueueProcessor {
    report: Arc<Mutex<ProcessReport>>,
    fail: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl MockQueueProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report(report: ProcessReport) -> Self {
        let processor = Self::new();
        *processor.report.lock().unwrap() = report;
        processor
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every pass sleep before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl QueueProcessor for MockQueueProcessor {
    async fn process_queues(&self) -> SchedulerResult<ProcessReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SchedulerError::Broker("mock broker unavailable".to_string()));
        }
        Ok(self.report.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::EnvelopeBuilder;

    #[tokio::test]
    async fn test_mock_broker_records_calls_in_order() {
        let broker = MockBroker::new();
        let envelope = EnvelopeBuilder::new().with_id("t1").build();

        broker.send("normal_tasks", &envelope, 5).await.unwrap();
        let popped = broker.pop("normal_tasks").await.unwrap().unwrap();
        assert_eq!(popped.message.id, "t1");
        assert!(broker.pop("normal_tasks").await.unwrap().is_none());

        assert_eq!(
            broker.calls(),
            vec![
                BrokerCall::Send {
                    queue: "normal_tasks".to_string(),
                    task_id: "t1".to_string(),
                    delay_seconds: 5,
                },
                BrokerCall::Pop {
                    queue: "normal_tasks".to_string()
                },
                BrokerCall::Pop {
                    queue: "normal_tasks".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_broker_failure_injection() {
        let broker = MockBroker::new();
        broker.fail_sends(true);
        let envelope = EnvelopeBuilder::new().build();
        assert!(broker.send("low_tasks", &envelope, 0).await.is_err());
        assert_eq!(broker.queue_len("low_tasks"), 0);
        // 失败的调用同样被记录
        assert_eq!(broker.send_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_task_log_cleanup_is_idempotent() {
        let now = Utc::now();
        let old = EnvelopeBuilder::new().build();
        let repo = MockTaskLogRepository::with_entries(vec![
            TaskLogEntry::for_attempt(&old, true, 1, now - chrono::Duration::days(40)),
            TaskLogEntry::for_attempt(&old, true, 1, now),
        ]);
        let cutoff = now - chrono::Duration::days(30);
        assert_eq!(repo.delete_older_than(cutoff).await.unwrap(), 1);
        assert_eq!(repo.delete_older_than(cutoff).await.unwrap(), 0);
        assert_eq!(repo.entries().len(), 1);
    }
}
