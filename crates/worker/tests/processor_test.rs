#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use scheduler_domain::entities::{Priority, TaskEnvelope, TaskMetadata};
    use scheduler_domain::messaging::MessageBroker;
    use scheduler_domain::services::QueueProcessor;
    use scheduler_domain::value_objects::{Backoff, RetryPolicy};
    use scheduler_errors::SchedulerError;
    use scheduler_infrastructure::{InMemoryBroker, MetricsCollector};
    use scheduler_testing_utils::{
        BrokerCall, EnvelopeBuilder, ManualClock, MockBroker, MockTaskHandler,
        MockTaskLogRepository,
    };
    use scheduler_worker::{HandlerRegistry, TaskProcessor};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn registry_with(handlers: &[(&str, MockTaskHandler)]) -> Arc<HandlerRegistry> {
        let mut registry = HandlerRegistry::new();
        for (task_type, handler) in handlers {
            registry.register(*task_type, Arc::new(handler.clone()));
        }
        Arc::new(registry)
    }

    fn processor(
        broker: Arc<dyn MessageBroker>,
        registry: Arc<HandlerRegistry>,
        logs: &MockTaskLogRepository,
    ) -> TaskProcessor {
        TaskProcessor::new(
            broker,
            registry,
            Arc::new(logs.clone()),
            Arc::new(ManualClock::new(now())),
            Arc::new(MetricsCollector::new()),
        )
    }

    fn task(id: &str, priority: Priority) -> TaskEnvelope {
        EnvelopeBuilder::new()
            .with_id(id)
            .with_priority(priority)
            .build()
    }

    #[tokio::test]
    async fn test_critical_queue_drained_before_low() {
        let broker = MockBroker::new();
        broker.push("low_tasks", task("l1", Priority::Low));
        broker.push("critical_tasks", task("c1", Priority::Critical));
        broker.push("low_tasks", task("l2", Priority::Low));
        broker.push("critical_tasks", task("c2", Priority::Critical));
        broker.push("high_tasks", task("h1", Priority::High));

        let handler = MockTaskHandler::succeeding("noop");
        let logs = MockTaskLogRepository::new();
        let processor = processor(
            Arc::new(broker.clone()),
            registry_with(&[("test.noop", handler.clone())]),
            &logs,
        );

        let report = processor.process_queues().await.unwrap();

        assert_eq!(report.processed, 5);
        assert_eq!(report.succeeded, 5);
        let handled: Vec<String> = handler.handled().into_iter().map(|e| e.id).collect();
        assert_eq!(handled, vec!["c1", "c2", "h1", "l1", "l2"]);

        let popped = broker.popped_queues();
        let last_critical = popped.iter().rposition(|q| q == "critical_tasks").unwrap();
        let first_low = popped.iter().position(|q| q == "low_tasks").unwrap();
        assert!(last_critical < first_low);
        // 每个队列都以一次空弹出结束
        assert_eq!(popped.iter().filter(|q| *q == "critical_tasks").count(), 3);

        let queues: Vec<(String, usize)> = report
            .queues
            .iter()
            .map(|q| (q.queue.clone(), q.processed))
            .collect();
        assert_eq!(
            queues,
            vec![
                ("critical_tasks".to_string(), 2),
                ("high_tasks".to_string(), 1),
                ("normal_tasks".to_string(), 0),
                ("low_tasks".to_string(), 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_pass_limit_moves_on_to_next_queue() {
        let broker = MockBroker::new();
        for i in 0..3 {
            broker.push("critical_tasks", task(&format!("c{i}"), Priority::Critical));
        }
        broker.push("low_tasks", task("l1", Priority::Low));

        let logs = MockTaskLogRepository::new();
        let processor = processor(
            Arc::new(broker.clone()),
            registry_with(&[("test.noop", MockTaskHandler::succeeding("noop"))]),
            &logs,
        )
        .with_max_tasks_per_queue(2);

        let report = processor.process_queues().await.unwrap();

        assert_eq!(report.queues[0].processed, 2);
        assert_eq!(report.queues[3].processed, 1);
        assert_eq!(broker.queue_len("critical_tasks"), 1);
        assert_eq!(
            broker
                .popped_queues()
                .iter()
                .filter(|q| *q == "critical_tasks")
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_success_writes_log_entry() {
        let broker = MockBroker::new();
        broker.push(
            "high_tasks",
            EnvelopeBuilder::new()
                .with_id("ok")
                .with_priority(Priority::High)
                .with_retry_count(1)
                .build(),
        );
        let logs = MockTaskLogRepository::new();
        let processor = processor(
            Arc::new(broker.clone()),
            registry_with(&[("test.noop", MockTaskHandler::succeeding("noop"))]),
            &logs,
        );

        processor.process_queues().await.unwrap();

        let entries = logs.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].task_id, "ok");
        assert_eq!(entries[0].task_type, "test.noop");
        assert_eq!(entries[0].priority, Priority::High);
        assert!(entries[0].success);
        assert_eq!(entries[0].retry_count, 1);
        assert_eq!(entries[0].created_at, now());
        assert_eq!(broker.send_count(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_terminal() {
        let broker = MockBroker::new();
        broker.push(
            "normal_tasks",
            EnvelopeBuilder::new()
                .with_id("done")
                .with_retry_count(3)
                .with_max_retries(3)
                .build(),
        );
        let logs = MockTaskLogRepository::new();
        let processor = processor(
            Arc::new(broker.clone()),
            registry_with(&[("test.noop", MockTaskHandler::failing("noop"))]),
            &logs,
        );

        let report = processor.process_queues().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.requeued, 0);
        assert_eq!(broker.send_count(), 0);
        let entries = logs.entries();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].success);
        assert_eq!(entries[0].retry_count, 3);
    }

    #[tokio::test]
    async fn test_failed_task_is_requeued_with_backoff_delay() {
        let broker = MockBroker::new();
        broker.push(
            "critical_tasks",
            EnvelopeBuilder::new()
                .with_id("flaky")
                .with_priority(Priority::Critical)
                .build(),
        );
        let logs = MockTaskLogRepository::new();
        let processor = processor(
            Arc::new(broker.clone()),
            registry_with(&[("test.noop", MockTaskHandler::failing("noop"))]),
            &logs,
        )
        .with_retry_policy(RetryPolicy::new(None, Backoff::Fixed { seconds: 45 }))
        .with_max_tasks_per_queue(1);

        let report = processor.process_queues().await.unwrap();

        assert_eq!(report.requeued, 1);
        assert!(broker.calls().contains(&BrokerCall::Send {
            queue: "critical_tasks".to_string(),
            task_id: "flaky".to_string(),
            delay_seconds: 45,
        }));
        let requeued = broker.queue_messages("critical_tasks");
        assert_eq!(requeued.len(), 1);
        assert_eq!(requeued[0].metadata.retry_count, 1);
    }

    #[tokio::test]
    async fn test_global_retry_cap_overrides_envelope() {
        let broker = MockBroker::new();
        broker.push("normal_tasks", EnvelopeBuilder::new().with_max_retries(5).build());
        let logs = MockTaskLogRepository::new();
        let processor = processor(
            Arc::new(broker.clone()),
            registry_with(&[("test.noop", MockTaskHandler::failing("noop"))]),
            &logs,
        )
        .with_retry_policy(RetryPolicy::new(Some(0), Backoff::None));

        let report = processor.process_queues().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.requeued, 0);
        assert_eq!(broker.send_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_handler_is_terminal_failure() {
        let broker = MockBroker::new();
        broker.push(
            "normal_tasks",
            EnvelopeBuilder::new().with_type("unknown.type").build(),
        );
        let logs = MockTaskLogRepository::new();
        let processor = processor(Arc::new(broker.clone()), registry_with(&[]), &logs);

        let report = processor.process_queues().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.requeued, 0);
        assert_eq!(broker.send_count(), 0);
        assert!(!logs.entries()[0].success);
    }

    #[tokio::test]
    async fn test_log_write_failure_does_not_stop_pass() {
        let broker = MockBroker::new();
        broker.push("critical_tasks", task("a", Priority::Critical));
        broker.push("low_tasks", task("b", Priority::Low));
        let logs = MockTaskLogRepository::new();
        logs.fail_append(true);
        let handler = MockTaskHandler::succeeding("noop");
        let processor = processor(
            Arc::new(broker.clone()),
            registry_with(&[("test.noop", handler.clone())]),
            &logs,
        );

        let report = processor.process_queues().await.unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(handler.invocations(), 2);
        assert!(logs.entries().is_empty());
    }

    #[tokio::test]
    async fn test_pop_error_propagates() {
        let broker = MockBroker::new();
        broker.fail_pops(true);
        let logs = MockTaskLogRepository::new();
        let processor = processor(Arc::new(broker.clone()), registry_with(&[]), &logs);

        let result = processor.process_queues().await;

        assert!(matches!(result, Err(SchedulerError::Broker(_))));
        assert_eq!(broker.popped_queues(), vec!["critical_tasks"]);
    }

    #[tokio::test]
    async fn test_requeue_send_error_propagates() {
        let broker = MockBroker::new();
        broker.push("normal_tasks", task("t", Priority::Normal));
        broker.fail_sends(true);
        let logs = MockTaskLogRepository::new();
        let processor = processor(
            Arc::new(broker.clone()),
            registry_with(&[("test.noop", MockTaskHandler::failing("noop"))]),
            &logs,
        );

        let result = processor.process_queues().await;

        assert!(matches!(result, Err(SchedulerError::Broker(_))));
        assert_eq!(broker.queue_len("normal_tasks"), 0);
        let entries = logs.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].task_id, "t");
        assert!(!entries[0].success);
        assert_eq!(entries[0].retry_count, 0);
    }

    #[tokio::test]
    async fn test_failed_task_round_trip_through_broker() {
        let clock = ManualClock::new(now());
        let broker = Arc::new(InMemoryBroker::with_clock(Arc::new(clock.clone())));
        let logs = MockTaskLogRepository::new();
        let handler = MockTaskHandler::failing("demo");
        let processor = TaskProcessor::new(
            broker.clone(),
            registry_with(&[("demo", handler.clone())]),
            Arc::new(logs.clone()),
            Arc::new(clock.clone()),
            Arc::new(MetricsCollector::new()),
        )
        .with_retry_policy(RetryPolicy::new(None, Backoff::Fixed { seconds: 60 }));

        let envelope = TaskEnvelope::new(
            "t1",
            "demo",
            Priority::Normal,
            serde_json::Map::new(),
            TaskMetadata {
                created_at: now(),
                retry_count: 0,
                max_retries: 2,
                user_id: None,
            },
        );
        broker.send("normal_tasks", &envelope, 0).await.unwrap();

        let report = processor.process_queues().await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.requeued, 1);
        assert_eq!(handler.invocations(), 1);

        let entries = logs.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].task_id, "t1");
        assert!(!entries[0].success);
        assert_eq!(entries[0].retry_count, 0);

        // 重试副本在退避时间内不可见
        assert_eq!(broker.queue_size("normal_tasks").await, 1);
        assert!(broker.pop("normal_tasks").await.unwrap().is_none());

        clock.advance(Duration::seconds(60));
        let retried = broker.pop("normal_tasks").await.unwrap().unwrap();
        assert_eq!(retried.message.id, "t1");
        assert_eq!(retried.message.metadata.retry_count, 1);
        assert_eq!(retried.message.metadata.max_retries, 2);
    }
}
