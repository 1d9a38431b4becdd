#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use tower::ServiceExt;

    use scheduler_api::create_app;
    use scheduler_config::{ApiConfig, RetentionConfig, SchedulerConfig};
    use scheduler_dispatcher::{Scheduler, SchedulerDependencies};
    use scheduler_domain::entities::ProcessReport;
    use scheduler_infrastructure::MetricsCollector;
    use scheduler_testing_utils::{
        ManualClock, MockBroker, MockDeviceHistoryRepository, MockQueueProcessor,
        MockScheduleRepository, MockTaskLogRepository, ScheduleBuilder,
    };

    struct TestApp {
        router: Router,
        processor: MockQueueProcessor,
        broker: MockBroker,
        schedules: MockScheduleRepository,
    }

    fn test_app() -> TestApp {
        test_app_with(ApiConfig::default())
    }

    fn test_app_with(api_config: ApiConfig) -> TestApp {
        let processor = MockQueueProcessor::with_report(ProcessReport {
            processed: 1,
            succeeded: 1,
            ..ProcessReport::default()
        });
        let broker = MockBroker::new();
        let schedules = MockScheduleRepository::with_schedules(vec![ScheduleBuilder::new().build()]);
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());

        let scheduler = Scheduler::new(
            SchedulerDependencies {
                broker: Arc::new(broker.clone()),
                processor: Arc::new(processor.clone()),
                schedule_repository: Arc::new(schedules.clone()),
                task_log_repository: Arc::new(MockTaskLogRepository::new()),
                device_history_repository: Arc::new(MockDeviceHistoryRepository::new()),
                clock: Arc::new(clock),
                metrics: Arc::new(MetricsCollector::new()),
            },
            SchedulerConfig::default(),
            RetentionConfig::default(),
        );

        TestApp {
            router: create_app(Arc::new(scheduler), None, &api_config),
            processor,
            broker,
            schedules,
        }
    }

    async fn post(router: Router, body: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_empty_body_runs_process_queues() {
        let app = test_app();

        let (status, body) = post(app.router, "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["action"], "process_queues");
        assert_eq!(body["processed"], 1);
        assert_eq!(app.processor.calls(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_body_runs_process_queues() {
        let app = test_app();

        let (status, body) = post(app.router, "{not json").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "process_queues");
    }

    #[tokio::test]
    async fn test_schedule_recurring_tasks() {
        let app = test_app();

        let (status, body) = post(app.router, r#"{"action":"schedule_recurring_tasks"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "schedule_recurring_tasks");
        assert_eq!(body["scheduled"], 1);
        assert_eq!(body["failed"], 0);
        assert_eq!(app.broker.queue_len("normal_tasks"), 1);
        assert_eq!(app.schedules.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_old_tasks() {
        let app = test_app();

        let (status, body) = post(app.router, r#"{"action":"cleanup_old_tasks"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task_logs_deleted"], 0);
        assert_eq!(body["device_history_deleted"], 0);
    }

    #[tokio::test]
    async fn test_unknown_action_is_bad_request() {
        let app = test_app();

        let (status, body) = post(app.router, r#"{"action":"format_disk"}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Unknown action");
        assert_eq!(app.processor.calls(), 0);
    }

    #[tokio::test]
    async fn test_internal_failure_is_server_error() {
        let app = test_app();
        app.processor.fail(true);

        let (status, body) = post(app.router, r#"{"action":"process_queues"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("mock broker unavailable"));
    }

    #[tokio::test]
    async fn test_non_string_action_is_bad_request() {
        let app = test_app();

        let (status, body) = post(app.router, r#"{"action": 5}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Unknown action");
        assert_eq!(app.processor.calls(), 0);
    }

    #[tokio::test]
    async fn test_slow_action_times_out_with_json_error() {
        let app = test_app_with(ApiConfig {
            request_timeout_seconds: 1,
            ..ApiConfig::default()
        });
        app.processor.set_delay(Duration::from_secs(5));

        let (status, body) = post(app.router, r#"{"action":"process_queues"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("超时"));
        assert_eq!(app.processor.calls(), 1);
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();

        let response = app
            .router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_metrics_disabled() {
        let app = test_app();

        let response = app
            .router
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
