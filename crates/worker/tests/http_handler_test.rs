#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use scheduler_config::HttpHandlerConfig;
    use scheduler_domain::entities::TaskEnvelope;
    use scheduler_domain::services::TaskHandler;
    use scheduler_errors::SchedulerError;
    use scheduler_testing_utils::EnvelopeBuilder;
    use scheduler_worker::HttpTaskHandler;

    type Received = Arc<Mutex<Vec<TaskEnvelope>>>;

    async fn spawn_server(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/tasks",
                post(
                    move |State(received): State<Received>, Json(envelope): Json<TaskEnvelope>| async move {
                        received.lock().unwrap().push(envelope);
                        status
                    },
                ),
            )
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/tasks"), received)
    }

    #[tokio::test]
    async fn test_posts_envelope_as_json() {
        let (url, received) = spawn_server(StatusCode::OK).await;
        let handler = HttpTaskHandler::new("http:test", url, Duration::from_secs(5));

        let envelope = EnvelopeBuilder::new()
            .with_id("t1")
            .with_payload_field("schedule_id", serde_json::json!("s1"))
            .build();
        handler.handle(&envelope).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], envelope);
    }

    #[tokio::test]
    async fn test_non_success_status_is_failure() {
        let (url, _received) = spawn_server(StatusCode::INTERNAL_SERVER_ERROR).await;
        let handler = HttpTaskHandler::new("http:test", url, Duration::from_secs(5));

        let result = handler.handle(&EnvelopeBuilder::new().build()).await;

        match result {
            Err(SchedulerError::TaskExecution(message)) => assert!(message.contains("500")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let handler = HttpTaskHandler::new(
            "http:test",
            format!("http://{addr}/tasks"),
            Duration::from_secs(2),
        );
        let result = handler.handle(&EnvelopeBuilder::new().build()).await;

        assert!(matches!(result, Err(SchedulerError::TaskExecution(_))));
    }

    #[test]
    fn test_from_config() {
        let handler = HttpTaskHandler::from_config(&HttpHandlerConfig {
            task_type: "home_assistant.scheduled_action".to_string(),
            url: "http://localhost:8123/api/run".to_string(),
            timeout_seconds: 10,
        })
        .unwrap();

        assert_eq!(handler.name(), "http:home_assistant.scheduled_action");
        assert_eq!(handler.url(), "http://localhost:8123/api/run");
    }
}
