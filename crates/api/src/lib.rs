//! # Scheduler API
//!
//! 调度器的HTTP触发入口，通常由 cron 或基础设施调用。
//!
//! ## API 端点
//!
//! - `POST /` - 执行调度动作，请求体 `{"action": "..."}`，缺省为 `process_queues`
//! - `GET /health` - 健康检查
//! - `GET /metrics` - Prometheus 指标
//!
//! ## 响应格式
//!
//! ### 成功响应
//! ```json
//! { "success": true, "action": "schedule_recurring_tasks", "scheduled": 2, "failed": 0, "evaluated": 5 }
//! ```
//!
//! ### 错误响应
//! ```json
//! { "success": false, "error": "Unknown action" }
//! ```
//!
//! 未知动作返回 400，其余错误返回 500。动作执行超过 `api.request_timeout_seconds`
//! 时同样返回 500 的错误响应。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use scheduler_config::ApiConfig;
use scheduler_dispatcher::Scheduler;
use tower::ServiceBuilder;

use middleware::{cors_layer, request_logging, trace_layer};
use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(
    scheduler: Arc<Scheduler>,
    metrics_handle: Option<PrometheusHandle>,
    api_config: &ApiConfig,
) -> Router {
    let state = AppState {
        scheduler,
        metrics_handle,
        request_timeout: Duration::from_secs(api_config.request_timeout_seconds),
    };

    let router = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    );

    if api_config.cors_enabled {
        router.layer(cors_layer(&api_config.cors_origins))
    } else {
        router
    }
}
