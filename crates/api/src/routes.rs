use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use scheduler_dispatcher::Scheduler;
use std::sync::Arc;
use std::time::Duration;

use crate::handlers::{health::health_check, metrics::render_metrics, trigger::trigger_action};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    /// 未启用指标时为 None
    pub metrics_handle: Option<PrometheusHandle>,
    /// 单次调度动作的最长执行时间
    pub request_timeout: Duration,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/", post(trigger_action))
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}
