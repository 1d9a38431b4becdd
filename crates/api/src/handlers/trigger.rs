use axum::{body::Bytes, extract::State, Json};
use scheduler_dispatcher::{ActionResponse, SchedulerAction};
use scheduler_errors::SchedulerError;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{ApiError, ApiResult},
    routes::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    pub action: Option<Value>,
}

impl TriggerRequest {
    /// 解析请求体，空或无法解析时按缺省动作处理
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                if !body.is_empty() {
                    debug!("请求体无法解析，使用默认动作: {}", e);
                }
                Self::default()
            }
        }
    }

    /// `action` 缺失或为 null 时使用缺省动作，非字符串视为未知动作
    pub fn action(&self) -> ApiResult<SchedulerAction> {
        match &self.action {
            None | Some(Value::Null) => Ok(SchedulerAction::default()),
            Some(Value::String(action)) => Ok(action.parse::<SchedulerAction>()?),
            Some(other) => Err(SchedulerError::UnknownAction(other.to_string()).into()),
        }
    }
}

/// 执行调度动作
pub async fn trigger_action(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<ActionResponse>> {
    let action = TriggerRequest::from_body(&body).action()?;
    let response = tokio::time::timeout(state.request_timeout, state.scheduler.execute(action))
        .await
        .map_err(|_| ApiError::Timeout(state.request_timeout.as_secs()))??;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_body_defaults_to_process_queues() {
        assert_eq!(
            TriggerRequest::from_body(b"").action().unwrap(),
            SchedulerAction::ProcessQueues
        );
        assert_eq!(
            TriggerRequest::from_body(b"not json").action().unwrap(),
            SchedulerAction::ProcessQueues
        );
        assert_eq!(
            TriggerRequest::from_body(br#"{"other": 1}"#).action().unwrap(),
            SchedulerAction::ProcessQueues
        );
    }

    #[test]
    fn test_action_is_parsed() {
        let request = TriggerRequest::from_body(br#"{"action": "cleanup_old_tasks"}"#);
        assert_eq!(request.action().unwrap(), SchedulerAction::CleanupOldTasks);

        let request = TriggerRequest::from_body(br#"{"action": "reboot"}"#);
        assert!(request.action().is_err());
    }

    #[test]
    fn test_null_action_defaults_to_process_queues() {
        let request = TriggerRequest::from_body(br#"{"action": null}"#);
        assert_eq!(request.action().unwrap(), SchedulerAction::ProcessQueues);
    }

    #[test]
    fn test_non_string_action_is_unknown() {
        let bodies: [&[u8]; 3] = [
            br#"{"action": 5}"#,
            br#"{"action": ["process_queues"]}"#,
            br#"{"action": true}"#,
        ];
        for body in bodies {
            let result = TriggerRequest::from_body(body).action();
            assert!(matches!(
                result,
                Err(ApiError::Scheduler(SchedulerError::UnknownAction(_)))
            ));
        }
    }
}
