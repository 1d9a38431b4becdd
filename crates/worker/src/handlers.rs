use std::time::{Duration, Instant};

use async_trait::async_trait;
use scheduler_config::HttpHandlerConfig;
use scheduler_domain::entities::TaskEnvelope;
use scheduler_domain::services::TaskHandler;
use scheduler_errors::{SchedulerError, SchedulerResult};
use tracing::{error, info};

/// HTTP任务处理器
///
/// 把任务信封以JSON形式POST到配置的地址，非2xx响应视为执行失败。
pub struct HttpTaskHandler {
    name: String,
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpTaskHandler {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &HttpHandlerConfig) -> SchedulerResult<Self> {
        if config.url.trim().is_empty() {
            return Err(SchedulerError::config_error(format!(
                "任务类型 {} 的处理器地址为空",
                config.task_type
            )));
        }
        Ok(Self::new(
            format!("http:{}", config.task_type),
            config.url.clone(),
            Duration::from_secs(config.timeout_seconds),
        ))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TaskHandler for HttpTaskHandler {
    async fn handle(&self, envelope: &TaskEnvelope) -> SchedulerResult<()> {
        let start_time = Instant::now();

        info!("执行HTTP任务: task_id={}, url={}", envelope.id, self.url);

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(envelope)
            .send()
            .await
            .map_err(|e| {
                error!("HTTP任务执行失败: task_id={}, error={}", envelope.id, e);
                SchedulerError::task_execution(format!("HTTP请求失败: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SchedulerError::task_execution(format!(
                "HTTP请求失败，状态码: {}",
                status.as_u16()
            )));
        }

        info!(
            "HTTP任务执行完成: task_id={}, status={}, duration={}ms",
            envelope.id,
            status.as_u16(),
            start_time.elapsed().as_millis()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
