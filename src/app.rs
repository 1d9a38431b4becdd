use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use scheduler_api::create_app;
use scheduler_config::AppConfig;
use scheduler_dispatcher::{ActionResponse, Scheduler, SchedulerAction, SchedulerDependencies};
use scheduler_domain::clock::{Clock, SystemClock};
use scheduler_domain::repositories::{
    DeviceHistoryRepository, ScheduleRepository, TaskLogRepository,
};
use scheduler_infrastructure::{
    create_pool, init_metrics, run_migrations, BrokerFactory, InMemoryDeviceHistoryRepository,
    InMemoryScheduleRepository, InMemoryTaskLogRepository, MetricsCollector,
    PostgresDeviceHistoryRepository, PostgresScheduleRepository, PostgresTaskLogRepository,
};
use scheduler_worker::{retry_policy_from_config, HandlerRegistry, TaskProcessor};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::{info, warn};

struct Repositories {
    schedules: Arc<dyn ScheduleRepository>,
    task_logs: Arc<dyn TaskLogRepository>,
    device_history: Arc<dyn DeviceHistoryRepository>,
}

/// 主应用程序
///
/// 所有客户端在这里构造一次，之后注入到调度器和任务处理器。
pub struct Application {
    config: AppConfig,
    scheduler: Arc<Scheduler>,
    metrics_handle: Option<PrometheusHandle>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序，消息代理: {:?}", config.broker.r#type);

        // 记录器必须先于采集器安装
        let metrics_handle = if config.observability.metrics_enabled {
            Some(init_metrics()?)
        } else {
            None
        };
        let metrics = Arc::new(MetricsCollector::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let pool = create_database_pool(&config).await?;

        let broker = BrokerFactory::create(&config.broker, pool.clone(), clock.clone(), metrics.clone())
            .await
            .context("创建消息代理失败")?;

        let repositories = match &pool {
            Some(pool) => Repositories {
                schedules: Arc::new(PostgresScheduleRepository::new(pool.clone())),
                task_logs: Arc::new(PostgresTaskLogRepository::new(pool.clone())),
                device_history: Arc::new(PostgresDeviceHistoryRepository::new(pool.clone())),
            },
            None => {
                warn!("未配置数据库，调度定义与执行日志仅保存在内存中");
                Repositories {
                    schedules: Arc::new(InMemoryScheduleRepository::new()),
                    task_logs: Arc::new(InMemoryTaskLogRepository::new()),
                    device_history: Arc::new(InMemoryDeviceHistoryRepository),
                }
            }
        };

        let registry = HandlerRegistry::from_config(&config.handlers).context("注册任务处理器失败")?;
        if registry.is_empty() {
            warn!("没有注册任何任务处理器，弹出的任务都会记为失败");
        }

        let processor = TaskProcessor::new(
            broker.clone(),
            Arc::new(registry),
            repositories.task_logs.clone(),
            clock.clone(),
            metrics.clone(),
        )
        .with_retry_policy(retry_policy_from_config(&config.retry))
        .with_max_tasks_per_queue(config.processor.max_tasks_per_queue);

        let scheduler = Scheduler::new(
            SchedulerDependencies {
                broker,
                processor: Arc::new(processor),
                schedule_repository: repositories.schedules,
                task_log_repository: repositories.task_logs,
                device_history_repository: repositories.device_history,
                clock,
                metrics,
            },
            config.scheduler.clone(),
            config.retention.clone(),
        );

        Ok(Self {
            config,
            scheduler: Arc::new(scheduler),
            metrics_handle,
        })
    }

    /// 执行一次调度动作
    pub async fn run_once(&self, action: SchedulerAction) -> Result<ActionResponse> {
        self.scheduler
            .execute(action)
            .await
            .with_context(|| format!("执行调度动作失败: {action}"))
    }

    /// 启动HTTP触发服务，直到 `shutdown` 完成
    pub async fn serve<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let bind_address = &self.config.api.bind_address;
        let app = create_app(
            self.scheduler.clone(),
            self.metrics_handle.clone(),
            &self.config.api,
        );

        let listener = TcpListener::bind(bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {bind_address}"))?;
        info!("HTTP触发服务监听于: {}", bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP服务运行失败")?;

        info!("HTTP触发服务已停止");
        Ok(())
    }
}

/// 需要时创建数据库连接池
///
/// 内存消息代理且未配置数据库地址时返回 None。
async fn create_database_pool(config: &AppConfig) -> Result<Option<PgPool>> {
    if !config.broker.requires_database() && config.database.url.trim().is_empty() {
        return Ok(None);
    }

    let pool = create_pool(&config.database)
        .await
        .context("创建数据库连接池失败")?;

    if config.database.run_migrations {
        run_migrations(&pool).await.context("执行数据库迁移失败")?;
    }

    Ok(Some(pool))
}
