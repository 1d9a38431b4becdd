use anyhow::{Context, Result};
use clap::{Arg, Command};
use scheduler_config::{AppConfig, LogFormat};
use scheduler_dispatcher::SchedulerAction;
use scheduler_infrastructure::init_logging;
use serde_json::json;
use tokio::signal;
use tracing::{error, info};

mod app;

use app::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("priority-scheduler")
        .version(env!("CARGO_PKG_VERSION"))
        .about("优先级任务队列与周期调度服务")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，不指定时依次查找默认位置"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式: serve 启动HTTP触发服务, run 执行一次动作后退出")
                .value_parser(["serve", "run"])
                .default_value("serve"),
        )
        .arg(
            Arg::new("action")
                .short('a')
                .long("action")
                .value_name("ACTION")
                .help("run 模式下执行的动作")
                .value_parser([
                    "process_queues",
                    "schedule_recurring_tasks",
                    "cleanup_old_tasks",
                ])
                .default_value("process_queues"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mode = matches
        .get_one::<String>("mode")
        .map(String::as_str)
        .unwrap_or("serve");
    let action = matches
        .get_one::<String>("action")
        .map(String::as_str)
        .unwrap_or("process_queues");

    // 加载配置
    let config = AppConfig::load(config_path)
        .with_context(|| format!("加载配置失败: {}", config_path.unwrap_or("<默认位置>")))?;

    // 初始化日志系统
    let log_level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.observability.log_level.clone());
    let log_format = match matches.get_one::<String>("log-format") {
        Some(format) => format.parse::<LogFormat>().map_err(anyhow::Error::msg)?,
        None => config.observability.log_format,
    };
    init_logging(&log_level, log_format)?;

    info!("启动优先级任务调度服务");
    info!("运行模式: {mode}");

    let app = Application::new(config).await?;

    match mode {
        "run" => {
            let action: SchedulerAction = action.parse()?;
            match app.run_once(action).await {
                Ok(response) => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
                Err(e) => {
                    println!(
                        "{}",
                        json!({ "success": false, "error": format!("{e:#}") })
                    );
                    return Err(e);
                }
            }
        }
        _ => {
            app.serve(wait_for_shutdown_signal()).await?;
        }
    }

    info!("优先级任务调度服务已退出");
    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号，开始优雅关闭");
        },
        _ = terminate => {
            info!("收到SIGTERM信号，开始优雅关闭");
        },
    }
}
