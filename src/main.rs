use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tagengine_core::config::AppConfig;
use tagengine_dispatcher::{JobService, ScheduleController};
use tagengine_infrastructure::{
    create_pool, MetricsCollector, PostgresConfigRepository, PostgresJobRepository,
    PostgresShardRepository, QueueFactory,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("tagengine")
        .version("1.0.0")
        .about("异步批量元数据打标作业协调系统")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let log_level = matches.get_one::<String>("log-level").unwrap();
    let log_format = matches.get_one::<String>("log-format").unwrap();

    // 初始化日志系统
    init_logging(log_level, log_format)?;

    info!("启动打标作业协调系统");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    // 加载配置
    let config = AppConfig::load(config_path).context("加载配置失败")?;

    // 指标导出
    if config.observability.metrics_enabled {
        let addr: std::net::SocketAddr = config
            .observability
            .metrics_bind_address
            .parse()
            .context("解析metrics监听地址失败")?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("安装Prometheus导出器失败")?;
        info!("指标端点: http://{addr}/metrics");
    }

    // 数据库与迁移
    let pool = create_pool(&config.database).await.context("连接数据库失败")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("执行数据库迁移失败")?;

    // 组装服务
    let job_repo = Arc::new(PostgresJobRepository::new(pool.clone()));
    let shard_repo = Arc::new(PostgresShardRepository::new(pool.clone()));
    let config_repo = Arc::new(PostgresConfigRepository::new(pool.clone()));
    let work_queue = QueueFactory::create(&config.work_queue)
        .await
        .context("构建工作队列失败")?;
    let metrics = Arc::new(MetricsCollector::new());

    let job_service = Arc::new(JobService::new(
        job_repo,
        shard_repo,
        work_queue,
        config.work_queue.job_handler_uri.clone(),
        metrics,
    ));

    if !config.dispatcher.enabled {
        warn!("调度器被禁用，进程将只保持指标端点存活");
        wait_for_shutdown_signal().await;
        return Ok(());
    }

    let controller = Arc::new(ScheduleController::new(
        config_repo,
        job_service,
        Duration::from_secs(config.dispatcher.schedule_interval_seconds),
    ));

    // 启动调度循环
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller_handle = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            if let Err(e) = controller.run(shutdown_rx).await {
                error!("调度控制器退出: {e}");
            }
        })
    };

    // 等待关闭信号
    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(Duration::from_secs(30), controller_handle).await {
        Ok(result) => {
            if let Err(e) = result {
                error!("调度控制器关闭时发生错误: {e}");
            } else {
                info!("调度控制器已优雅关闭");
            }
        }
        Err(_) => {
            warn!("调度控制器关闭超时，强制退出");
        }
    }

    info!("打标作业协调系统已退出");
    Ok(())
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("安装Ctrl+C信号处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("安装SIGTERM信号处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
