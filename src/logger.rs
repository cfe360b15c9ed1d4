//! 日志初始化
//!
//! 日志写到 stderr，stdout 留给评测结果输出。

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 安装全局日志订阅者，`RUST_LOG` 优先
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 LOJ 远程评测启动");
    info!(
        "启动时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("📡 站点: {}", config.loj_addr);
    info!("👤 用户: {}", config.username);
    info!(
        "⏱ 轮询间隔: {} ms, 结果等待: {} ms",
        config.poll_interval_ms, config.result_wait_ms
    );
    info!("{}", "=".repeat(60));
}
