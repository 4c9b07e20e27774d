//! 可观测性：tracing 订阅器初始化

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// RUST_LOG 未设置时的默认过滤指令
pub const DEFAULT_FILTER: &str = "info";

/// 初始化全局订阅器，日志写 stderr（stdout 留给 RunOutcome JSON）；重复调用静默忽略
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
