//! Autopilot HTTP 服务
//!
//! 启动: cargo run --bin autopilot-web --features web
//! 监听地址取自配置 [server].bind（默认 127.0.0.1:5000）

#[cfg(feature = "web")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::sync::Arc;

    use anyhow::Context;
    use autopilot::agent::create_agent_components;
    use autopilot::config::load_config;
    use autopilot::server::{create_router, AppState};

    autopilot::observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let components = create_agent_components(&cfg).context("Failed to create agent")?;
    let app = create_router(Arc::new(AppState { components }));

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.server.bind))?;
    tracing::info!("Autopilot server listening on http://{}", cfg.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(not(feature = "web"))]
fn main() {
    eprintln!("请使用 --features web 编译: cargo run --bin autopilot-web --features web");
    std::process::exit(1);
}
