//! Autopilot CLI
//!
//! 用法：`autopilot [--config <path>] "<query>"`
//! 加载配置、初始化日志，跑一次 Run 并把 RunOutcome 以 JSON 打印到 stdout；Run 失败时退出码为 1。

use std::path::PathBuf;

use anyhow::{bail, Context};
use autopilot::agent::create_agent_components;
use autopilot::config::load_config;

fn parse_args() -> anyhow::Result<(Option<PathBuf>, String)> {
    let mut config_path = None;
    let mut words = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            let path = args.next().context("--config requires a path")?;
            config_path = Some(PathBuf::from(path));
        } else {
            words.push(arg);
        }
    }
    let query = words.join(" ");
    if query.trim().is_empty() {
        bail!("usage: autopilot [--config <path>] \"<query>\"");
    }
    Ok((config_path, query))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    autopilot::observability::init();

    let (config_path, query) = parse_args()?;
    let cfg = load_config(config_path).context("Failed to load config")?;
    let components = create_agent_components(&cfg).context("Failed to create agent")?;

    let outcome = components
        .process_query(&query)
        .await
        .context("Run could not start")?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
