//! Autopilot - LLM 驱动的工具调用智能体
//!
//! 模块划分：
//! - **agent**: 无头运行时（按配置组装组件，供 CLI / HTTP 调用）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、Run 状态机、Orchestrator 主控循环
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / DeepSeek / Mock）与 Generation Gateway
//! - **mcp**: 工具宿主协议客户端（JSON-RPC over stdio）
//! - **memory**: 迭代历史与进程级事实记忆
//! - **perception**: 结构化 facts / preferences 抽取
//! - **react**: 指令解析与 prompt 拼装
//! - **tools**: 工具描述、发现、参数转换与调用桥
//! - **server**: HTTP 边界（feature `web`）

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod mcp;
pub mod memory;
pub mod observability;
pub mod perception;
pub mod react;
#[cfg(feature = "web")]
pub mod server;
pub mod tools;

pub use agent::{create_agent_components, AgentComponents};
pub use core::{AgentError, Orchestrator, RunOutcome, RunStatus};
