//! Agent 错误类型
//!
//! 一次 Run 内的失败全部归入 AgentError；除工具描述失败（降级为占位）外，
//! 任何迭代内错误都会被 Orchestrator 记录进历史并终止本次 Run，不做重试。

use std::time::Duration;

use thiserror::Error;

/// Run 过程中可能出现的错误（生成超时、工具发现、参数转换、调用、指令格式、迭代上限等）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Generation timed out after {}s", .0.as_secs_f64())]
    GatewayTimeout(Duration),

    #[error("Generation provider error: {0}")]
    GatewayProviderError(String),

    #[error("Cancelled")]
    Cancelled,

    /// 握手或 list-tools 失败，整个会话不可用
    #[error("Tool discovery failed: {0}")]
    DiscoveryFailure(String),

    #[error("Unknown tool: {name} (available: {})", .available.join(", "))]
    UnknownTool { name: String, available: Vec<String> },

    #[error("Missing parameter '{parameter}' for {tool}")]
    MissingParameter { tool: String, parameter: String },

    #[error("Type mismatch for parameter '{parameter}': expected {expected}, got {value:?}")]
    TypeMismatch {
        parameter: String,
        expected: String,
        value: String,
    },

    #[error("Malformed directive: {0}")]
    MalformedDirective(String),

    #[error("Tool {tool} failed: {message}")]
    InvocationError { tool: String, message: String },

    /// 预期内的终止条件：模型始终未给出终止指令
    #[error("Iteration budget exhausted after {max_iterations} iterations")]
    IterationBudgetExhausted {
        max_iterations: usize,
        last_result: Option<String>,
    },

    #[error("Perception failed: {0}")]
    PerceptionFailed(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AgentError {
    /// 机器可读的错误类别（HTTP 响应 / RunOutcome 序列化用）
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::GatewayTimeout(_) => "gateway_timeout",
            AgentError::GatewayProviderError(_) => "gateway_provider_error",
            AgentError::Cancelled => "cancelled",
            AgentError::DiscoveryFailure(_) => "discovery_failure",
            AgentError::UnknownTool { .. } => "unknown_tool",
            AgentError::MissingParameter { .. } => "missing_parameter",
            AgentError::TypeMismatch { .. } => "type_mismatch",
            AgentError::MalformedDirective(_) => "malformed_directive",
            AgentError::InvocationError { .. } => "invocation_error",
            AgentError::IterationBudgetExhausted { .. } => "iteration_budget_exhausted",
            AgentError::PerceptionFailed(_) => "perception_failed",
            AgentError::ConfigError(_) => "config_error",
        }
    }
}
