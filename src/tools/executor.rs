//! 工具调用桥
//!
//! 借用会话级的 ToolHost 与 ToolRegistry：resolve 精确匹配工具名，invoke 在超时内发出一次 tools/call，
//! 将原始结果归一化为字符串（content 序列渲染为 `[a, b]`）。每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::core::AgentError;
use crate::mcp::ToolHost;
use crate::tools::{ToolDescriptor, ToolRegistry};

/// 默认单次工具调用超时（秒）
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

pub struct ToolExecutor<'a> {
    registry: &'a ToolRegistry,
    host: &'a mut dyn ToolHost,
    timeout: Duration,
}

impl<'a> ToolExecutor<'a> {
    pub fn new(registry: &'a ToolRegistry, host: &'a mut dyn ToolHost, timeout: Duration) -> Self {
        Self {
            registry,
            host,
            timeout,
        }
    }

    /// 按名称精确查找；未找到时错误中列出全部可用工具
    pub fn resolve(&self, name: &str) -> Result<&'a ToolDescriptor, AgentError> {
        self.registry.get(name).ok_or_else(|| AgentError::UnknownTool {
            name: name.to_string(),
            available: self.registry.names(),
        })
    }

    /// 调用并返回归一化结果；宿主报错、isError、超时均为 InvocationError
    pub async fn invoke(&mut self, name: &str, arguments: Map<String, Value>) -> Result<String, AgentError> {
        self.resolve(name)?;
        let arguments = Value::Object(arguments);
        let args_preview = args_preview(&arguments);
        let start = Instant::now();

        let result = timeout(self.timeout, self.host.call_tool(name, arguments)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(raw)) if is_error_result(raw) => (false, "tool_error"),
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(raw)) => {
                let normalized = normalize_result(&raw);
                if is_error_result(&raw) {
                    Err(AgentError::InvocationError {
                        tool: name.to_string(),
                        message: normalized,
                    })
                } else {
                    tracing::debug!(tool = name, result = %normalized, "tool result");
                    Ok(normalized)
                }
            }
            Ok(Err(e)) => Err(AgentError::InvocationError {
                tool: name.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(AgentError::InvocationError {
                tool: name.to_string(),
                message: format!("timed out after {}s", self.timeout.as_secs()),
            }),
        }
    }
}

fn is_error_result(raw: &Value) -> bool {
    raw.get("isError").and_then(Value::as_bool).unwrap_or(false)
}

/// content 序列：逐项取 text，没有 text 的项用其 JSON 文本；否则使用结果本身的文本形式
pub fn normalize_result(raw: &Value) -> String {
    if let Some(items) = raw.get("content").and_then(Value::as_array) {
        let parts: Vec<String> = items
            .iter()
            .map(|item| match item.get("text").and_then(Value::as_str) {
                Some(text) => text.to_string(),
                None => item.to_string(),
            })
            .collect();
        return format!("[{}]", parts.join(", "));
    }
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
