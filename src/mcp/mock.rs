//! 内存中的工具宿主（用于测试，无需子进程）
//!
//! 预置工具目录与每个工具的回复；记录每次 tools/call 的参数，暴露 shutdown 标记，
//! 可开关「list-tools 失败」以模拟发现阶段故障。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::mcp::{McpError, ServerInfo, ToolConnector, ToolHost, ToolInfo};

/// 单个工具的处理函数：输入 arguments，返回原始 result 或错误信息
pub type ToolHandler = Arc<dyn Fn(&Value) -> Result<Value, McpError> + Send + Sync>;

/// 所有 Mock 会话共享的观测点
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    pub calls: Arc<Mutex<Vec<(String, Value)>>>,
    pub shutdowns: Arc<AtomicUsize>,
    pub sessions: Arc<AtomicUsize>,
}

impl MockProbe {
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct MockToolHost {
    tools: Vec<ToolInfo>,
    handlers: HashMap<String, ToolHandler>,
    fail_listing: bool,
    closed: Arc<AtomicBool>,
    probe: MockProbe,
}

impl MockToolHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具：schema 为 inputSchema，handler 决定 tools/call 的返回
    pub fn with_tool<F>(mut self, name: &str, description: &str, schema: Value, handler: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, McpError> + Send + Sync + 'static,
    {
        self.tools.push(ToolInfo {
            name: name.to_string(),
            description: Some(description.to_string()),
            input_schema: schema,
        });
        self.handlers.insert(name.to_string(), Arc::new(handler));
        self
    }

    /// 注册一个总是返回单条文本 content 的工具
    pub fn with_text_tool(self, name: &str, description: &str, schema: Value, text: &str) -> Self {
        let text = text.to_string();
        self.with_tool(name, description, schema, move |_| {
            Ok(serde_json::json!({ "content": [{ "type": "text", "text": text.clone() }] }))
        })
    }

    /// tools/list 直接报错
    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn probe(&self) -> MockProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl ToolHost for MockToolHost {
    async fn initialize(&mut self) -> Result<ServerInfo, McpError> {
        Ok(ServerInfo {
            protocol_version: Some(crate::mcp::protocol::PROTOCOL_VERSION.to_string()),
            server_info: Some(serde_json::json!({ "name": "mock" })),
            capabilities: Some(serde_json::json!({ "tools": {} })),
        })
    }

    async fn list_tools(&mut self) -> Result<Vec<ToolInfo>, McpError> {
        if self.fail_listing {
            return Err(McpError::Rpc {
                code: -32603,
                message: "list-tools unavailable".to_string(),
            });
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, McpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::Closed);
        }
        if let Ok(mut calls) = self.probe.calls.lock() {
            calls.push((name.to_string(), arguments.clone()));
        }
        let handler = self.handlers.get(name).ok_or_else(|| McpError::Rpc {
            code: -32601,
            message: format!("no such tool: {name}"),
        })?;
        handler(&arguments)
    }

    async fn shutdown(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.probe.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// 每次 connect 克隆一份模板宿主，得到独立会话
pub struct MockConnector {
    template: MockToolHost,
    fail_connect: bool,
}

impl MockConnector {
    pub fn new(template: MockToolHost) -> Self {
        Self {
            template,
            fail_connect: false,
        }
    }

    /// connect 本身失败（宿主无法启动）
    pub fn unreachable() -> Self {
        Self {
            template: MockToolHost::new(),
            fail_connect: true,
        }
    }

    pub fn probe(&self) -> MockProbe {
        self.template.probe()
    }
}

#[async_trait]
impl ToolConnector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn ToolHost>, McpError> {
        if self.fail_connect {
            return Err(McpError::Spawn("mock host unreachable".to_string()));
        }
        self.template.probe.sessions.fetch_add(1, Ordering::SeqCst);
        let mut host = self.template.clone();
        host.closed = Arc::new(AtomicBool::new(false));
        Ok(Box::new(host))
    }
}
