//! MCP 协议帧：JSON-RPC 2.0 请求/响应与 tools/list、tools/call 的数据结构

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Serialize)]
pub struct McpRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl McpRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }
}

/// 无 id 的通知（如 notifications/initialized）
#[derive(Debug, Serialize)]
pub struct McpNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl McpNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct McpResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// tools/list 中的单个工具记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolInfo>,
}

/// initialize 的响应中我们关心的部分
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerInfo {
    #[serde(rename = "protocolVersion", default)]
    pub protocol_version: Option<String>,
    #[serde(rename = "serverInfo", default)]
    pub server_info: Option<Value>,
    #[serde(default)]
    pub capabilities: Option<Value>,
}

pub fn initialize_params(client_name: &str, client_version: &str) -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": client_name,
            "version": client_version
        }
    })
}

pub fn call_tool_params(name: &str, arguments: Value) -> Value {
    serde_json::json!({
        "name": name,
        "arguments": arguments
    })
}
