//! 工具宿主协议（MCP over stdio）：JSON-RPC 帧、会话 trait 与实现

pub mod client;
pub mod mock;
pub mod protocol;

pub use client::{McpError, StdioConnector, StdioToolHost, ToolConnector, ToolHost};
pub use mock::{MockConnector, MockProbe, MockToolHost};
pub use protocol::{ServerInfo, ToolInfo};
