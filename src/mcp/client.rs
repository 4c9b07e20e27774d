//! 工具宿主会话：ToolHost trait 与基于子进程 stdio 的实现
//!
//! 每次 Run 通过 ToolConnector 打开一个会话（initialize -> tools/list -> 多次 tools/call），
//! 会话在 Run 结束时（无论成功失败）调用 shutdown 关闭；子进程设置 kill_on_drop 兜底。

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::mcp::protocol::{
    call_tool_params, initialize_params, ListToolsResult, McpNotification, McpRequest,
    McpResponse, ServerInfo, ToolInfo,
};

/// 工具宿主协议层错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum McpError {
    #[error("failed to spawn tool host: {0}")]
    Spawn(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("tool host closed the connection")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("tool host did not answer within {0}s")]
    Timeout(u64),
}

impl From<std::io::Error> for McpError {
    fn from(e: std::io::Error) -> Self {
        McpError::Io(e.to_string())
    }
}

/// 工具宿主：一次会话内严格串行使用，故方法取 &mut self
#[async_trait]
pub trait ToolHost: Send {
    /// 能力协商握手
    async fn initialize(&mut self) -> Result<ServerInfo, McpError>;

    async fn list_tools(&mut self) -> Result<Vec<ToolInfo>, McpError>;

    /// 调用工具，返回原始 result（规范化由 ToolExecutor 负责）
    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, McpError>;

    /// 关闭会话；须幂等
    async fn shutdown(&mut self);
}

/// 为每次 Run 建立新的工具会话
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ToolHost>, McpError>;
}

/// 子进程 stdio 上的行分隔 JSON-RPC 会话
pub struct StdioToolHost {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    next_id: u64,
    request_timeout: Duration,
}

impl StdioToolHost {
    /// 启动子进程并接管其 stdin/stdout（stderr 继承，便于查看宿主日志）
    pub fn spawn(
        program: &str,
        args: &[String],
        cwd: Option<&PathBuf>,
        request_timeout: Duration,
    ) -> Result<Self, McpError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let mut child = cmd
            .spawn()
            .map_err(|e| McpError::Spawn(format!("{program}: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Spawn("stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Spawn("stdout not captured".to_string()))?;
        tracing::info!(program = %program, args = ?args, "tool host spawned");
        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stdout: Some(BufReader::new(stdout).lines()),
            next_id: 1,
            request_timeout,
        })
    }

    async fn write_line(&mut self, line: String) -> Result<(), McpError> {
        let stdin = self.stdin.as_mut().ok_or(McpError::Closed)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn notify(&mut self, method: &str) -> Result<(), McpError> {
        let line = serde_json::to_string(&McpNotification::new(method))
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        self.write_line(line).await
    }

    /// 发送请求并读取 id 匹配的响应；其间的通知与非 JSON 输出被跳过
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id;
        self.next_id += 1;
        let line = serde_json::to_string(&McpRequest::new(id, method, params))
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        tracing::debug!(id, method = %method, "mcp request");
        self.write_line(line).await?;

        let secs = self.request_timeout.as_secs();
        let timeout = self.request_timeout;
        let stdout = self.stdout.as_mut().ok_or(McpError::Closed)?;
        tokio::time::timeout(timeout, read_response(stdout, id))
            .await
            .map_err(|_| McpError::Timeout(secs))?
    }
}

async fn read_response(
    stdout: &mut Lines<BufReader<ChildStdout>>,
    id: u64,
) -> Result<Value, McpError> {
    loop {
        let line = stdout.next_line().await?.ok_or(McpError::Closed)?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let response: McpResponse = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(_) => {
                tracing::debug!(line = %trimmed, "skipping non-jsonrpc output from tool host");
                continue;
            }
        };
        if response.id.as_ref().and_then(Value::as_u64) != Some(id) {
            continue;
        }
        if let Some(err) = response.error {
            return Err(McpError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        return response
            .result
            .ok_or_else(|| McpError::Protocol(format!("response {id} has neither result nor error")));
    }
}

#[async_trait]
impl ToolHost for StdioToolHost {
    async fn initialize(&mut self) -> Result<ServerInfo, McpError> {
        let result = self
            .request(
                "initialize",
                initialize_params(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            )
            .await?;
        let info: ServerInfo =
            serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;
        self.notify("notifications/initialized").await?;
        Ok(info)
    }

    async fn list_tools(&mut self) -> Result<Vec<ToolInfo>, McpError> {
        let result = self.request("tools/list", serde_json::json!({})).await?;
        let listed: ListToolsResult =
            serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;
        Ok(listed.tools)
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, McpError> {
        self.request("tools/call", call_tool_params(name, arguments))
            .await
    }

    async fn shutdown(&mut self) {
        // 先关 stdin，让宿主自然退出，再强制回收
        self.stdin.take();
        self.stdout.take();
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                tracing::debug!(error = %e, "tool host already exited");
            }
            tracing::info!("tool host session closed");
        }
    }
}

/// 按配置启动 stdio 宿主的连接器
#[derive(Debug, Clone)]
pub struct StdioConnector {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub request_timeout: Duration,
}

#[async_trait]
impl ToolConnector for StdioConnector {
    async fn connect(&self) -> Result<Box<dyn ToolHost>, McpError> {
        let host = StdioToolHost::spawn(
            &self.program,
            &self.args,
            self.cwd.as_ref(),
            self.request_timeout,
        )?;
        Ok(Box::new(host))
    }
}
