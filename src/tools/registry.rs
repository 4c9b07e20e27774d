//! 工具注册表：会话建立时经握手 + list-tools 发现一次，之后只读
//!
//! 描述顺序与宿主返回顺序一致；摘要渲染时单个工具描述失败只降级该条目，不影响其余工具。

use crate::core::AgentError;
use crate::mcp::ToolHost;
use crate::tools::ToolDescriptor;

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// initialize 后 list_tools；任一步失败整个会话不可用
    pub async fn discover(host: &mut dyn ToolHost) -> Result<Self, AgentError> {
        let server = host
            .initialize()
            .await
            .map_err(|e| AgentError::DiscoveryFailure(format!("handshake failed: {e}")))?;
        tracing::info!(
            protocol = server.protocol_version.as_deref().unwrap_or("unknown"),
            server = ?server.server_info,
            "tool host session initialized"
        );

        let infos = host
            .list_tools()
            .await
            .map_err(|e| AgentError::DiscoveryFailure(format!("list tools failed: {e}")))?;
        let tools: Vec<ToolDescriptor> = infos.iter().map(ToolDescriptor::from_info).collect();
        tracing::info!(count = tools.len(), tools = ?tools.iter().map(|t| &t.name).collect::<Vec<_>>(), "tools discovered");
        Ok(Self { tools })
    }

    /// 精确匹配名称
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 每行 `N. name(param: type, ...) - description`
    pub fn summary(&self) -> String {
        self.tools
            .iter()
            .enumerate()
            .map(|(i, tool)| match tool.describe() {
                Ok(line) => format!("{}. {}", i + 1, line),
                Err(e) => {
                    tracing::warn!(tool = %tool.name, error = %e, "failed to describe tool");
                    format!("{}. Error describing tool", i + 1)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
