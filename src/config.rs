//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AUTOPILOT__*` 覆盖（双下划线表示嵌套，如 `AUTOPILOT__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::{AgentError, DEFAULT_MAX_ITERATIONS};
use crate::llm::DEFAULT_GENERATION_TIMEOUT_SECS;
use crate::tools::DEFAULT_TOOL_TIMEOUT_SECS;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "AUTOPILOT";

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub agent: AgentSection,
    pub server: ServerSection,
}

/// [app] 段
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// gemini / deepseek / openai / mock；对应 API Key 缺失时退回 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    /// 未设置时使用各后端的默认模型
    pub model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次生成超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    DEFAULT_GENERATION_TIMEOUT_SECS
}

/// [tools] 段：工具宿主进程与调用超时
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_host_command")]
    pub host_command: String,
    #[serde(default = "default_host_args")]
    pub host_args: Vec<String>,
    /// 宿主进程工作目录，未设置时继承当前目录
    pub host_cwd: Option<PathBuf>,
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            host_command: default_host_command(),
            host_args: default_host_args(),
            host_cwd: None,
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_host_command() -> String {
    "python".to_string()
}

fn default_host_args() -> Vec<String> {
    vec!["mcp-server.py".to_string()]
}

fn default_tool_timeout_secs() -> u64 {
    DEFAULT_TOOL_TIMEOUT_SECS
}

/// [agent] 段：迭代上限与 Init 阶段的可选层
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// 是否在 Init 阶段抽取 facts
    #[serde(default = "default_true")]
    pub perception: bool,
    /// 是否在 Init 阶段从记忆召回偏好
    #[serde(default = "default_true")]
    pub recall_memory: bool,
    /// 自定义 system prompt 模板文件（`{tools}` 占位）
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            perception: true,
            recall_memory: true,
            system_prompt_path: None,
        }
    }
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_true() -> bool {
    true
}

/// [server] 段：HTTP 边界
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

impl AppConfig {
    /// 语义校验：反序列化只保证类型正确
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.agent.max_iterations == 0 {
            return Err(AgentError::ConfigError(
                "agent.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.llm.timeouts.request == 0 {
            return Err(AgentError::ConfigError(
                "llm.timeouts.request must be at least 1 second".to_string(),
            ));
        }
        if self.tools.host_command.trim().is_empty() {
            return Err(AgentError::ConfigError("tools.host_command is empty".to_string()));
        }
        Ok(())
    }
}

/// 从 config 目录加载配置，环境变量 AUTOPILOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 AUTOPILOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, AgentError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignoring");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let cfg: AppConfig = builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| AgentError::ConfigError(e.to_string()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.provider, "gemini");
        assert_eq!(cfg.llm.timeouts.request, 10);
        assert_eq!(cfg.tools.host_command, "python");
        assert_eq!(cfg.tools.host_args, vec!["mcp-server.py"]);
        assert_eq!(cfg.tools.tool_timeout_secs, 30);
        assert_eq!(cfg.agent.max_iterations, 10);
        assert!(cfg.agent.perception);
        assert_eq!(cfg.server.bind, "127.0.0.1:5000");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[llm]\nprovider = \"mock\"\n\n[agent]\nmax_iterations = 3\nperception = false\n\n[tools]\nhost_command = \"uv\"\nhost_args = [\"run\", \"server.py\"]"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.llm.timeouts.request, 10);
        assert_eq!(cfg.agent.max_iterations, 3);
        assert!(!cfg.agent.perception);
        assert!(cfg.agent.recall_memory);
        assert_eq!(cfg.tools.host_command, "uv");
        assert_eq!(cfg.tools.host_args, vec!["run", "server.py"]);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[agent]\nmax_iterations = 0").unwrap();

        let err = load_config(Some(file.path().to_path_buf())).unwrap_err();
        assert_eq!(err.kind(), "config_error");
    }
}
