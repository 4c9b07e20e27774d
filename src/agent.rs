//! Headless Agent 运行时
//!
//! 供 CLI 与 HTTP 前端调用：create_agent_components 按配置构建 LLM / Generation Gateway / 工具宿主连接器 / 记忆，
//! process_query 对单条查询新建一个 Orchestrator 跑完一次 Run 并返回 RunOutcome。
//! 组件可在多次 Run 之间共享（MemoryStore 为进程级），Orchestrator 的跨迭代状态不跨 Run。

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::core::{AgentError, Orchestrator, RunOutcome};
use crate::llm::{
    create_deepseek_client, create_gemini_client, GenerationGateway, LlmClient, MockLlmClient,
    OpenAiClient,
};
use crate::mcp::{StdioConnector, ToolConnector};
use crate::memory::{MemoryItem, MemoryStore};
use crate::perception::{Perception, PreferencesOutput};

const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// 偏好写入的默认重要度与来源
pub const DEFAULT_PREFERENCE_IMPORTANCE: f64 = 0.9;
pub const DEFAULT_PREFERENCE_SOURCE: &str = "api";

/// 根据 provider 与环境变量选择 LLM 后端；对应 Key 缺失时退回 Mock 并告警
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let model = cfg.llm.model.as_deref();
    let has_key = |var: &str| std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false);

    match provider.as_str() {
        "gemini" if has_key("GEMINI_API_KEY") => {
            let client = create_gemini_client(model);
            tracing::info!("Using Gemini LLM ({})", client.model());
            Arc::new(client)
        }
        "deepseek" if has_key("DEEPSEEK_API_KEY") => {
            let client = create_deepseek_client(model);
            tracing::info!("Using DeepSeek LLM ({})", client.model());
            Arc::new(client)
        }
        "openai" if has_key("OPENAI_API_KEY") => {
            let model = model.unwrap_or(OPENAI_DEFAULT_MODEL);
            tracing::info!("Using OpenAI LLM ({})", model);
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                model,
                std::env::var("OPENAI_API_KEY").ok().as_deref(),
            ))
        }
        "mock" => {
            tracing::info!("Using Mock LLM");
            Arc::new(MockLlmClient::with_responses(["COMPLETE_RUN"]))
        }
        other => {
            tracing::warn!(provider = other, "No API key set or provider unknown, using Mock LLM");
            Arc::new(MockLlmClient::with_responses(["COMPLETE_RUN"]))
        }
    }
}

/// 每次 Run 的参数（来自 [agent] / [tools] 段）
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub max_iterations: usize,
    pub tool_timeout: Duration,
    pub perception: bool,
    pub recall_memory: bool,
    pub system_template: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: crate::core::DEFAULT_MAX_ITERATIONS,
            tool_timeout: Duration::from_secs(crate::tools::DEFAULT_TOOL_TIMEOUT_SECS),
            perception: true,
            recall_memory: true,
            system_template: None,
        }
    }
}

/// 预构建的 Agent 组件，可多请求共享
#[derive(Clone)]
pub struct AgentComponents {
    pub gateway: GenerationGateway,
    pub connector: Arc<dyn ToolConnector>,
    pub memory: MemoryStore,
    pub settings: AgentSettings,
}

impl AgentComponents {
    pub fn new(
        gateway: GenerationGateway,
        connector: Arc<dyn ToolConnector>,
        memory: MemoryStore,
        settings: AgentSettings,
    ) -> Self {
        Self {
            gateway,
            connector,
            memory,
            settings,
        }
    }

    /// 为一次 Run 构建新的 Orchestrator
    pub fn orchestrator(&self) -> Orchestrator {
        let mut orch = Orchestrator::new(self.gateway.clone())
            .with_max_iterations(self.settings.max_iterations)
            .with_tool_timeout(self.settings.tool_timeout);
        if self.settings.perception {
            orch = orch.with_perception(Perception::new(self.gateway.clone()));
        }
        if self.settings.recall_memory {
            orch = orch.with_memory(self.memory.clone());
        }
        if let Some(template) = &self.settings.system_template {
            orch = orch.with_system_template(template.clone());
        }
        orch
    }

    /// 处理单条查询：跑完一次 Run
    pub async fn process_query(&self, query: &str) -> Result<RunOutcome, AgentError> {
        let mut orch = self.orchestrator();
        orch.run(query, self.connector.as_ref()).await
    }

    /// 写入一条偏好记忆。启用感知时先抽取结构化偏好（含价格区间校验），
    /// 抽取失败只告警，原文照常写入
    pub async fn store_preference(
        &self,
        text: &str,
        importance: Option<f64>,
        source: Option<String>,
    ) -> (MemoryItem, Option<PreferencesOutput>) {
        let structured = if self.settings.perception {
            match Perception::new(self.gateway.clone()).extract_preferences(text).await {
                Ok(prefs) => Some(prefs),
                Err(e) => {
                    tracing::warn!(error = %e, "preference extraction failed, storing raw text");
                    None
                }
            }
        } else {
            None
        };
        let item = MemoryItem::new(
            text.trim(),
            importance.unwrap_or(DEFAULT_PREFERENCE_IMPORTANCE),
            Some(source.unwrap_or_else(|| DEFAULT_PREFERENCE_SOURCE.to_string())),
        );
        self.memory.store(item.clone());
        (item, structured)
    }
}

/// 从配置创建 Agent 组件；自定义 prompt 模板文件读取失败视为配置错误
pub fn create_agent_components(cfg: &AppConfig) -> Result<AgentComponents, AgentError> {
    let llm = create_llm_from_config(cfg);
    let gateway = GenerationGateway::new(llm, Duration::from_secs(cfg.llm.timeouts.request));
    let tool_timeout = Duration::from_secs(cfg.tools.tool_timeout_secs);

    let connector = StdioConnector {
        program: cfg.tools.host_command.clone(),
        args: cfg.tools.host_args.clone(),
        cwd: cfg.tools.host_cwd.clone(),
        request_timeout: tool_timeout,
    };

    let system_template = match &cfg.agent.system_prompt_path {
        Some(path) => Some(std::fs::read_to_string(path).map_err(|e| {
            AgentError::ConfigError(format!("cannot read system prompt {}: {e}", path.display()))
        })?),
        None => None,
    };

    Ok(AgentComponents::new(
        gateway,
        Arc::new(connector),
        MemoryStore::new(),
        AgentSettings {
            max_iterations: cfg.agent.max_iterations,
            tool_timeout,
            perception: cfg.agent.perception,
            recall_memory: cfg.agent.recall_memory,
            system_template,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunStatus;
    use crate::mcp::{MockConnector, MockToolHost};
    use serde_json::json;

    fn components(responses: &[&str]) -> AgentComponents {
        let llm = MockLlmClient::with_responses(responses.iter().copied());
        let connector = MockConnector::new(MockToolHost::new().with_text_tool(
            "echo",
            "Echo text",
            json!({"type": "object", "properties": {"text": {"type": "string"}}}),
            "hello",
        ));
        AgentComponents::new(
            GenerationGateway::new(Arc::new(llm), Duration::from_secs(1)),
            Arc::new(connector),
            MemoryStore::new(),
            AgentSettings {
                perception: false,
                ..AgentSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn test_process_query() {
        let agent = components(&["FUNCTION_CALL: echo|hello", "FINAL_ANSWER: {\"said\": \"hello\"}"]);
        let outcome = agent.process_query("say hello").await.unwrap();
        assert_eq!(outcome.status, RunStatus::Answered);
        assert_eq!(outcome.payload, Some(json!({"said": "hello"})));
    }

    #[test]
    fn test_settings_default_matches_config_default() {
        let cfg = AppConfig::default();
        let settings = AgentSettings::default();
        assert_eq!(settings.perception, cfg.agent.perception);
        assert_eq!(settings.recall_memory, cfg.agent.recall_memory);
        assert_eq!(settings.max_iterations, cfg.agent.max_iterations);
    }

    #[tokio::test]
    async fn test_store_preference_extracts_structured_preferences() {
        let mut agent = components(&[
            r#"{"state": ["DELHI"], "fuel_type": "DIESEL", "transmission": "AUTOMATIC", "minPrice": 1500000, "maxPrice": 2500000}"#,
        ]);
        agent.settings.perception = true;

        let (item, structured) = agent
            .store_preference("Diesel automatic in Delhi, 15 to 25 lakh", None, None)
            .await;
        assert_eq!(item.importance, DEFAULT_PREFERENCE_IMPORTANCE);
        assert_eq!(item.source.as_deref(), Some(DEFAULT_PREFERENCE_SOURCE));
        let prefs = structured.unwrap();
        assert_eq!(prefs.state, vec!["DELHI"]);
        assert_eq!(prefs.max_price, 2500000);
        assert_eq!(agent.memory.len(), 1);
    }

    #[tokio::test]
    async fn test_store_preference_keeps_text_when_extraction_fails() {
        let mut agent = components(&[
            r#"{"state": [], "fuel_type": "PETROL", "transmission": "MANUAL", "minPrice": 900000, "maxPrice": 100000}"#,
        ]);
        agent.settings.perception = true;

        let (item, structured) = agent
            .store_preference(" Petrol manual ", Some(0.3), Some("user".to_string()))
            .await;
        assert!(structured.is_none());
        assert_eq!(item.fact, "Petrol manual");
        assert_eq!(item.importance, 0.3);
        assert_eq!(agent.memory.list(), vec![item]);
    }

    #[tokio::test]
    async fn test_store_preference_without_perception_skips_model() {
        let llm = MockLlmClient::with_responses(["unused"]);
        let calls = llm.call_counter();
        let mut agent = components(&[]);
        agent.gateway = GenerationGateway::new(Arc::new(llm), Duration::from_secs(1));

        let (_, structured) = agent.store_preference("Prefers SUVs", None, None).await;
        assert!(structured.is_none());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_mock_provider_selected() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        let components = create_agent_components(&cfg).unwrap();
        assert_eq!(components.settings.max_iterations, 10);
        assert_eq!(components.gateway.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_missing_prompt_file_is_config_error() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        cfg.agent.system_prompt_path = Some("/nonexistent/prompt.txt".into());
        assert!(matches!(
            create_agent_components(&cfg),
            Err(AgentError::ConfigError(_))
        ));
    }
}
