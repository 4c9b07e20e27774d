//! Orchestrator：一次 Run 的主控循环，唯一持有跨迭代状态的组件
//!
//! Init：连接工具宿主 -> 发现工具 -> 可选感知/记忆召回（失败只告警）。
//! 每轮：拼 prompt -> Generation Gateway -> 解析指令 -> 调用工具或终止。
//! 迭代内任何错误都记入历史并以 Failed 结束，不做重试；会话在所有退出路径上都会关闭。

use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::core::{AgentError, RunOutcome, RunPhase, RunStatus};
use crate::llm::GenerationGateway;
use crate::mcp::{ToolConnector, ToolHost};
use crate::memory::{IterationRecord, MemoryStore};
use crate::perception::Perception;
use crate::react::{parse_directive, Directive, Planner, PromptContext};
use crate::tools::{coerce, ToolExecutor, ToolRegistry, DEFAULT_TOOL_TIMEOUT_SECS};

/// 默认迭代上限
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// 跨迭代状态；每次 Run 开始与结束时清空
#[derive(Debug, Default)]
struct RunState {
    phase: RunPhase,
    iteration: usize,
    history: Vec<IterationRecord>,
    last_result: Option<String>,
}

/// Init 阶段收集到的上下文
#[derive(Debug, Default)]
struct RunContext {
    facts: Option<Value>,
    preferences: Option<String>,
}

pub struct Orchestrator {
    gateway: GenerationGateway,
    perception: Option<Perception>,
    memory: Option<MemoryStore>,
    system_template: Option<String>,
    max_iterations: usize,
    tool_timeout: Duration,
    cancel: CancellationToken,
    state: RunState,
}

impl Orchestrator {
    pub fn new(gateway: GenerationGateway) -> Self {
        Self {
            gateway,
            perception: None,
            memory: None,
            system_template: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            cancel: CancellationToken::new(),
            state: RunState::default(),
        }
    }

    pub fn with_perception(mut self, perception: Perception) -> Self {
        self.perception = Some(perception);
        self
    }

    /// 非空时在 Init 阶段召回偏好，写入 prompt 的 Preferences 段
    pub fn with_memory(mut self, memory: MemoryStore) -> Self {
        self.memory = Some(memory);
        self
    }

    /// 自定义 system prompt 模板（`{tools}` 占位）
    pub fn with_system_template(mut self, template: impl Into<String>) -> Self {
        self.system_template = Some(template.into());
        self
    }

    /// 至少为 1
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn phase(&self) -> RunPhase {
        self.state.phase
    }

    pub fn iteration(&self) -> usize {
        self.state.iteration
    }

    pub fn history(&self) -> &[IterationRecord] {
        &self.state.history
    }

    fn reset(&mut self) {
        self.state = RunState::default();
    }

    /// 执行一次 Run。连接或工具发现失败返回 Err（此时尚未调用模型）；其余失败体现为 Failed 的 RunOutcome
    pub async fn run(&mut self, query: &str, connector: &dyn ToolConnector) -> Result<RunOutcome, AgentError> {
        self.reset();
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("run", run_id = %run_id);

        async {
            tracing::info!(query = %query, max_iterations = self.max_iterations, "run started");
            let mut host = connector
                .connect()
                .await
                .map_err(|e| AgentError::DiscoveryFailure(format!("failed to start tool host: {e}")))?;

            let result = self.run_session(&run_id, query, host.as_mut()).await;
            host.shutdown().await;
            self.reset();

            let (prompt_tokens, completion_tokens, total_tokens) = self.gateway.token_usage();
            match &result {
                Ok(outcome) => tracing::info!(
                    status = ?outcome.status,
                    iterations = outcome.iterations,
                    prompt_tokens,
                    completion_tokens,
                    total_tokens,
                    "run finished"
                ),
                Err(e) => tracing::error!(error = %e, "run aborted"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_session(
        &mut self,
        run_id: &str,
        query: &str,
        host: &mut dyn ToolHost,
    ) -> Result<RunOutcome, AgentError> {
        let registry = ToolRegistry::discover(host).await?;
        let summary = registry.summary();
        let planner = match &self.system_template {
            Some(template) => Planner::with_template(template, &summary),
            None => Planner::new(&summary),
        };
        let context = self.gather_context(query).await;

        let mut executor = ToolExecutor::new(&registry, host, self.tool_timeout);

        while self.state.iteration < self.max_iterations {
            if self.cancel.is_cancelled() {
                return Ok(self.fail(run_id, AgentError::Cancelled));
            }

            self.state.phase = RunPhase::AwaitingModel;
            let prompt = planner.compose(&PromptContext {
                query,
                facts: context.facts.as_ref(),
                preferences: context.preferences.as_deref(),
                history: &self.state.history,
            });
            tracing::debug!(iteration = self.state.iteration + 1, prompt = %prompt, "prompt");

            let generated = self
                .gateway
                .generate_cancellable(&prompt, self.gateway.timeout(), &self.cancel)
                .await;
            self.state.iteration += 1;
            let index = self.state.iteration;

            let text = match generated {
                Ok(text) => text,
                Err(e) => {
                    self.state.history.push(IterationRecord::error(index, None, None, &e));
                    return Ok(self.fail(run_id, e));
                }
            };
            tracing::debug!(iteration = index, response = %text, "model response");

            match parse_directive(&text) {
                Directive::FunctionCall { name, params } => {
                    self.state.phase = RunPhase::Invoking;
                    let tool = match executor.resolve(&name) {
                        Ok(tool) => tool,
                        Err(e) => return Ok(self.record_failure(run_id, index, Some(name.as_str()), None, e)),
                    };
                    let arguments = match coerce(&params, tool) {
                        Ok(args) => args,
                        Err(e) => return Ok(self.record_failure(run_id, index, Some(name.as_str()), None, e)),
                    };
                    tracing::info!(iteration = index, tool = %name, arguments = %serde_json::Value::Object(arguments.clone()), "invoking tool");

                    match executor.invoke(&name, arguments.clone()).await {
                        Ok(result) => {
                            self.state.history.push(IterationRecord::result(
                                index,
                                &name,
                                Value::Object(arguments),
                                result.clone(),
                            ));
                            self.state.last_result = Some(result);
                        }
                        Err(e) => {
                            return Ok(self.record_failure(
                                run_id,
                                index,
                                Some(name.as_str()),
                                Some(Value::Object(arguments)),
                                e,
                            ))
                        }
                    }
                }
                Directive::FinalAnswer { payload } => {
                    tracing::info!(iteration = index, payload = %payload, "final answer");
                    return Ok(self.finish(run_id, RunStatus::Answered, Some(payload), None));
                }
                Directive::CompleteRun => {
                    tracing::info!(iteration = index, "run completed by model");
                    return Ok(self.finish(run_id, RunStatus::Completed, None, None));
                }
                Directive::Malformed { reason } => {
                    let e = AgentError::MalformedDirective(reason);
                    return Ok(self.record_failure(run_id, index, None, None, e));
                }
            }
        }

        let exhausted = AgentError::IterationBudgetExhausted {
            max_iterations: self.max_iterations,
            last_result: self.state.last_result.clone(),
        };
        Ok(self.fail(run_id, exhausted))
    }

    /// 感知与记忆召回；任一失败只告警并省略对应上下文
    async fn gather_context(&self, query: &str) -> RunContext {
        let mut context = RunContext::default();

        if let Some(perception) = &self.perception {
            match perception.extract_facts(query).await {
                Ok(facts) => context.facts = serde_json::to_value(&facts).ok(),
                Err(e) => tracing::warn!(error = %e, "perception failed, continuing without facts"),
            }
        }

        if let Some(memory) = self.memory.as_ref().filter(|m| !m.is_empty()) {
            match memory.recall(query, &self.gateway).await {
                Ok(preferences) => context.preferences = Some(preferences),
                Err(e) => tracing::warn!(error = %e, "memory recall failed, continuing without preferences"),
            }
        }
        context
    }

    fn record_failure(
        &mut self,
        run_id: &str,
        index: usize,
        tool: Option<&str>,
        arguments: Option<Value>,
        error: AgentError,
    ) -> RunOutcome {
        tracing::warn!(iteration = index, tool = tool.unwrap_or("-"), error = %error, "iteration failed");
        self.state
            .history
            .push(IterationRecord::error(index, tool, arguments, &error));
        self.fail(run_id, error)
    }

    fn fail(&mut self, run_id: &str, error: AgentError) -> RunOutcome {
        tracing::error!(error = %error, kind = error.kind(), "run failed");
        self.finish(run_id, RunStatus::Failed, None, Some(error))
    }

    fn finish(
        &mut self,
        run_id: &str,
        status: RunStatus,
        payload: Option<Value>,
        error: Option<AgentError>,
    ) -> RunOutcome {
        self.state.phase = status.into();
        RunOutcome {
            run_id: run_id.to_string(),
            status,
            payload,
            last_result: self.state.last_result.clone(),
            iterations: self.state.iteration,
            history: std::mem::take(&mut self.state.history),
            error_kind: error.as_ref().map(AgentError::kind),
            error,
        }
    }
}
