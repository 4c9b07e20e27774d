//! Generation Gateway：带超时与取消的单次生成调用
//!
//! 每次生成都在独立 tokio 任务中执行，调用方在 select! 中等待「任务完成 / 超时 / 取消」三者之一。
//! 超时或取消时直接丢弃 JoinHandle：底层请求可能仍在飞行，但其迟到的结果永远不会被读取。
//! 网关内部不做重试。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::LlmClient;

/// 默认生成超时（秒）
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 10;

/// 生成网关：持有 LLM 客户端与默认超时，可在多次 Run 之间共享
#[derive(Clone)]
pub struct GenerationGateway {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl GenerationGateway {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 底层客户端的累计 token 使用
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 使用默认超时生成
    pub async fn generate(&self, prompt: &str) -> Result<String, AgentError> {
        self.generate_with_timeout(prompt, self.timeout).await
    }

    pub async fn generate_with_timeout(
        &self,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, AgentError> {
        self.generate_cancellable(prompt, timeout, &CancellationToken::new())
            .await
    }

    /// 生成并同时受 timeout 与 cancel 约束；二者任一先到即返回，不等待底层调用结束
    pub async fn generate_cancellable(
        &self,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let llm = self.llm.clone();
        let prompt = prompt.to_string();
        let start = Instant::now();
        let handle = tokio::spawn(async move { llm.complete(&prompt).await });

        let outcome = tokio::select! {
            joined = handle => match joined {
                Ok(Ok(text)) => Ok(text.trim().to_string()),
                Ok(Err(e)) => Err(AgentError::GatewayProviderError(e.to_string())),
                Err(e) => Err(AgentError::GatewayProviderError(format!("generation task failed: {e}"))),
            },
            _ = tokio::time::sleep(timeout) => Err(AgentError::GatewayTimeout(timeout)),
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(text) => tracing::debug!(elapsed_ms, chars = text.len(), "generation completed"),
            Err(e) => tracing::warn!(elapsed_ms, error = %e, "generation failed"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};

    #[tokio::test]
    async fn test_generate_trims_completion() {
        let gateway = GenerationGateway::new(
            Arc::new(MockLlmClient::with_responses(["  FINAL_ANSWER: 42 \n"])),
            Duration::from_secs(1),
        );
        assert_eq!(gateway.generate("q").await.unwrap(), "FINAL_ANSWER: 42");
    }

    #[tokio::test]
    async fn test_timeout_does_not_wait_for_slow_provider() {
        let slow = MockLlmClient::with_responses(["late"]).with_delay(Duration::from_secs(30));
        let gateway = GenerationGateway::new(Arc::new(slow), Duration::from_millis(50));
        let start = Instant::now();
        let err = gateway.generate("q").await.unwrap_err();
        assert_eq!(err, AgentError::GatewayTimeout(Duration::from_millis(50)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_provider_error_is_mapped() {
        let failing = MockLlmClient::new().push_error(LlmError::Provider("quota".to_string()));
        let gateway = GenerationGateway::new(Arc::new(failing), Duration::from_secs(1));
        match gateway.generate("q").await {
            Err(AgentError::GatewayProviderError(msg)) => assert!(msg.contains("quota")),
            other => panic!("Expected GatewayProviderError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancellation_wins_over_slow_provider() {
        let slow = MockLlmClient::with_responses(["late"]).with_delay(Duration::from_secs(30));
        let gateway = GenerationGateway::new(Arc::new(slow), Duration::from_secs(60));
        let token = CancellationToken::new();
        token.cancel();
        let err = gateway
            .generate_cancellable("q", Duration::from_secs(60), &token)
            .await
            .unwrap_err();
        assert_eq!(err, AgentError::Cancelled);
    }
}
