//! LLM 客户端抽象
//!
//! 后端（OpenAI 兼容 / Gemini / DeepSeek / Mock）只需实现一个操作：给定 prompt 文本，返回补全文本。
//! 超时与取消由 GenerationGateway 统一处理，客户端本身不做重试。

use async_trait::async_trait;
use thiserror::Error;

/// 生成服务返回的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("provider returned an empty completion")]
    EmptyResponse,
}

/// LLM 客户端 trait：complete(prompt) -> text
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// 累计 token 使用：(prompt_tokens, completion_tokens, total_tokens)，默认不统计
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
