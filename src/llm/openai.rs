//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；Gemini、DeepSeek、OpenAI 均走此实现。
//! prompt 作为单条 user 消息发送，取首个 choice 的 content。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            usage: TokenUsage::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.to_string())
            .build()
            .map_err(|e| LlmError::Provider(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![ChatCompletionRequestMessage::User(message)])
            .build()
            .map_err(|e| LlmError::Provider(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Provider(e.to_string()))?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
            tracing::debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "llm usage"
            );
        }

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}
