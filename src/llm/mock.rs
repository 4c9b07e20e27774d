//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预置回复；脚本用完后重复最后一条。可配置延迟以触发网关超时，
//! 并记录收到的每条 prompt 与调用次数。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};

/// 脚本化 Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    last: Mutex<Option<Result<String, LlmError>>>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次返回给定回复
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let script = responses.into_iter().map(|r| Ok(r.into())).collect();
        Self {
            script: Mutex::new(script),
            ..Self::default()
        }
    }

    /// 追加一条失败回复
    pub fn push_error(self, err: LlmError) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(err));
        }
        self
    }

    /// 每次调用前先睡眠 delay（模拟慢速或卡死的生成服务）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 调用计数句柄（可在 client 被 Arc 移走后继续观察）
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// 已收到的 prompt 记录句柄
    pub fn prompt_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }

    fn next_response(&self) -> Result<String, LlmError> {
        let mut script = match self.script.lock() {
            Ok(s) => s,
            Err(_) => return Err(LlmError::Provider("mock script poisoned".to_string())),
        };
        let mut last = match self.last.lock() {
            Ok(l) => l,
            Err(_) => return Err(LlmError::Provider("mock script poisoned".to_string())),
        };
        match script.pop_front() {
            Some(r) => {
                *last = Some(r.clone());
                r
            }
            None => last.clone().unwrap_or(Err(LlmError::EmptyResponse)),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_response()
    }
}
