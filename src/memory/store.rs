//! 进程内事实记忆：线性列表，无索引、无持久化
//!
//! recall 把整张列表拼进 prompt 交给 Generation Gateway，原样返回补全文本。
//! MemoryStore 是 Arc 句柄，clone 后共享同一列表，可在多个 Run / HTTP 请求间使用。

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::GenerationGateway;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub fact: String,
    /// [0, 1]
    pub importance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl MemoryItem {
    /// importance 截断到 [0, 1]，NaN 视为 0
    pub fn new(fact: impl Into<String>, importance: f64, source: Option<String>) -> Self {
        let importance = if importance.is_nan() {
            0.0
        } else {
            importance.clamp(0.0, 1.0)
        };
        Self {
            fact: fact.into(),
            importance,
            source,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: Arc<RwLock<Vec<MemoryItem>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // 锁中毒时仍取出数据：列表只做 push/clear，不存在半更新状态
    fn read(&self) -> RwLockReadGuard<'_, Vec<MemoryItem>> {
        self.items.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<MemoryItem>> {
        self.items.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn store(&self, item: MemoryItem) {
        // 统一经过 new() 截断，防止反序列化进来的越界值
        let item = MemoryItem::new(item.fact, item.importance, item.source);
        tracing::info!(fact = %item.fact, importance = item.importance, "memory stored");
        self.write().push(item);
    }

    pub fn list(&self) -> Vec<MemoryItem> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// 清空并返回移除的条数；空列表上调用返回 0
    pub fn clear(&self) -> usize {
        let removed = std::mem::take(&mut *self.write()).len();
        tracing::info!(removed, "memory cleared");
        removed
    }

    pub fn recall_prompt(&self, query: &str) -> String {
        let rendered = serde_json::to_string(&*self.read()).unwrap_or_else(|_| "[]".to_string());
        format!("Given the memory: {}, answer : {}", rendered, query)
    }

    /// 全量扫描后交给模型回答，返回其补全原文
    pub async fn recall(&self, query: &str, gateway: &GenerationGateway) -> Result<String, AgentError> {
        let prompt = self.recall_prompt(query);
        tracing::debug!(items = self.len(), "memory recall");
        gateway.generate(&prompt).await
    }
}
