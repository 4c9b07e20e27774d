//! Gemini 客户端（走 Google 的 OpenAI 兼容端点）

use crate::llm::OpenAiClient;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const GEMINI_FLASH: &str = "gemini-2.0-flash";

/// 创建 Gemini 客户端；API Key 取自 `GEMINI_API_KEY`，模型默认 gemini-2.0-flash
pub fn create_gemini_client(model: Option<&str>) -> OpenAiClient {
    let api_key = std::env::var("GEMINI_API_KEY").ok();
    let model = model.unwrap_or(GEMINI_FLASH);
    OpenAiClient::new(Some(GEMINI_BASE_URL), model, api_key.as_deref())
}
