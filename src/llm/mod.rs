//! LLM 层：客户端抽象、各后端实现与带超时的生成网关

pub mod deepseek;
pub mod gateway;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod traits;

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT, DEEPSEEK_REASONER};
pub use gateway::{GenerationGateway, DEFAULT_GENERATION_TIMEOUT_SECS};
pub use gemini::{create_gemini_client, GEMINI_FLASH};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{LlmClient, LlmError};
