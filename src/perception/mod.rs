//! 感知层：把自由文本查询抽取为结构化的 facts / preferences
//!
//! prompt 中嵌入 schemars 生成的 JSON Schema；从补全中取出 JSON 对象（```json 代码块或首个 `{` 到末个 `}`），
//! 反序列化为强类型结构后再做语义校验（min_price <= max_price）。任一步失败均为 PerceptionFailed。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::GenerationGateway;

/// 查询中可识别的事实；未提及的字段为空
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FactsOutput {
    /// 州 / 地区（可能多个）
    #[serde(default)]
    pub state: Vec<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub fuel_type: Option<String>,
    #[serde(default)]
    pub transmission: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub min_price: Option<i64>,
    #[serde(default)]
    pub max_price: Option<i64>,
}

/// 用户偏好（与宿主工具 schema 的字段命名保持一致）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PreferencesOutput {
    pub state: Vec<String>,
    pub fuel_type: String,
    pub transmission: String,
    #[serde(rename = "minPrice")]
    pub min_price: i64,
    #[serde(rename = "maxPrice")]
    pub max_price: i64,
}

fn schema_json<T: JsonSchema>() -> String {
    let schema = schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}

/// 从补全文本中截取 JSON 对象
pub fn extract_json_block(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end).then(|| &trimmed[start..=end])
}

fn check_price_range(min: Option<i64>, max: Option<i64>) -> Result<(), AgentError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(AgentError::PerceptionFailed(format!(
            "min price {min} is greater than max price {max}"
        ))),
        _ => Ok(()),
    }
}

pub struct Perception {
    gateway: GenerationGateway,
}

impl Perception {
    pub fn new(gateway: GenerationGateway) -> Self {
        Self { gateway }
    }

    pub async fn extract_facts(&self, query: &str) -> Result<FactsOutput, AgentError> {
        let prompt = format!(
            "Extract the facts mentioned in the query below. Respond with a single JSON object \
             matching this JSON Schema and nothing else. Leave fields that are not mentioned empty.\n\n\
             Schema:\n{}\n\nQuery: {}",
            schema_json::<FactsOutput>(),
            query.trim()
        );
        let facts: FactsOutput = self.structured(&prompt).await?;
        check_price_range(facts.min_price, facts.max_price)?;
        tracing::info!(facts = ?facts, "perception extracted facts");
        Ok(facts)
    }

    pub async fn extract_preferences(&self, text: &str) -> Result<PreferencesOutput, AgentError> {
        let prompt = format!(
            "Extract the user's preferences from the text below. Respond with a single JSON object \
             matching this JSON Schema and nothing else.\n\nSchema:\n{}\n\nText: {}",
            schema_json::<PreferencesOutput>(),
            text.trim()
        );
        let prefs: PreferencesOutput = self.structured(&prompt).await?;
        check_price_range(Some(prefs.min_price), Some(prefs.max_price))?;
        Ok(prefs)
    }

    async fn structured<T: DeserializeOwned>(&self, prompt: &str) -> Result<T, AgentError> {
        let completion = self
            .gateway
            .generate(prompt)
            .await
            .map_err(|e| AgentError::PerceptionFailed(e.to_string()))?;
        let block = extract_json_block(&completion).ok_or_else(|| {
            AgentError::PerceptionFailed(format!("no JSON object in completion: {completion}"))
        })?;
        serde_json::from_str(block).map_err(|e| AgentError::PerceptionFailed(format!("{e}: {block}")))
    }
}
