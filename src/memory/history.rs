//! 迭代历史：每轮一条记录，只追加，只用于拼装后续 prompt

use serde::Serialize;
use serde_json::Value;

/// 一轮迭代的结果：工具归一化结果或错误描述
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Result(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    /// 从 1 开始
    pub index: usize,
    pub tool: Option<String>,
    pub arguments: Option<Value>,
    pub outcome: RecordOutcome,
}

impl IterationRecord {
    pub fn result(index: usize, tool: &str, arguments: Value, result: String) -> Self {
        Self {
            index,
            tool: Some(tool.to_string()),
            arguments: Some(arguments),
            outcome: RecordOutcome::Result(result),
        }
    }

    pub fn error(index: usize, tool: Option<&str>, arguments: Option<Value>, error: impl ToString) -> Self {
        Self {
            index,
            tool: tool.map(str::to_string),
            arguments,
            outcome: RecordOutcome::Error(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, RecordOutcome::Error(_))
    }

    /// 渲染为 prompt 中的一行
    pub fn to_prompt_line(&self) -> String {
        match &self.outcome {
            RecordOutcome::Result(result) => {
                let tool = self.tool.as_deref().unwrap_or("unknown");
                let args = self
                    .arguments
                    .as_ref()
                    .map(Value::to_string)
                    .unwrap_or_else(|| "{}".to_string());
                format!(
                    "In the {} iteration you called {} with {} parameters, and the function returned {}.",
                    self.index, tool, args, result
                )
            }
            RecordOutcome::Error(error) => format!("Error in iteration {}: {}", self.index, error),
        }
    }
}
