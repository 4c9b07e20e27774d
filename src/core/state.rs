//! Run 状态机与结果投影
//!
//! Init -> AwaitingModel -> (Invoking -> AwaitingModel)* -> Answered | Completed | Failed

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::core::AgentError;
use crate::memory::IterationRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Init,
    AwaitingModel,
    Invoking,
    Answered,
    Completed,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Answered | RunPhase::Completed | RunPhase::Failed)
    }
}

/// 终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Answered,
    Completed,
    Failed,
}

impl From<RunStatus> for RunPhase {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Answered => RunPhase::Answered,
            RunStatus::Completed => RunPhase::Completed,
            RunStatus::Failed => RunPhase::Failed,
        }
    }
}

/// 一次 Run 的最终结果；history 为本次 Run 的完整迭代记录（失败时保留已完成部分）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<String>,
    pub iterations: usize,
    pub history: Vec<IterationRecord>,
    #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
    pub error: Option<AgentError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

fn serialize_error<S: Serializer>(error: &Option<AgentError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => s.serialize_str(&e.to_string()),
        None => s.serialize_none(),
    }
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status != RunStatus::Failed
    }
}
