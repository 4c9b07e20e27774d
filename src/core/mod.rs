//! 核心编排层：错误分类、Run 状态机、主控循环

pub mod error;
pub mod orchestrator;
pub mod state;

pub use error::AgentError;
pub use orchestrator::{Orchestrator, DEFAULT_MAX_ITERATIONS};
pub use state::{RunOutcome, RunPhase, RunStatus};
