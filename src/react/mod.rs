//! 决策层：指令解析与 prompt 拼装

pub mod directive;
pub mod planner;

pub use directive::{parse_directive, Directive, RawParams};
pub use planner::{Planner, PromptContext, DEFAULT_SYSTEM_PROMPT};
