//! 记忆层：单次 Run 的迭代历史 + 进程级事实记忆

pub mod history;
pub mod store;

pub use history::{IterationRecord, RecordOutcome};
pub use store::{MemoryItem, MemoryStore};
