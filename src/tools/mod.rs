//! 工具层：描述、发现、参数转换与调用桥（工具实现本身在外部宿主进程中）

pub mod coerce;
pub mod descriptor;
pub mod executor;
pub mod registry;

pub use coerce::{coerce, coerce_text, coerce_value, parse_literal, Literal};
pub use descriptor::{ParamSpec, ParamType, ToolDescriptor};
pub use executor::{normalize_result, ToolExecutor, DEFAULT_TOOL_TIMEOUT_SECS};
pub use registry::ToolRegistry;
