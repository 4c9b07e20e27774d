//! Planner：拼装每轮发给模型的 prompt
//!
//! system prompt 模板中的 `{tools}` 由 ToolRegistry 的能力摘要替换；
//! 每轮 prompt = system prompt + 可选 Facts/Preferences + Query + 历史记录 + "What should I do next?"。

use serde_json::Value;

use crate::memory::IterationRecord;

/// 工具摘要占位符
pub const TOOLS_PLACEHOLDER: &str = "{tools}";

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a decision agent solving a task in iterations. You have access to various tools.

Available tools:
{tools}

You must respond with EXACTLY ONE line in one of these formats (no additional text):

1. For function calls, positional values in the declared parameter order:
FUNCTION_CALL: function_name|value1|value2|...

   or key=value pairs, with dotted keys for nested inputs:
FUNCTION_CALL: function_name|param1=value1|input.param2=value2|...

   For list-type inputs use square brackets: input.int_list=[73,78,68,73,65]

2. For final answers:
FINAL_ANSWER: [number or JSON object]

3. When the task is done and there is nothing to report:
COMPLETE_RUN

Important:
- Use exactly one FUNCTION_CALL or FINAL_ANSWER per step.
- Do not repeat function calls with the same parameters.
- Do not include explanatory text or formatting.
- When a function returns multiple values, you must process all of them.

Examples:
- FUNCTION_CALL: variants|input.brand=TATA|input.model=HARRIER|input.fuel_type=DIESEL|input.transmission=AUTOMATIC
- FUNCTION_CALL: ex_showroom_price|TATA|HARRIER|DIESEL|AUTOMATIC|PUREXAT
- FUNCTION_CALL: road_tax_multiplier|input.state=DELHI|input.ex_showroom_price=2303000|input.fuel_type=DIESEL
- FUNCTION_CALL: on_road_price|input.ex_showroom_price=2303000|input.road_tax_multiplier=1.12
- FINAL_ANSWER: 2579360.0
- COMPLETE_RUN

DO NOT include any explanations or extra text.
Your entire response must be a single line starting with FUNCTION_CALL:, FINAL_ANSWER: or COMPLETE_RUN"#;

/// 单轮 prompt 的上下文（均为借用，Planner 本身无状态）
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptContext<'a> {
    pub query: &'a str,
    pub facts: Option<&'a Value>,
    pub preferences: Option<&'a str>,
    pub history: &'a [IterationRecord],
}

/// Planner：持有已替换工具摘要的 system prompt
#[derive(Debug, Clone)]
pub struct Planner {
    system_prompt: String,
}

impl Planner {
    /// 使用默认模板
    pub fn new(tools_summary: &str) -> Self {
        Self::with_template(DEFAULT_SYSTEM_PROMPT, tools_summary)
    }

    /// 自定义模板；模板中没有 `{tools}` 时把摘要追加到末尾
    pub fn with_template(template: &str, tools_summary: &str) -> Self {
        let system_prompt = if template.contains(TOOLS_PLACEHOLDER) {
            template.replace(TOOLS_PLACEHOLDER, tools_summary)
        } else {
            format!("{}\n\nAvailable tools:\n{}", template.trim_end(), tools_summary)
        };
        Self { system_prompt }
    }

    pub fn compose(&self, ctx: &PromptContext<'_>) -> String {
        let mut prompt = String::with_capacity(self.system_prompt.len() + 256);
        prompt.push_str(&self.system_prompt);
        prompt.push_str("\n\n");

        if let Some(facts) = ctx.facts {
            prompt.push_str(&format!("Facts: {}\n\n", facts));
        }
        if let Some(prefs) = ctx.preferences.filter(|p| !p.trim().is_empty()) {
            prompt.push_str(&format!("Preferences: {}\n\n", prefs.trim()));
        }
        prompt.push_str(&format!("Query: {}", ctx.query.trim()));

        for record in ctx.history {
            prompt.push('\n');
            prompt.push_str(&record.to_prompt_line());
        }
        prompt.push_str("\n\nWhat should I do next?");
        prompt
    }
}
