//! 指令解析：把一次模型回复解析为唯一的 Directive
//!
//! 逐行扫描，取第一行以 `FUNCTION_CALL:` / `FINAL_ANSWER:` / `COMPLETE_RUN` 开头的行，其余行全部丢弃。
//! 三种前缀都不匹配时返回 Malformed，由 Orchestrator 决定终止本次 Run。

use serde_json::{Map, Value};

use crate::tools::parse_literal;

pub const FUNCTION_CALL_PREFIX: &str = "FUNCTION_CALL:";
pub const FINAL_ANSWER_PREFIX: &str = "FINAL_ANSWER:";
pub const COMPLETE_RUN_PREFIX: &str = "COMPLETE_RUN";

/// FunctionCall 的原始参数：两种方言
#[derive(Debug, Clone, PartialEq)]
pub enum RawParams {
    /// `name|v1|v2`：按 schema 声明顺序匹配
    Positional(Vec<String>),
    /// `name|a.b=1|c=[1,2]`：点号路径构造嵌套对象，值按字面量解析
    KeyValue(Map<String, Value>),
}

impl RawParams {
    pub fn len(&self) -> usize {
        match self {
            RawParams::Positional(tokens) => tokens.len(),
            RawParams::KeyValue(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    FunctionCall { name: String, params: RawParams },
    /// payload 总是对象：JSON 对象原样，否则包成 {"result": text}
    FinalAnswer { payload: Value },
    CompleteRun,
    Malformed { reason: String },
}

/// 解析一次模型回复
pub fn parse_directive(text: &str) -> Directive {
    let line = text.lines().map(str::trim).find(|l| {
        l.starts_with(FUNCTION_CALL_PREFIX)
            || l.starts_with(FINAL_ANSWER_PREFIX)
            || l.starts_with(COMPLETE_RUN_PREFIX)
    });

    let Some(line) = line else {
        return Directive::Malformed {
            reason: format!("no directive line in response: {}", preview(text, 120)),
        };
    };

    if line.starts_with(COMPLETE_RUN_PREFIX) {
        return Directive::CompleteRun;
    }
    if let Some(rest) = line.strip_prefix(FINAL_ANSWER_PREFIX) {
        return Directive::FinalAnswer {
            payload: parse_final_payload(rest),
        };
    }
    // FUNCTION_CALL: 冒号只切一次，其后的内容（含冒号）都属于 function info
    let function_info = line.split_once(':').map(|(_, r)| r).unwrap_or("");
    parse_function_call(function_info)
}

fn parse_function_call(function_info: &str) -> Directive {
    let mut parts = function_info.split('|').map(str::trim);
    let name = parts.next().unwrap_or("").to_string();
    if name.is_empty() {
        return Directive::Malformed {
            reason: "FUNCTION_CALL without a tool name".to_string(),
        };
    }
    // 空 token 保留占位，只容忍末尾多余的一个 `|`
    let mut tokens: Vec<&str> = parts.collect();
    if tokens.last().is_some_and(|t| t.is_empty()) {
        tokens.pop();
    }

    let params = if !tokens.is_empty() && tokens.iter().all(|t| is_key_value_token(t)) {
        match build_key_value(&tokens) {
            Ok(map) => RawParams::KeyValue(map),
            Err(reason) => return Directive::Malformed { reason },
        }
    } else {
        RawParams::Positional(tokens.into_iter().map(String::from).collect())
    };
    Directive::FunctionCall { name, params }
}

/// `ident(.ident)*=value`
fn is_key_value_token(token: &str) -> bool {
    let Some((key, _)) = token.split_once('=') else {
        return false;
    };
    !key.is_empty()
        && key.split('.').all(|seg| {
            let mut chars = seg.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn build_key_value(tokens: &[&str]) -> Result<Map<String, Value>, String> {
    let mut root = Map::new();
    for token in tokens {
        let (key, raw) = token
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got {token}"))?;
        let value = parse_literal(raw).into_value();
        let segments: Vec<&str> = key.trim().split('.').collect();
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| format!("empty key in {token}"))?;
        let mut current = &mut root;
        for seg in parents {
            let entry = current
                .entry(seg.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = entry
                .as_object_mut()
                .ok_or_else(|| format!("key '{seg}' is both a value and a parent in {key}"))?;
        }
        current.insert(last.to_string(), value);
    }
    Ok(root)
}

fn parse_final_payload(rest: &str) -> Value {
    let text = rest.trim();
    if text.starts_with('{') {
        match serde_json::from_str::<Value>(text) {
            Ok(v @ Value::Object(_)) => return v,
            Ok(_) | Err(_) => {
                tracing::debug!(text = %text, "final answer is not a JSON object, wrapping as text");
            }
        }
    }
    serde_json::json!({ "result": text })
}

fn preview(text: &str, max_chars: usize) -> String {
    let p: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        format!("{p}...")
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_first_directive_line_counts() {
        let text = "Let me think about this.\n  FINAL_ANSWER: 12\nFUNCTION_CALL: add|1|2\n";
        assert_eq!(
            parse_directive(text),
            Directive::FinalAnswer {
                payload: json!({"result": "12"})
            }
        );
    }

    #[test]
    fn test_positional_function_call() {
        let d = parse_directive("FUNCTION_CALL: ex_showroom_price|TATA|HARRIER|DIESEL|AUTOMATIC|PUREXAT");
        assert_eq!(
            d,
            Directive::FunctionCall {
                name: "ex_showroom_price".to_string(),
                params: RawParams::Positional(
                    ["TATA", "HARRIER", "DIESEL", "AUTOMATIC", "PUREXAT"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect()
                ),
            }
        );
    }

    #[test]
    fn test_empty_positional_tokens_are_kept() {
        let d = parse_directive("FUNCTION_CALL: t|x||z");
        assert_eq!(
            d,
            Directive::FunctionCall {
                name: "t".to_string(),
                params: RawParams::Positional(vec!["x".to_string(), String::new(), "z".to_string()]),
            }
        );
        // 末尾多余的一个 `|` 被容忍
        let d = parse_directive("FUNCTION_CALL: t|x|");
        assert_eq!(
            d,
            Directive::FunctionCall {
                name: "t".to_string(),
                params: RawParams::Positional(vec!["x".to_string()]),
            }
        );
    }

    #[test]
    fn test_dotted_keys_build_nested_mapping() {
        let d = parse_directive(
            "FUNCTION_CALL: road_tax_multiplier|input.state=DELHI|input.ex_showroom_price=2303000|input.fuel_type=DIESEL",
        );
        let Directive::FunctionCall { name, params: RawParams::KeyValue(map) } = d else {
            panic!("Expected key=value FunctionCall");
        };
        assert_eq!(name, "road_tax_multiplier");
        assert_eq!(
            Value::Object(map),
            json!({"input": {"state": "DELHI", "ex_showroom_price": 2303000, "fuel_type": "DIESEL"}})
        );
    }

    #[test]
    fn test_nesting_depth_matches_dot_count() {
        let Directive::FunctionCall { params: RawParams::KeyValue(map), .. } =
            parse_directive("FUNCTION_CALL: f|a.b.c=1|x=[73,78]")
        else {
            panic!("Expected key=value FunctionCall");
        };
        assert_eq!(Value::Object(map), json!({"a": {"b": {"c": 1}}, "x": [73, 78]}));
    }

    #[test]
    fn test_mixed_tokens_fall_back_to_positional() {
        let d = parse_directive("FUNCTION_CALL: f|a=1|plain");
        assert!(matches!(
            d,
            Directive::FunctionCall { params: RawParams::Positional(ref t), .. } if t.len() == 2
        ));
    }

    #[test]
    fn test_conflicting_keys_are_malformed() {
        assert!(matches!(
            parse_directive("FUNCTION_CALL: f|a=1|a.b=2"),
            Directive::Malformed { .. }
        ));
    }

    #[test]
    fn test_function_info_keeps_inner_colons() {
        let d = parse_directive("FUNCTION_CALL: echo|http://example.com");
        assert_eq!(
            d,
            Directive::FunctionCall {
                name: "echo".to_string(),
                params: RawParams::Positional(vec!["http://example.com".to_string()]),
            }
        );
    }

    #[test]
    fn test_final_answer_json_object() {
        assert_eq!(
            parse_directive("FINAL_ANSWER: {\"result\": 2579360.0}"),
            Directive::FinalAnswer {
                payload: json!({"result": 2579360.0})
            }
        );
    }

    #[test]
    fn test_final_answer_bad_json_is_wrapped() {
        assert_eq!(
            parse_directive("FINAL_ANSWER: {not json"),
            Directive::FinalAnswer {
                payload: json!({"result": "{not json"})
            }
        );
    }

    #[test]
    fn test_complete_run() {
        assert_eq!(parse_directive("done\nCOMPLETE_RUN"), Directive::CompleteRun);
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(parse_directive("I think the price is 20 lakh"), Directive::Malformed { .. }));
        assert!(matches!(parse_directive("FUNCTION_CALL: |1|2"), Directive::Malformed { .. }));
        assert!(matches!(parse_directive(""), Directive::Malformed { .. }));
    }
}
