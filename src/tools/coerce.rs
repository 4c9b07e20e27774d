//! 参数转换：把指令里的原始参数映射为符合工具 schema 的类型化参数
//!
//! - 位置参数：按 schema 声明顺序逐个消费，少于参数个数即 MissingParameter
//! - key=value：必填参数须出现；顶层基本类型参数按声明类型转换，嵌套对象原样透传
//!
//! 字面量解析统一走 parse_literal，返回带标签的 Literal，不依赖异常式的类型猜测。

use serde_json::{Map, Value};

use crate::core::AgentError;
use crate::react::RawParams;
use crate::tools::{ParamSpec, ParamType, ToolDescriptor};

/// 字面量解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    List(Vec<Literal>),
}

impl Literal {
    pub fn into_value(self) -> Value {
        match self {
            Literal::Integer(i) => Value::from(i),
            Literal::Float(f) => float_value(f),
            Literal::Bool(b) => Value::Bool(b),
            Literal::Text(s) => Value::String(s),
            Literal::List(items) => Value::Array(items.into_iter().map(Literal::into_value).collect()),
        }
    }
}

fn float_value(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// 解析单个字面量：整数、浮点、布尔、引号字符串、方括号列表，其余为去空白文本
pub fn parse_literal(raw: &str) -> Literal {
    let s = raw.trim();
    if s.len() >= 2 && s.starts_with('[') && s.ends_with(']') {
        let inner = &s[1..s.len() - 1];
        if inner.trim().is_empty() {
            return Literal::List(Vec::new());
        }
        return Literal::List(split_top_level(inner).into_iter().map(parse_literal).collect());
    }
    if let Some(unquoted) = strip_quotes(s) {
        return Literal::Text(unquoted.to_string());
    }
    match s {
        "true" | "True" => return Literal::Bool(true),
        "false" | "False" => return Literal::Bool(false),
        _ => {}
    }
    if let Ok(i) = s.parse::<i64>() {
        return Literal::Integer(i);
    }
    if looks_numeric(s) {
        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() {
                return Literal::Float(f);
            }
        }
    }
    Literal::Text(s.to_string())
}

fn strip_quotes(s: &str) -> Option<&str> {
    if s.len() < 2 {
        return None;
    }
    let first = s.chars().next()?;
    if (first == '"' || first == '\'') && s.ends_with(first) {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

/// 排除 "inf" / "NaN" 这类 f64 能解析但不是数字字面量的文本
fn looks_numeric(s: &str) -> bool {
    !s.is_empty()
        && s.chars().any(|c| c.is_ascii_digit())
        && s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}

/// 按顶层逗号切分（忽略嵌套方括号与引号内的逗号）
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn mismatch(param: &str, expected: ParamType, value: impl ToString) -> AgentError {
    AgentError::TypeMismatch {
        parameter: param.to_string(),
        expected: expected.as_str().to_string(),
        value: value.to_string(),
    }
}

/// 把指令参数转换为工具调用参数
pub fn coerce(raw: &RawParams, tool: &ToolDescriptor) -> Result<Map<String, Value>, AgentError> {
    match raw {
        RawParams::Positional(tokens) => coerce_positional(tokens, tool),
        RawParams::KeyValue(map) => coerce_key_value(map, tool),
    }
}

fn coerce_positional(tokens: &[String], tool: &ToolDescriptor) -> Result<Map<String, Value>, AgentError> {
    let mut args = Map::new();
    for (i, param) in tool.params.iter().enumerate() {
        let token = tokens.get(i).ok_or_else(|| AgentError::MissingParameter {
            tool: tool.name.clone(),
            parameter: param.name.clone(),
        })?;
        args.insert(param.name.clone(), coerce_text(param, token)?);
    }
    if tokens.len() > tool.params.len() {
        tracing::warn!(
            tool = %tool.name,
            extra = tokens.len() - tool.params.len(),
            "ignoring surplus positional parameters"
        );
    }
    Ok(args)
}

fn coerce_key_value(map: &Map<String, Value>, tool: &ToolDescriptor) -> Result<Map<String, Value>, AgentError> {
    if let Some(missing) = tool
        .params
        .iter()
        .find(|p| p.required && !map.contains_key(&p.name))
    {
        return Err(AgentError::MissingParameter {
            tool: tool.name.clone(),
            parameter: missing.name.clone(),
        });
    }
    let mut args = Map::new();
    for (key, value) in map {
        let coerced = match tool.param(key) {
            Some(param) => coerce_value(param, value)?,
            None => value.clone(),
        };
        args.insert(key.clone(), coerced);
    }
    Ok(args)
}

/// 位置参数的文本值按声明类型转换
pub fn coerce_text(param: &ParamSpec, raw: &str) -> Result<Value, AgentError> {
    let text = raw.trim();
    match param.param_type {
        ParamType::Integer => text
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| mismatch(&param.name, ParamType::Integer, text)),
        ParamType::Number => parse_number(text)
            .map(float_value)
            .ok_or_else(|| mismatch(&param.name, ParamType::Number, text)),
        ParamType::Boolean => parse_bool(text)
            .map(Value::Bool)
            .ok_or_else(|| mismatch(&param.name, ParamType::Boolean, text)),
        ParamType::Array => coerce_array_text(param, text),
        ParamType::String => Ok(Value::String(text.to_string())),
        // 内联 JSON 对象原样解析，否则按文本透传
        ParamType::Object => Ok(serde_json::from_str::<Value>(text)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| Value::String(text.to_string()))),
    }
}

/// 已解析的值（key=value 方言）按声明类型转换
pub fn coerce_value(param: &ParamSpec, value: &Value) -> Result<Value, AgentError> {
    match (param.param_type, value) {
        (ParamType::Object, v) => Ok(v.clone()),
        (_, Value::String(s)) => coerce_text(param, s),
        (ParamType::Integer, Value::Number(n)) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f))
                    .map(|f| f as i64)
            })
            .map(Value::from)
            .ok_or_else(|| mismatch(&param.name, ParamType::Integer, n)),
        (ParamType::Number, Value::Number(n)) => n
            .as_f64()
            .map(float_value)
            .ok_or_else(|| mismatch(&param.name, ParamType::Number, n)),
        (ParamType::Boolean, Value::Bool(b)) => Ok(Value::Bool(*b)),
        (ParamType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
        (ParamType::Array, Value::Array(items)) => {
            let element = ParamSpec::new(param.name.clone(), param.element_type());
            items
                .iter()
                .map(|item| coerce_value(&element, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        (expected, other) => Err(mismatch(&param.name, expected, other)),
    }
}

/// 数组既接受 "[1,2,3]" 也接受 "1,2,3"
fn coerce_array_text(param: &ParamSpec, text: &str) -> Result<Value, AgentError> {
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(text);
    if inner.trim().is_empty() {
        return Ok(Value::Array(Vec::new()));
    }
    let element = ParamSpec::new(param.name.clone(), param.element_type());
    split_top_level(inner)
        .into_iter()
        .map(|item| {
            let item = item.trim();
            let item = strip_quotes(item).unwrap_or(item);
            coerce_text(&element, item)
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn parse_number(text: &str) -> Option<f64> {
    if !looks_numeric(text) {
        return None;
    }
    text.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" => Some(true),
        "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::ToolInfo;
    use crate::react::{parse_directive, Directive};
    use serde_json::json;

    fn tool(schema: Value) -> ToolDescriptor {
        ToolDescriptor::from_info(&ToolInfo {
            name: "t".to_string(),
            description: None,
            input_schema: schema,
        })
    }

    fn positional(tokens: &[&str]) -> RawParams {
        RawParams::Positional(tokens.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn test_parse_literal_variants() {
        assert_eq!(parse_literal(" 42 "), Literal::Integer(42));
        assert_eq!(parse_literal("1.12"), Literal::Float(1.12));
        assert_eq!(parse_literal("True"), Literal::Bool(true));
        assert_eq!(parse_literal("'DELHI'"), Literal::Text("DELHI".to_string()));
        assert_eq!(parse_literal("DELHI "), Literal::Text("DELHI".to_string()));
        assert_eq!(parse_literal("inf"), Literal::Text("inf".to_string()));
        assert_eq!(
            parse_literal("[73,78, [1,2], 'a,b']"),
            Literal::List(vec![
                Literal::Integer(73),
                Literal::Integer(78),
                Literal::List(vec![Literal::Integer(1), Literal::Integer(2)]),
                Literal::Text("a,b".to_string()),
            ])
        );
        assert_eq!(parse_literal("[]"), Literal::List(vec![]));
    }

    #[test]
    fn test_positional_typed_conversion() {
        let t = tool(json!({"properties": {
            "a": {"type": "integer"},
            "b": {"type": "number"},
            "c": {"type": "string"}
        }}));
        let args = coerce(&positional(&["7", "1.5", " hello "]), &t).unwrap();
        assert_eq!(Value::Object(args), json!({"a": 7, "b": 1.5, "c": "hello"}));
    }

    #[test]
    fn test_positional_missing_parameter() {
        let t = tool(json!({"properties": {"a": {"type": "integer"}, "b": {"type": "integer"}}}));
        let err = coerce(&positional(&["1"]), &t).unwrap_err();
        assert_eq!(
            err,
            AgentError::MissingParameter {
                tool: "t".to_string(),
                parameter: "b".to_string()
            }
        );
    }

    #[test]
    fn test_positional_consumes_exactly_schema_count() {
        let t = tool(json!({"properties": {"a": {"type": "string"}}}));
        let args = coerce(&positional(&["x", "y", "z"]), &t).unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args["a"], json!("x"));
    }

    #[test]
    fn test_type_mismatch_names_parameter() {
        let t = tool(json!({"properties": {"count": {"type": "integer"}}}));
        match coerce(&positional(&["many"]), &t) {
            Err(AgentError::TypeMismatch { parameter, expected, value }) => {
                assert_eq!(parameter, "count");
                assert_eq!(expected, "integer");
                assert_eq!(value, "many");
            }
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_array_from_bracketed_text() {
        let t = tool(json!({"properties": {"xs": {"type": "array"}}}));
        let args = coerce(&positional(&["[1,2,3]"]), &t).unwrap();
        assert_eq!(args["xs"], json!([1, 2, 3]));
        let args = coerce(&positional(&["4, 5"]), &t).unwrap();
        assert_eq!(args["xs"], json!([4, 5]));
    }

    #[test]
    fn test_array_respects_item_type() {
        let t = tool(json!({"properties": {"xs": {"type": "array", "items": {"type": "string"}}}}));
        let args = coerce(&positional(&["[a, 'b']"]), &t).unwrap();
        assert_eq!(args["xs"], json!(["a", "b"]));
    }

    #[test]
    fn test_array_element_mismatch() {
        let t = tool(json!({"properties": {"xs": {"type": "array"}}}));
        assert!(matches!(
            coerce(&positional(&["[1,x]"]), &t),
            Err(AgentError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_key_value_coerces_top_level_and_passes_nested() {
        let t = tool(json!({
            "properties": {
                "ex_showroom_price": {"type": "integer"},
                "road_tax_multiplier": {"type": "number"},
                "input": {"$ref": "#/$defs/X"}
            },
            "required": ["ex_showroom_price", "road_tax_multiplier"]
        }));
        let mut map = Map::new();
        map.insert("ex_showroom_price".to_string(), json!("2303000"));
        map.insert("road_tax_multiplier".to_string(), json!(1));
        map.insert("input".to_string(), json!({"state": "DELHI"}));
        let args = coerce(&RawParams::KeyValue(map), &t).unwrap();
        assert_eq!(
            Value::Object(args),
            json!({
                "ex_showroom_price": 2303000,
                "road_tax_multiplier": 1.0,
                "input": {"state": "DELHI"}
            })
        );
    }

    #[test]
    fn test_key_value_requires_required_params() {
        let t = tool(json!({
            "properties": {"state": {"type": "string"}, "fuel_type": {"type": "string"}},
            "required": ["state", "fuel_type"]
        }));
        let mut map = Map::new();
        map.insert("state".to_string(), json!("DELHI"));
        assert!(matches!(
            coerce(&RawParams::KeyValue(map), &t),
            Err(AgentError::MissingParameter { parameter, .. }) if parameter == "fuel_type"
        ));
    }

    #[test]
    fn test_key_value_optional_param_may_be_omitted() {
        let t = tool(json!({"properties": {
            "a": {"type": "integer"},
            "b": {"type": "integer", "default": 0}
        }}));
        let mut map = Map::new();
        map.insert("a".to_string(), json!(1));
        let args = coerce(&RawParams::KeyValue(map), &t).unwrap();
        assert_eq!(Value::Object(args), json!({"a": 1}));
        // 位置参数仍需每个属性一个 token
        assert!(matches!(
            coerce(&positional(&["1"]), &t),
            Err(AgentError::MissingParameter { parameter, .. }) if parameter == "b"
        ));
    }

    #[test]
    fn test_key_value_integer_out_of_range_is_mismatch() {
        let t = tool(json!({"properties": {"n": {"type": "integer"}}}));
        let mut map = Map::new();
        map.insert("n".to_string(), json!(1e20));
        assert!(matches!(
            coerce(&RawParams::KeyValue(map), &t),
            Err(AgentError::TypeMismatch { parameter, .. }) if parameter == "n"
        ));

        let mut map = Map::new();
        map.insert("n".to_string(), json!(3.0));
        assert_eq!(coerce(&RawParams::KeyValue(map), &t).unwrap()["n"], json!(3));
    }

    #[test]
    fn test_positional_empty_token_keeps_slot() {
        let t = tool(json!({"properties": {
            "a": {"type": "string"},
            "b": {"type": "string"},
            "c": {"type": "string"}
        }}));
        let Directive::FunctionCall { params, .. } = parse_directive("FUNCTION_CALL: t|x||z") else {
            panic!("Expected FunctionCall");
        };
        let args = coerce(&params, &t).unwrap();
        assert_eq!(Value::Object(args), json!({"a": "x", "b": "", "c": "z"}));
    }

    #[test]
    fn test_key_value_list_value_for_array() {
        let t = tool(json!({"properties": {"xs": {"type": "array", "items": {"type": "number"}}}}));
        let mut map = Map::new();
        map.insert("xs".to_string(), json!([1, 2.5]));
        let args = coerce(&RawParams::KeyValue(map), &t).unwrap();
        assert_eq!(args["xs"], json!([1.0, 2.5]));
    }
}
