//! 工具描述：由宿主 tools/list 的记录解析出的名称、参数 schema 与说明
//!
//! 参数顺序与 inputSchema.properties 中的声明顺序一致（位置参数方言依赖此顺序）。

use serde::Serialize;
use serde_json::Value;

use crate::mcp::ToolInfo;

/// 参数类型；未知或缺失的 type 一律按文本处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    Number,
    String,
    Boolean,
    Array,
    /// `$ref` / 嵌套对象（如 pydantic 风格的 `input` 参数），不做转换
    Object,
}

impl ParamType {
    pub fn from_schema(schema: &Value) -> Self {
        match schema.get("type").and_then(Value::as_str) {
            Some("integer") => ParamType::Integer,
            Some("number") => ParamType::Number,
            Some("boolean") => ParamType::Boolean,
            Some("array") => ParamType::Array,
            Some("object") => ParamType::Object,
            Some(_) => ParamType::String,
            None if schema.get("$ref").is_some()
                || schema.get("properties").is_some()
                || schema.get("allOf").is_some() =>
            {
                ParamType::Object
            }
            None => ParamType::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::String => "string",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    /// array 的元素类型；未声明时按整数处理
    pub item_type: Option<ParamType>,
    pub required: bool,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            item_type: None,
            required: true,
        }
    }

    pub fn element_type(&self) -> ParamType {
        self.item_type.unwrap_or(ParamType::Integer)
    }
}

/// 会话内不可变的工具描述
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub params: Vec<ParamSpec>,
    #[serde(skip)]
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// 宽松解析：schema 结构异常时参数表为空，异常在 describe() 中暴露
    pub fn from_info(info: &ToolInfo) -> Self {
        let required: Vec<&str> = info
            .input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let params = info
            .input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, schema)| ParamSpec {
                        name: name.clone(),
                        param_type: ParamType::from_schema(schema),
                        item_type: schema.get("items").map(ParamType::from_schema),
                        required: required.contains(&name.as_str()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: info.name.clone(),
            description: info.description.clone(),
            params,
            input_schema: info.input_schema.clone(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// 渲染一行能力摘要：`name(a: integer, b: string) - description`
    pub fn describe(&self) -> Result<String, String> {
        let params_str = match &self.input_schema {
            Value::Null => "no parameters".to_string(),
            Value::Object(schema) => match schema.get("properties") {
                None => "no parameters".to_string(),
                Some(Value::Object(props)) => {
                    let mut details = Vec::with_capacity(props.len());
                    for (name, info) in props {
                        let info = info
                            .as_object()
                            .ok_or_else(|| format!("parameter '{name}' is not an object schema"))?;
                        let ty = info.get("type").and_then(Value::as_str).unwrap_or("unknown");
                        details.push(format!("{name}: {ty}"));
                    }
                    if details.is_empty() {
                        "no parameters".to_string()
                    } else {
                        details.join(", ")
                    }
                }
                Some(_) => return Err("'properties' is not an object".to_string()),
            },
            _ => return Err("input schema is not an object".to_string()),
        };
        let desc = self
            .description
            .as_deref()
            .unwrap_or("No description available");
        Ok(format!("{}({}) - {}", self.name, params_str, desc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(schema: Value) -> ToolInfo {
        ToolInfo {
            name: "road_tax_multiplier".to_string(),
            description: Some("Calculate road tax multiplier".to_string()),
            input_schema: schema,
        }
    }

    #[test]
    fn test_params_keep_declaration_order() {
        let d = ToolDescriptor::from_info(&info(json!({
            "type": "object",
            "properties": {
                "state": {"type": "string"},
                "ex_showroom_price": {"type": "integer"},
                "fuel_type": {"type": "string"}
            },
            "required": ["state", "ex_showroom_price"]
        })));
        let names: Vec<&str> = d.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["state", "ex_showroom_price", "fuel_type"]);
        assert_eq!(d.params[1].param_type, ParamType::Integer);
        assert!(d.params[0].required);
        assert!(!d.params[2].required);
    }

    #[test]
    fn test_missing_required_array_means_all_optional() {
        let d = ToolDescriptor::from_info(&info(json!({
            "properties": {"a": {"type": "integer"}, "b": {"type": "integer", "default": 0}}
        })));
        assert!(d.params.iter().all(|p| !p.required));
    }

    #[test]
    fn test_ref_parameter_is_object() {
        let d = ToolDescriptor::from_info(&info(json!({
            "type": "object",
            "properties": {"input": {"$ref": "#/$defs/RoadTaxMultiplierInput"}}
        })));
        assert_eq!(d.params[0].param_type, ParamType::Object);
        assert_eq!(
            d.describe().unwrap(),
            "road_tax_multiplier(input: unknown) - Calculate road tax multiplier"
        );
    }

    #[test]
    fn test_array_item_type() {
        let d = ToolDescriptor::from_info(&info(json!({
            "properties": {
                "ints": {"type": "array", "items": {"type": "integer"}},
                "weights": {"type": "array", "items": {"type": "number"}},
                "raw": {"type": "array"}
            }
        })));
        assert_eq!(d.params[0].element_type(), ParamType::Integer);
        assert_eq!(d.params[1].element_type(), ParamType::Number);
        assert_eq!(d.params[2].element_type(), ParamType::Integer);
    }

    #[test]
    fn test_describe_without_properties() {
        let d = ToolDescriptor::from_info(&info(json!({"type": "object"})));
        assert!(d.params.is_empty());
        assert_eq!(
            d.describe().unwrap(),
            "road_tax_multiplier(no parameters) - Calculate road tax multiplier"
        );
    }

    #[test]
    fn test_describe_rejects_malformed_schema() {
        assert!(ToolDescriptor::from_info(&info(json!({"properties": ["a", "b"]})))
            .describe()
            .is_err());
        assert!(ToolDescriptor::from_info(&info(json!("string schema")))
            .describe()
            .is_err());
        assert!(ToolDescriptor::from_info(&info(json!({"properties": {"a": 3}})))
            .describe()
            .is_err());
    }
}
