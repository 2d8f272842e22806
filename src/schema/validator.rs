//! JSON-Schema subset compiler and validator.
//!
//! Supported keywords: `type` (object, array, string, number, integer,
//! boolean, null), `required`, `properties`, `additionalProperties`
//! (boolean), `enum`, `items`, `minLength`, `maxLength`. Compile once,
//! validate many. Validation errors carry a `$.foo[2].bar` pointer path.

use crate::error::{PlannerError, Result};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl SchemaType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Null => value.is_null(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }
}

#[derive(Debug, Clone)]
struct SchemaNode {
    type_: Option<SchemaType>,
    required: Vec<String>,
    properties: Vec<(String, SchemaNode)>,
    additional_properties: bool,
    enum_values: Option<Vec<Value>>,
    items: Option<Box<SchemaNode>>,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

/// A schema compiled for repeated validation.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    root: SchemaNode,
}

fn schema_err(path: &str, message: &str) -> PlannerError {
    PlannerError::InvalidKindPayloadSchema(format!("{path}: {message}"))
}

fn payload_err(path: &str, message: &str) -> PlannerError {
    PlannerError::InvalidKindPayload(format!("{path}: {message}"))
}

fn non_negative_int(value: &Value, path: &str, keyword: &str) -> Result<usize> {
    value
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| schema_err(path, &format!("{keyword} must be a non-negative integer")))
}

fn compile_node(value: &Value, path: &str) -> Result<SchemaNode> {
    let map: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| schema_err(path, "schema must be an object"))?;

    const KNOWN: &[&str] = &[
        "type",
        "required",
        "properties",
        "additionalProperties",
        "enum",
        "items",
        "minLength",
        "maxLength",
    ];
    for key in map.keys() {
        if !KNOWN.contains(&key.as_str()) {
            return Err(schema_err(path, &format!("unsupported keyword '{key}'")));
        }
    }

    let type_ = match map.get("type") {
        Some(Value::String(s)) => Some(
            SchemaType::parse(s).ok_or_else(|| schema_err(path, &format!("unknown type '{s}'")))?,
        ),
        Some(_) => return Err(schema_err(path, "type must be a string")),
        None => None,
    };

    let required = match map.get("required") {
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) => out.push(s.to_string()),
                    None => return Err(schema_err(path, "required entries must be strings")),
                }
            }
            out
        }
        Some(_) => return Err(schema_err(path, "required must be a string array")),
        None => Vec::new(),
    };

    let properties = match map.get("properties") {
        Some(Value::Object(props)) => {
            // Sorted so compiled form and error order never depend on input order.
            let mut keys: Vec<&String> = props.keys().collect();
            keys.sort();
            let mut out = Vec::with_capacity(keys.len());
            for key in keys {
                let child = compile_node(&props[key], &format!("{path}.{key}"))?;
                out.push((key.clone(), child));
            }
            out
        }
        Some(_) => return Err(schema_err(path, "properties must be an object")),
        None => Vec::new(),
    };

    let additional_properties = match map.get("additionalProperties") {
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(schema_err(path, "additionalProperties must be a boolean")),
        None => true,
    };

    let enum_values = match map.get("enum") {
        Some(Value::Array(items)) => {
            if items.is_empty() {
                return Err(schema_err(path, "enum must not be empty"));
            }
            Some(items.clone())
        }
        Some(_) => return Err(schema_err(path, "enum must be an array")),
        None => None,
    };

    let items = match map.get("items") {
        Some(v) => Some(Box::new(compile_node(v, &format!("{path}.items"))?)),
        None => None,
    };

    let min_length = map
        .get("minLength")
        .map(|v| non_negative_int(v, path, "minLength"))
        .transpose()?;
    let max_length = map
        .get("maxLength")
        .map(|v| non_negative_int(v, path, "maxLength"))
        .transpose()?;
    if let (Some(min), Some(max)) = (min_length, max_length) {
        if min > max {
            return Err(schema_err(path, "minLength must not exceed maxLength"));
        }
    }

    Ok(SchemaNode {
        type_,
        required,
        properties,
        additional_properties,
        enum_values,
        items,
        min_length,
        max_length,
    })
}

fn validate_node(node: &SchemaNode, value: &Value, path: &str) -> Result<()> {
    if let Some(type_) = node.type_ {
        if !type_.matches(value) {
            return Err(payload_err(
                path,
                &format!("expected {}", type_.name()),
            ));
        }
    }

    if let Some(enum_values) = &node.enum_values {
        if !enum_values.contains(value) {
            return Err(payload_err(path, "value not in enum"));
        }
    }

    if let Value::String(s) = value {
        let len = s.chars().count();
        if let Some(min) = node.min_length {
            if len < min {
                return Err(payload_err(path, &format!("shorter than minLength {min}")));
            }
        }
        if let Some(max) = node.max_length {
            if len > max {
                return Err(payload_err(path, &format!("longer than maxLength {max}")));
            }
        }
    }

    if let Value::Object(map) = value {
        for required in &node.required {
            if !map.contains_key(required) {
                return Err(payload_err(
                    path,
                    &format!("missing required property '{required}'"),
                ));
            }
        }
        for (key, child) in &node.properties {
            if let Some(v) = map.get(key) {
                validate_node(child, v, &format!("{path}.{key}"))?;
            }
        }
        if !node.additional_properties {
            for key in map.keys() {
                if !node.properties.iter().any(|(k, _)| k == key) {
                    return Err(payload_err(
                        path,
                        &format!("unexpected property '{key}'"),
                    ));
                }
            }
        }
    }

    if let (Some(items), Value::Array(values)) = (&node.items, value) {
        for (i, item) in values.iter().enumerate() {
            validate_node(items, item, &format!("{path}[{i}]"))?;
        }
    }

    Ok(())
}

impl CompiledSchema {
    /// Compile a schema document. Unsupported keywords are rejected with
    /// `invalid_kind_payload_schema`.
    pub fn compile(schema: &Value) -> Result<Self> {
        Ok(Self {
            root: compile_node(schema, "$")?,
        })
    }

    /// Validate a payload. An absent payload validates as `{}`.
    pub fn validate(&self, payload: &Value) -> Result<()> {
        let empty = Value::Object(Map::new());
        let payload = if payload.is_null() { &empty } else { payload };
        validate_node(&self.root, payload, "$")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> CompiledSchema {
        CompiledSchema::compile(&json!({
            "type": "object",
            "required": ["name"],
            "additionalProperties": false,
            "properties": {
                "name": {"type": "string", "minLength": 1, "maxLength": 40},
                "severity": {"type": "string", "enum": ["low", "high"]},
                "points": {"type": "integer"},
                "steps": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["text"],
                        "properties": {"text": {"type": "string"}}
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_payload() {
        schema()
            .validate(&json!({"name": "x", "severity": "low", "points": 3}))
            .unwrap();
    }

    #[test]
    fn test_missing_required() {
        let err = schema().validate(&json!({})).unwrap_err();
        assert_eq!(err.code(), "invalid_kind_payload");
        assert!(err.to_string().contains("$: missing required property 'name'"));
    }

    #[test]
    fn test_nested_array_path() {
        let err = schema()
            .validate(&json!({"name": "x", "steps": [{"text": "a"}, {"nope": 1}]}))
            .unwrap_err();
        assert!(err.to_string().contains("$.steps[1]"));
    }

    #[test]
    fn test_enum_and_lengths() {
        let err = schema()
            .validate(&json!({"name": "x", "severity": "mid"}))
            .unwrap_err();
        assert!(err.to_string().contains("$.severity"));
        let err = schema().validate(&json!({"name": ""})).unwrap_err();
        assert!(err.to_string().contains("minLength"));
    }

    #[test]
    fn test_additional_properties_rejected() {
        let err = schema()
            .validate(&json!({"name": "x", "extra": true}))
            .unwrap_err();
        assert!(err.to_string().contains("unexpected property 'extra'"));
    }

    #[test]
    fn test_null_payload_is_empty_object() {
        // {} fails required, so null must fail the same way
        let err = schema().validate(&Value::Null).unwrap_err();
        assert!(err.to_string().contains("required"));

        let open = CompiledSchema::compile(&json!({"type": "object"})).unwrap();
        open.validate(&Value::Null).unwrap();
    }

    #[test]
    fn test_unsupported_keyword_rejected() {
        let err = CompiledSchema::compile(&json!({"type": "object", "patternProperties": {}}))
            .unwrap_err();
        assert_eq!(err.code(), "invalid_kind_payload_schema");
    }

    #[test]
    fn test_integer_vs_number() {
        let s = CompiledSchema::compile(&json!({"type": "integer"})).unwrap();
        s.validate(&json!(4)).unwrap();
        assert!(s.validate(&json!(4.5)).is_err());
        let n = CompiledSchema::compile(&json!({"type": "number"})).unwrap();
        n.validate(&json!(4.5)).unwrap();
    }
}
