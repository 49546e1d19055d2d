//! A small JSON-Schema subset for tool arguments.
//!
//! Supported keywords: `type`, `enum` (strings), `minLength`/`maxLength`,
//! `minimum`/`maximum`, `items`, `minItems`/`maxItems`, `properties`,
//! `required`, and `additionalProperties: false`. Anything else in a schema
//! document is ignored.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// A parsed schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// No `type`: any value is accepted.
    Any,
    Null,
    Boolean,
    String {
        min_length: Option<usize>,
        max_length: Option<usize>,
        allowed: Option<Vec<String>>,
    },
    /// A JSON number with no fractional part.
    Integer {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Array {
        items: Option<Box<Schema>>,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },
    Object {
        properties: BTreeMap<String, Schema>,
        required: Vec<String>,
        additional_properties: bool,
    },
}

/// A schema document that can't be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid schema at {path}: {message}")]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

/// One way an argument document fails its schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    /// Pointer to the offending value, `""` for the document root.
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl Schema {
    /// Parse a schema document.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` for unknown types or malformed keywords.
    pub fn parse(doc: &Value) -> Result<Self, SchemaError> {
        parse_node(doc, "")
    }

    /// Validate `value`, collecting every violation.
    #[must_use]
    pub fn validate(&self, value: &Value) -> Vec<SchemaViolation> {
        let mut violations = Vec::new();
        self.check(value, "", &mut violations);
        violations
    }

    /// Rewrite whole-number floats under `integer` nodes as JSON integers.
    ///
    /// Validation accepts `3.0` for an integer; typed deserialization does
    /// not, so validated arguments pass through here before handlers see them.
    pub fn normalize_integers(&self, value: &mut Value) {
        match (self, value) {
            (Self::Integer { .. }, value) => {
                if let Some(n) = value.as_f64().filter(|n| n.fract() == 0.0)
                    && !value.is_i64()
                    && !value.is_u64()
                    && n.abs() < 9_007_199_254_740_992.0
                {
                    #[allow(clippy::cast_possible_truncation)]
                    let whole = n as i64;
                    *value = Value::from(whole);
                }
            }
            (Self::Array { items: Some(item_schema), .. }, Value::Array(elements)) => {
                for element in elements {
                    item_schema.normalize_integers(element);
                }
            }
            (Self::Object { properties, .. }, Value::Object(fields)) => {
                for (name, field) in fields {
                    if let Some(schema) = properties.get(name) {
                        schema.normalize_integers(field);
                    }
                }
            }
            _ => {}
        }
    }

    fn check(&self, value: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
        let mut fail = |message: String| {
            out.push(SchemaViolation {
                path: path.to_owned(),
                message,
            });
        };

        match self {
            Self::Any => {}
            Self::Null => {
                if !value.is_null() {
                    fail(format!("expected null, got {}", type_name(value)));
                }
            }
            Self::Boolean => {
                if !value.is_boolean() {
                    fail(format!("expected boolean, got {}", type_name(value)));
                }
            }
            Self::String {
                min_length,
                max_length,
                allowed,
            } => {
                let Some(s) = value.as_str() else {
                    fail(format!("expected string, got {}", type_name(value)));
                    return;
                };
                let length = s.chars().count();
                if let Some(min) = min_length
                    && length < *min
                {
                    fail(format!("must be at least {min} characters"));
                }
                if let Some(max) = max_length
                    && length > *max
                {
                    fail(format!("must be at most {max} characters"));
                }
                if let Some(allowed) = allowed
                    && !allowed.iter().any(|a| a == s)
                {
                    fail(format!("must be one of: {}", allowed.join(", ")));
                }
            }
            Self::Integer { minimum, maximum } => {
                let Some(n) = value.as_f64().filter(|n| n.fract() == 0.0) else {
                    fail(format!("expected integer, got {}", type_name(value)));
                    return;
                };
                check_range(n, *minimum, *maximum, &mut fail);
            }
            Self::Number { minimum, maximum } => {
                let Some(n) = value.as_f64() else {
                    fail(format!("expected number, got {}", type_name(value)));
                    return;
                };
                check_range(n, *minimum, *maximum, &mut fail);
            }
            Self::Array {
                items,
                min_items,
                max_items,
            } => {
                let Some(elements) = value.as_array() else {
                    fail(format!("expected array, got {}", type_name(value)));
                    return;
                };
                if let Some(min) = min_items
                    && elements.len() < *min
                {
                    fail(format!("must have at least {min} items"));
                }
                if let Some(max) = max_items
                    && elements.len() > *max
                {
                    fail(format!("must have at most {max} items"));
                }
                if let Some(item_schema) = items {
                    for (i, element) in elements.iter().enumerate() {
                        item_schema.check(element, &format!("{path}/{i}"), out);
                    }
                }
            }
            Self::Object {
                properties,
                required,
                additional_properties,
            } => {
                let Some(fields) = value.as_object() else {
                    fail(format!("expected object, got {}", type_name(value)));
                    return;
                };
                for name in required {
                    if !fields.contains_key(name) {
                        out.push(SchemaViolation {
                            path: format!("{path}/{name}"),
                            message: "is required".to_owned(),
                        });
                    }
                }
                for (name, field) in fields {
                    let field_path = format!("{path}/{name}");
                    match properties.get(name) {
                        Some(schema) => schema.check(field, &field_path, out),
                        None if !additional_properties => out.push(SchemaViolation {
                            path: field_path,
                            message: "is not an allowed property".to_owned(),
                        }),
                        None => {}
                    }
                }
            }
        }
    }
}

fn check_range(n: f64, minimum: Option<f64>, maximum: Option<f64>, fail: &mut impl FnMut(String)) {
    if let Some(min) = minimum
        && n < min
    {
        fail(format!("must be at least {min}"));
    }
    if let Some(max) = maximum
        && n > max
    {
        fail(format!("must be at most {max}"));
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_node(doc: &Value, path: &str) -> Result<Schema, SchemaError> {
    let err = |message: String| SchemaError {
        path: if path.is_empty() { "/".to_owned() } else { path.to_owned() },
        message,
    };
    let Some(obj) = doc.as_object() else {
        return Err(err("schema must be an object".to_owned()));
    };

    let type_name = match obj.get("type") {
        None if obj.contains_key("properties") => "object",
        None => return Ok(Schema::Any),
        Some(Value::String(t)) => t.as_str(),
        Some(_) => return Err(err("`type` must be a string".to_owned())),
    };

    let schema = match type_name {
        "null" => Schema::Null,
        "boolean" => Schema::Boolean,
        "string" => Schema::String {
            min_length: usize_keyword(obj, "minLength").map_err(err)?,
            max_length: usize_keyword(obj, "maxLength").map_err(err)?,
            allowed: obj
                .get("enum")
                .map(|values| {
                    values
                        .as_array()
                        .and_then(|a| {
                            a.iter()
                                .map(|v| v.as_str().map(str::to_owned))
                                .collect::<Option<Vec<_>>>()
                        })
                        .ok_or_else(|| err("`enum` must be an array of strings".to_owned()))
                })
                .transpose()?,
        },
        "integer" => Schema::Integer {
            minimum: number_keyword(obj, "minimum").map_err(err)?,
            maximum: number_keyword(obj, "maximum").map_err(err)?,
        },
        "number" => Schema::Number {
            minimum: number_keyword(obj, "minimum").map_err(err)?,
            maximum: number_keyword(obj, "maximum").map_err(err)?,
        },
        "array" => Schema::Array {
            items: obj
                .get("items")
                .map(|items| parse_node(items, &format!("{path}/items")).map(Box::new))
                .transpose()?,
            min_items: usize_keyword(obj, "minItems").map_err(err)?,
            max_items: usize_keyword(obj, "maxItems").map_err(err)?,
        },
        "object" => {
            let mut properties = BTreeMap::new();
            if let Some(props) = obj.get("properties") {
                let props = props
                    .as_object()
                    .ok_or_else(|| err("`properties` must be an object".to_owned()))?;
                for (name, sub) in props {
                    properties.insert(
                        name.clone(),
                        parse_node(sub, &format!("{path}/properties/{name}"))?,
                    );
                }
            }
            let required = match obj.get("required") {
                None => Vec::new(),
                Some(values) => values
                    .as_array()
                    .and_then(|a| {
                        a.iter()
                            .map(|v| v.as_str().map(str::to_owned))
                            .collect::<Option<Vec<_>>>()
                    })
                    .ok_or_else(|| err("`required` must be an array of strings".to_owned()))?,
            };
            Schema::Object {
                properties,
                required,
                additional_properties: !matches!(
                    obj.get("additionalProperties"),
                    Some(Value::Bool(false))
                ),
            }
        }
        other => return Err(err(format!("unsupported type `{other}`"))),
    };
    Ok(schema)
}

fn usize_keyword(obj: &Map<String, Value>, key: &str) -> Result<Option<usize>, String> {
    obj.get(key)
        .map(|v| {
            v.as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| format!("`{key}` must be a non-negative integer"))
        })
        .transpose()
}

fn number_keyword(obj: &Map<String, Value>, key: &str) -> Result<Option<f64>, String> {
    obj.get(key)
        .map(|v| v.as_f64().ok_or_else(|| format!("`{key}` must be a number")))
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn cart_schema() -> Schema {
        Schema::parse(&json!({
            "type": "object",
            "properties": {
                "note": {"type": "string", "maxLength": 5, "description": "ignored"},
                "items": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "product_id": {"type": "integer", "minimum": 1},
                            "quantity": {"type": "integer", "minimum": 1, "maximum": 99}
                        },
                        "required": ["product_id", "quantity"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["items"]
        }))
        .unwrap()
    }

    fn paths(violations: &[SchemaViolation]) -> Vec<&str> {
        violations.iter().map(|v| v.path.as_str()).collect()
    }

    #[test]
    fn test_valid_document_has_no_violations() {
        let v = cart_schema().validate(&json!({
            "items": [{"product_id": 3, "quantity": 2}],
            "extra": true
        }));
        assert!(v.is_empty(), "{v:?}");
    }

    #[test]
    fn test_nested_paths_and_every_violation_reported() {
        let v = cart_schema().validate(&json!({
            "note": "too long",
            "items": [
                {"product_id": 3, "quantity": 0},
                {"quantity": 2.5, "color": "red"}
            ]
        }));
        assert_eq!(
            paths(&v),
            vec![
                "/items/0/quantity",
                "/items/1/product_id",
                "/items/1/color",
                "/items/1/quantity",
                "/note",
            ]
        );
        assert_eq!(v[0].to_string(), "/items/0/quantity: must be at least 1");
    }

    #[test]
    fn test_integer_accepts_whole_floats() {
        let schema = Schema::parse(&json!({"type": "integer", "maximum": 10})).unwrap();
        assert!(schema.validate(&json!(4.0)).is_empty());
        assert_eq!(schema.validate(&json!(4.5)).len(), 1);
        assert_eq!(schema.validate(&json!("4")).len(), 1);
        assert_eq!(schema.validate(&json!(11)).len(), 1);
    }

    #[test]
    fn test_normalize_integers_rewrites_whole_floats() {
        let schema = cart_schema();
        let mut doc = json!({
            "note": "hi",
            "items": [{"product_id": 3.0, "quantity": 2}],
            "extra": 1.0
        });
        schema.normalize_integers(&mut doc);
        assert_eq!(
            doc,
            json!({
                "note": "hi",
                "items": [{"product_id": 3, "quantity": 2}],
                "extra": 1.0
            })
        );
        assert!(doc["items"][0]["product_id"].is_i64());
        assert!(doc["extra"].is_f64());
    }

    #[test]
    fn test_string_length_counts_scalar_values() {
        let schema = Schema::parse(&json!({"type": "string", "maxLength": 3})).unwrap();
        assert!(schema.validate(&json!("äöü")).is_empty());
        assert_eq!(schema.validate(&json!("äöüß")).len(), 1);
    }

    #[test]
    fn test_enum() {
        let schema =
            Schema::parse(&json!({"type": "string", "enum": ["men", "women"]})).unwrap();
        assert!(schema.validate(&json!("men")).is_empty());
        let v = schema.validate(&json!("pets"));
        assert_eq!(v[0].message, "must be one of: men, women");
    }

    #[test]
    fn test_root_type_mismatch() {
        let v = cart_schema().validate(&json!([1, 2]));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].to_string(), "expected object, got array");
    }

    #[test]
    fn test_untyped_schema_accepts_anything() {
        let schema = Schema::parse(&json!({"description": "free form"})).unwrap();
        assert_eq!(schema, Schema::Any);
        assert!(schema.validate(&json!({"a": [1]})).is_empty());
    }

    #[test]
    fn test_parse_errors() {
        let err = Schema::parse(&json!({"type": "date"})).unwrap_err();
        assert!(err.message.contains("unsupported type"));

        let err = Schema::parse(&json!({
            "type": "object",
            "properties": {"q": {"type": "string", "maxLength": -1}}
        }))
        .unwrap_err();
        assert_eq!(err.path, "/properties/q");
    }
}
