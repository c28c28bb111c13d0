/// Placeholder tool arguments derived from a tool's `inputSchema`
///
/// Only required properties get a value. A declared `default`, `const` or
/// first `enum` member wins; otherwise the placeholder follows the declared
/// type.

use serde_json::{json, Map, Value};

/// Build an `arguments` object satisfying the required properties of `input_schema`
pub fn sample_arguments(input_schema: &Value) -> Map<String, Value> {
    let mut arguments = Map::new();
    let Some(required) = input_schema.get("required").and_then(Value::as_array) else {
        return arguments;
    };
    let properties = input_schema.get("properties").and_then(Value::as_object);

    for name in required.iter().filter_map(Value::as_str) {
        let property = properties.and_then(|p| p.get(name));
        arguments.insert(name.to_string(), sample_value(property));
    }
    arguments
}

fn sample_value(property: Option<&Value>) -> Value {
    let Some(property) = property else {
        return json!("test");
    };
    if let Some(value) = property.get("default").or_else(|| property.get("const")) {
        return value.clone();
    }
    if let Some(first) = property
        .get("enum")
        .and_then(Value::as_array)
        .and_then(|members| members.first())
    {
        return first.clone();
    }

    match declared_type(property) {
        Some("integer") => property
            .get("minimum")
            .and_then(Value::as_i64)
            .map(Value::from)
            .unwrap_or_else(|| json!(0)),
        Some("number") => property
            .get("minimum")
            .cloned()
            .filter(Value::is_number)
            .unwrap_or_else(|| json!(0)),
        Some("boolean") => json!(false),
        Some("array") => json!([]),
        Some("object") => Value::Object(sample_arguments(property)),
        Some("null") => Value::Null,
        _ => json!("test"),
    }
}

/// The declared type; for a type union, the first non-null member
fn declared_type(property: &Value) -> Option<&str> {
    match property.get("type")? {
        Value::String(t) => Some(t.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .or(Some("null")),
        _ => None,
    }
}
