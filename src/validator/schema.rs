/// Declared-schema checks for MCP payloads
///
/// The shapes MCP requires of tool descriptors, initialize results, tool
/// results and resource descriptors are written down as JSON Schema and
/// validated with `jsonschema`. Each check returns one message per schema
/// error, prefixed with a label and the JSON pointer of the offending value.
/// The runtime harness and the static validator share these so both report
/// the same wording for the same problem.

use std::collections::HashSet;
use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::{json, Value};

/// Content block types a tool result may carry
pub const CONTENT_TYPES: &[&str] = &["text", "image", "audio", "resource", "resource_link"];

/// A string with at least one non-whitespace character
fn non_blank() -> Value {
    json!({"type": "string", "pattern": "\\S"})
}

/// One tool descriptor as returned by `tools/list`
pub fn tool_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name", "description", "inputSchema"],
        "properties": {
            "name": non_blank(),
            "description": non_blank(),
            "inputSchema": {
                "type": "object",
                "required": ["type"],
                "properties": {
                    "type": {"const": "object"},
                    "properties": {"type": "object"},
                    "required": {"type": "array", "items": {"type": "string"}}
                }
            }
        }
    })
}

/// The `result` member of an `initialize` response
pub fn initialize_result_schema() -> Value {
    json!({
        "type": "object",
        "required": ["protocolVersion", "capabilities", "serverInfo"],
        "properties": {
            "protocolVersion": non_blank(),
            "capabilities": {"type": "object"},
            "serverInfo": {
                "type": "object",
                "required": ["name", "version"],
                "properties": {
                    "name": non_blank(),
                    "version": {"type": "string"}
                }
            }
        }
    })
}

/// The `result` member of a `tools/call` response
pub fn tool_result_schema() -> Value {
    json!({
        "type": "object",
        "required": ["content"],
        "properties": {
            "content": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["type"],
                    "properties": {"type": {"enum": CONTENT_TYPES}}
                }
            },
            "isError": {"type": "boolean"}
        }
    })
}

/// One resource descriptor as returned by `resources/list`
pub fn resource_schema() -> Value {
    json!({
        "type": "object",
        "required": ["uri", "name"],
        "properties": {
            "uri": non_blank(),
            "name": {"type": "string"},
            "description": {"type": "string"},
            "mimeType": {"type": "string"}
        }
    })
}

type Compiled = OnceLock<Result<Validator, String>>;

static TOOL: Compiled = OnceLock::new();
static INITIALIZE_RESULT: Compiled = OnceLock::new();
static TOOL_RESULT: Compiled = OnceLock::new();
static RESOURCE: Compiled = OnceLock::new();

/// Validate `instance` against the schema cached in `cell`
fn check(
    cell: &'static Compiled,
    schema: fn() -> Value,
    instance: &Value,
    label: &str,
) -> Vec<String> {
    let compiled =
        cell.get_or_init(|| jsonschema::validator_for(&schema()).map_err(|e| e.to_string()));
    let validator = match compiled {
        Ok(validator) => validator,
        Err(e) => {
            return vec![format!("{} could not be checked: invalid schema: {}", label, e)];
        }
    };

    validator
        .iter_errors(instance)
        .map(|error| {
            let path = error.instance_path().to_string();
            if path.is_empty() {
                format!("{}: {}", label, error)
            } else {
                format!("{} at {}: {}", label, path, error)
            }
        })
        .collect()
}

/// Check a single tool descriptor from `tools/list`
pub fn check_tool_definition(tool: &Value, label: &str) -> Vec<String> {
    check(&TOOL, tool_schema, tool, label)
}

/// Check a full tool list: every descriptor, plus unique names
pub fn check_tool_definitions(tools: &[Value]) -> Vec<String> {
    let mut problems = Vec::new();
    let mut seen = HashSet::new();
    for (index, tool) in tools.iter().enumerate() {
        let name = tool.get("name").and_then(Value::as_str);
        let label = match name {
            Some(name) => format!("tool #{} ({})", index, name),
            None => format!("tool #{}", index),
        };
        problems.extend(check_tool_definition(tool, &label));
        // JSON Schema has no uniqueness over a nested member
        if let Some(name) = name {
            if !seen.insert(name) {
                problems.push(format!("duplicate tool name `{}`", name));
            }
        }
    }
    problems
}

/// Check the `result` of an `initialize` response
pub fn check_initialize_result(result: &Value) -> Vec<String> {
    check(&INITIALIZE_RESULT, initialize_result_schema, result, "initialize result")
}

/// Check the `result` of a `tools/call` response
pub fn check_tool_result(result: &Value) -> Vec<String> {
    check(&TOOL_RESULT, tool_result_schema, result, "tool result")
}

/// Check a resource descriptor from `resources/list`
pub fn check_resource(resource: &Value, label: &str) -> Vec<String> {
    check(&RESOURCE, resource_schema, resource, label)
}
