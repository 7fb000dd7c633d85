use crate::errors::{ErrorCode, McpError};
use crate::utils::suggest::suggest;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

static TOOL_CATALOG: Lazy<Vec<ToolDef>> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tool_catalog.json"));
    serde_json::from_str(raw).expect("tool_catalog.json must be valid JSON")
});

static TOOL_MAP: Lazy<HashMap<String, ToolDef>> = Lazy::new(|| {
    TOOL_CATALOG
        .iter()
        .cloned()
        .map(|tool| (tool.name.clone(), tool))
        .collect()
});

static TOOL_VALIDATORS: Lazy<HashMap<String, JSONSchema>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for tool in TOOL_CATALOG.iter() {
        if let Ok(schema) = JSONSchema::compile(&tool.input_schema) {
            map.insert(tool.name.clone(), schema);
        }
    }
    map
});

pub fn tool_catalog() -> &'static Vec<ToolDef> {
    &TOOL_CATALOG
}

pub fn tool_by_name(name: &str) -> Option<&'static ToolDef> {
    TOOL_MAP.get(name)
}

pub fn tool_names() -> Vec<String> {
    TOOL_CATALOG.iter().map(|tool| tool.name.clone()).collect()
}

pub fn unknown_tool_error(name: &str) -> McpError {
    let suggestions = suggest(name, &tool_names(), 3);
    let mut message = format!("Unknown tool: {}", name);
    if !suggestions.is_empty() {
        message.push_str(&format!("\nDid you mean: {}", suggestions.join(", ")));
    }
    McpError::new(ErrorCode::InvalidParams, message)
}

/// Validates call arguments against the tool's input schema. A missing
/// arguments object is treated as `{}`.
pub fn validate_tool_args(tool_name: &str, args: &Value) -> Result<(), McpError> {
    let Some(tool) = tool_by_name(tool_name) else {
        return Err(unknown_tool_error(tool_name));
    };
    let Some(schema) = TOOL_VALIDATORS.get(tool_name) else {
        return Ok(());
    };
    let empty = Value::Object(Default::default());
    let args = if args.is_null() { &empty } else { args };
    if let Err(errors) = schema.validate(args) {
        let message = format_schema_errors(tool_name, args, errors, &tool.input_schema);
        return Err(McpError::new(ErrorCode::InvalidParams, message));
    }
    Ok(())
}

fn format_schema_errors(
    tool_name: &str,
    args: &Value,
    errors: jsonschema::ErrorIterator,
    schema: &Value,
) -> String {
    let header = format!("Invalid arguments for {}", tool_name);
    let mut rendered = Vec::new();
    let mut did_you_means = Vec::new();

    for err in errors.take(10) {
        let instance_path = if err.instance_path.to_string().is_empty() {
            "(root)".to_string()
        } else {
            err.instance_path.to_string()
        };
        match &err.kind {
            jsonschema::error::ValidationErrorKind::AdditionalProperties { unexpected } => {
                if unexpected.is_empty() {
                    rendered.push(format!("{}: unknown field", instance_path));
                }
                for unknown in unexpected {
                    rendered.push(format!("{}: unknown field '{}'", instance_path, unknown));
                    if let Some(parent) = schema_parent_at(schema, err.schema_path.to_string()) {
                        let props: Vec<String> = parent
                            .get("properties")
                            .and_then(|v| v.as_object())
                            .map(|map| map.keys().cloned().collect())
                            .unwrap_or_default();
                        let suggestions = suggest(unknown, &props, 3);
                        if !suggestions.is_empty() {
                            did_you_means.push(format!(
                                "field '{}': {}",
                                unknown,
                                suggestions.join(", ")
                            ));
                        }
                    }
                }
            }
            jsonschema::error::ValidationErrorKind::Enum { options } => {
                let allowed_list: Vec<String> = options
                    .as_array()
                    .map(|arr| {
                        arr.iter()
                            .map(|v| {
                                v.as_str()
                                    .map(|s| s.to_string())
                                    .unwrap_or_else(|| v.to_string())
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                if allowed_list.is_empty() {
                    rendered.push(format!("{}: invalid value", instance_path));
                } else {
                    rendered.push(format!(
                        "{}: expected one of {}",
                        instance_path,
                        allowed_list.join(", ")
                    ));
                    let received = schema_node_at(args, &err.instance_path.to_string());
                    let suggestions = suggest(received.as_str().unwrap_or(""), &allowed_list, 3);
                    if !suggestions.is_empty() {
                        did_you_means.push(format!("{}: {}", instance_path, suggestions.join(", ")));
                    }
                }
            }
            jsonschema::error::ValidationErrorKind::Required { property } => {
                let prop = property
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| property.to_string());
                rendered.push(format!("{}: missing required field '{}'", instance_path, prop));
            }
            jsonschema::error::ValidationErrorKind::Type { kind } => {
                rendered.push(format!("{}: expected {}", instance_path, format_type_kind(kind)));
            }
            _ => {
                rendered.push(format!("{}: {}", instance_path, err));
            }
        }
    }

    let mut lines = vec![header];
    lines.extend(rendered.iter().map(|line| format!("- {}", line)));
    if !did_you_means.is_empty() {
        lines.push(format!(
            "Did you mean: {}",
            did_you_means
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(" | ")
        ));
    }
    lines.join("\n")
}

fn format_type_kind(kind: &jsonschema::error::TypeKind) -> String {
    match kind {
        jsonschema::error::TypeKind::Single(primitive) => primitive.to_string(),
        jsonschema::error::TypeKind::Multiple(types) => {
            let list: Vec<String> = (*types).into_iter().map(|t| t.to_string()).collect();
            if list.is_empty() {
                "unknown".to_string()
            } else {
                list.join(" | ")
            }
        }
    }
}

/// Walks a schema path such as `/properties/user_credentials/additionalProperties`
/// up to the node that owns the failing keyword.
fn schema_parent_at(schema: &Value, schema_path: String) -> Option<Value> {
    let mut current = schema;
    let segments: Vec<&str> = schema_path.split('/').filter(|s| !s.is_empty()).collect();
    let owner = segments.len().saturating_sub(1);
    for segment in &segments[..owner] {
        if let Some(obj) = current.as_object() {
            current = obj.get(*segment)?;
        } else if let Some(arr) = current.as_array() {
            let idx = segment.parse::<usize>().ok()?;
            current = arr.get(idx)?;
        }
    }
    Some(current.clone())
}

fn schema_node_at(root: &Value, instance_path: &str) -> Value {
    let mut current = root;
    for segment in instance_path.trim_start_matches('/').split('/') {
        if segment.is_empty() {
            continue;
        }
        if let Some(obj) = current.as_object() {
            current = obj.get(segment).unwrap_or(&Value::Null);
        } else if let Some(arr) = current.as_array() {
            let idx = segment.parse::<usize>().unwrap_or(0);
            current = arr.get(idx).unwrap_or(&Value::Null);
        }
    }
    current.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn creds() -> Value {
        json!({"access_token": "t", "client_id": "c", "profile_id": 1})
    }

    #[test]
    fn catalog_lists_every_tool_with_compilable_schema() {
        let names = tool_names();
        for expected in [
            "get_profiles",
            "get_campaigns",
            "get_ad_groups",
            "get_keywords",
            "get_product_ads",
            "get_reports",
            "healthcheck",
        ] {
            assert!(names.contains(&expected.to_string()), "{expected}");
            assert!(TOOL_VALIDATORS.contains_key(expected), "{expected}");
        }
    }

    #[test]
    fn valid_arguments_pass() {
        validate_tool_args(
            "get_reports",
            &json!({"user_credentials": creds(), "report_type": "keywords", "start_date": "20240101"}),
        )
        .unwrap();
        validate_tool_args("healthcheck", &Value::Null).unwrap();
    }

    #[test]
    fn unknown_field_gets_suggestion() {
        let err = validate_tool_args(
            "get_campaigns",
            &json!({"user_credentials": creds(), "state_filtr": "enabled"}),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert!(err.message.contains("unknown field 'state_filtr'"));
        assert!(err.message.contains("state_filter"));
    }

    #[test]
    fn enum_and_required_errors_are_rendered() {
        let err = validate_tool_args(
            "get_reports",
            &json!({"user_credentials": creds(), "report_type": "keyword"}),
        )
        .unwrap_err();
        assert!(err.message.contains("expected one of"));
        assert!(err.message.contains("Did you mean"));

        let err = validate_tool_args("get_reports", &json!({"report_type": "campaigns"})).unwrap_err();
        assert!(err.message.contains("missing required field 'user_credentials'"));
    }

    #[test]
    fn unknown_tool_is_invalid_params_with_suggestions() {
        let err = validate_tool_args("get_report", &json!({})).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert!(err.message.contains("get_reports"));
    }
}
