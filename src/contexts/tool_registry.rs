use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::data::{Message, RequirementField, RequirementsRecord, ToolCall, ToolSpec};

#[derive(Debug, Error)]
pub enum ToolError {
    /// The model asked for a tool that is not registered. Never recoverable.
    #[error("unknown tool '{0}' (registered tools: update_requirement, get_requirements)")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {details}")]
    InvalidArguments { tool: ToolName, details: String },
}

impl ToolError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ToolError::UnknownTool(_))
    }
}

/// Closed set of tools the requirements agent may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    UpdateRequirement,
    GetRequirements,
}

impl ToolName {
    pub const ALL: [ToolName; 2] = [ToolName::UpdateRequirement, ToolName::GetRequirements];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::UpdateRequirement => "update_requirement",
            ToolName::GetRequirements => "get_requirements",
        }
    }

    pub fn spec(&self) -> ToolSpec {
        match self {
            ToolName::UpdateRequirement => ToolSpec {
                name: self.as_str(),
                description: "Useful when question about requirement has been answered. \
                              Requirements can be model, fields, or folder_location.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "variable_name": {
                            "type": "string",
                            "enum": ["model", "fields", "folder_location"],
                            "description": "The name of the requirement to update. Name can be model, fields, or folder_location."
                        },
                        "value": {
                            "type": "string",
                            "description": "The value to update the requirement with. Fields are a comma-separated list."
                        }
                    },
                    "required": ["variable_name", "value"]
                }),
            },
            ToolName::GetRequirements => ToolSpec {
                name: self.as_str(),
                description: "Useful when the user asks to retrieve the current requirements. \
                              Also useful to provide you with information that you don't have access to.",
                parameters: json!({ "type": "object", "properties": {} }),
            },
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

/// `update_requirement`: echoes the pair back as `{variable_name: value}`.
pub fn update_requirement(variable_name: &str, value: &str) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(variable_name.to_string(), Value::String(value.to_string()));
    Value::Object(map)
}

/// `get_requirements`: a marker; the dispatcher renders the actual record.
pub fn get_requirements() -> Value {
    json!({ "instructions": "Display the state variables." })
}

/// Outcome of one dispatched call.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub tool: ToolName,
    /// Raw tool return value.
    pub output: Value,
    /// Tool-result message to append to the conversation.
    pub message: Message,
}

/// Dispatch table for the requirements tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolRegistry;

impl ToolRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        ToolName::ALL.iter().map(|t| t.spec()).collect()
    }

    /// Runs `call` by exact name.
    ///
    /// # Errors
    /// [`ToolError::UnknownTool`] for names outside the registry (fatal) and
    /// [`ToolError::InvalidArguments`] for malformed argument bags.
    pub fn dispatch(&self, call: &ToolCall, requirements: &RequirementsRecord) -> Result<Dispatched, ToolError> {
        let tool: ToolName = call.name.parse()?;
        log::debug!("Dispatching tool {} with {}", tool, call.arguments);

        let (output, content) = match tool {
            ToolName::UpdateRequirement => {
                let variable_name = string_arg(tool, &call.arguments, "variable_name")?;
                let value = string_arg(tool, &call.arguments, "value")?;
                variable_name
                    .parse::<RequirementField>()
                    .map_err(|details| ToolError::InvalidArguments { tool, details })?;
                let output = update_requirement(variable_name, value);
                let content = output.to_string();
                (output, content)
            }
            ToolName::GetRequirements => {
                let output = get_requirements();
                let rendered = serde_json::to_string(requirements).unwrap_or_else(|_| "{}".to_string());
                (output, format!("Here are the requirements: {}\n", rendered))
            }
        };

        Ok(Dispatched {
            tool,
            message: Message::tool_result(call, content),
            output,
        })
    }
}

fn string_arg<'a>(tool: ToolName, args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments {
            tool,
            details: format!("missing string argument '{}'", key),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn test_update_requirement_echoes_pair() {
        assert_eq!(update_requirement("model", "User"), json!({ "model": "User" }));
    }

    #[test]
    fn test_dispatch_update_requirement() {
        let registry = ToolRegistry::new();
        let record = RequirementsRecord::new();
        let result = registry
            .dispatch(&call("update_requirement", json!({"variable_name": "fields", "value": "id,name"})), &record)
            .expect("dispatch");

        assert_eq!(result.tool, ToolName::UpdateRequirement);
        assert_eq!(result.output, json!({ "fields": "id,name" }));
        assert_eq!(result.message.name.as_deref(), Some("update_requirement"));
    }

    #[test]
    fn test_dispatch_get_requirements_renders_record() {
        let registry = ToolRegistry::new();
        let mut record = RequirementsRecord::new();
        record.apply(RequirementField::Model, "User");

        let result = registry
            .dispatch(&call("get_requirements", json!({})), &record)
            .expect("dispatch");
        assert_eq!(result.output, get_requirements());
        assert!(result.message.content.starts_with("Here are the requirements: "));
        assert!(result.message.content.contains("\"model\":\"User\""));
    }

    #[test]
    fn test_unknown_tool_is_fatal() {
        let registry = ToolRegistry::new();
        let err = registry
            .dispatch(&call("delete_everything", json!({})), &RequirementsRecord::new())
            .expect_err("unknown tool must fail");
        assert!(matches!(err, ToolError::UnknownTool(ref name) if name == "delete_everything"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_bad_arguments_are_not_fatal() {
        let registry = ToolRegistry::new();
        let err = registry
            .dispatch(&call("update_requirement", json!({"variable_name": "colour", "value": "red"})), &RequirementsRecord::new())
            .expect_err("invalid variable");
        assert!(!err.is_fatal());

        let err = registry
            .dispatch(&call("update_requirement", json!({"value": "x"})), &RequirementsRecord::new())
            .expect_err("missing argument");
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_specs_cover_registry() {
        let names: Vec<&str> = ToolRegistry::new().specs().iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["update_requirement", "get_requirements"]);
    }
}
