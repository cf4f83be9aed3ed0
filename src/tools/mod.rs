//! Local tools the model can invoke.
//!
//! The catalog is a static table: the same entries drive the system-prompt
//! section, parameter validation and dispatch.

mod catalog;
mod executor;
mod fs;
mod git;
mod indicator;
mod search;
mod shell;
mod system;
mod web;

pub use catalog::{catalog, find_definition, tools_prompt, ToolDefinition};
pub use executor::{ExecutionContext, Executor, DEFAULT_SHELL_TIMEOUT_SECS};
pub use indicator::{indicator, start_label, ToolIndicator};

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A tool invocation parsed from model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default, deserialize_with = "stringified_params")]
    pub params: BTreeMap<String, String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Parameter value, treating empty strings as absent.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn param_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.param(key).unwrap_or(default)
    }
}

/// Models send numbers and booleans as often as strings; keep their JSON text.
fn stringified_params<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (k, value)
        })
        .collect())
}

/// Outcome of one tool execution. `error` is set exactly when `success` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn err_with_output(error: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_call_with_string_params() {
        let call: ToolCall =
            serde_json::from_str(r#"{"name": "read_file", "params": {"path": "main.rs"}}"#)
                .unwrap();
        assert_eq!(call.name, "read_file");
        assert_eq!(call.param("path"), Some("main.rs"));
    }

    #[test]
    fn test_parse_tool_call_stringifies_scalars() {
        let call: ToolCall = serde_json::from_str(
            r#"{"name": "git_log", "params": {"count": 5, "staged": true, "x": null}}"#,
        )
        .unwrap();
        assert_eq!(call.param("count"), Some("5"));
        assert_eq!(call.param("staged"), Some("true"));
        assert_eq!(call.param("x"), None);
    }

    #[test]
    fn test_missing_params_is_empty() {
        let call: ToolCall = serde_json::from_str(r#"{"name": "git_status"}"#).unwrap();
        assert!(call.params.is_empty());
        assert_eq!(call.param_or("path", "."), ".");
    }

    #[test]
    fn test_result_error_invariant() {
        assert!(ToolResult::ok("x").error.is_none());
        let failed = ToolResult::err_with_output("exit status: 1", "partial");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("exit status: 1"));
        assert_eq!(failed.output, "partial");
    }
}
