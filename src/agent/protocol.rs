//! The text-embedded tool-call micro-format.
//!
//! Calls arrive inside the model's prose as
//! `<tool_call>{"name": "...", "params": {...}}</tool_call>` and results go back
//! as `<tool_result name="...">...</tool_result>` blocks inside a user message.

use crate::tools::{ToolCall, ToolResult};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

const RESULTS_PREAMBLE: &str = "Tool results:\n";
const CONTINUE_INSTRUCTION: &str = "\n\nNow provide your response based on these results. \
If you need more information, use more tools. Otherwise, explain what you found.";

fn call_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").expect("tool call regex must compile")
    })
}

fn blank_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("blank run regex must compile"))
}

fn think_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("think regex must compile"))
}

/// Every well-formed tool call in `text`, in document order.
///
/// Each block is parsed on its own; a block that is not valid call JSON is
/// skipped without affecting its neighbours.
pub fn extract_calls(text: &str) -> Vec<ToolCall> {
    call_block_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let payload = caps[1].trim();
            match serde_json::from_str::<ToolCall>(payload) {
                Ok(call) if !call.name.is_empty() => Some(call),
                Ok(_) => {
                    debug!("Skipping tool call without a name");
                    None
                }
                Err(e) => {
                    debug!("Skipping malformed tool call: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// `text` with every call block removed and blank runs collapsed.
pub fn strip_calls(text: &str) -> String {
    let removed = call_block_regex().replace_all(text, "");
    blank_run_regex()
        .replace_all(&removed, "\n\n")
        .trim()
        .to_string()
}

/// Hide `<think>...</think>` reasoning spans. Display only.
pub fn strip_think_blocks(text: &str) -> String {
    think_regex().replace_all(text, "").trim().to_string()
}

/// Render one result block for the model.
pub fn format_result(call: &ToolCall, result: &ToolResult) -> String {
    let payload = if result.success {
        result.output.clone()
    } else {
        let mut payload = format!("Error: {}", result.error.as_deref().unwrap_or("unknown error"));
        if !result.output.is_empty() {
            payload.push_str("\nOutput: ");
            payload.push_str(&result.output);
        }
        payload
    };
    format!("<tool_result name=\"{}\">\n{}\n</tool_result>", call.name, payload)
}

/// The synthetic user message carrying every result of one iteration.
pub fn tool_results_message(formatted: &[String]) -> String {
    let mut message = String::from(RESULTS_PREAMBLE);
    for block in formatted {
        message.push_str(block);
        message.push_str("\n\n");
    }
    message.push_str(CONTINUE_INSTRUCTION);
    message
}

/// Render a call back into its wire form.
pub fn format_call(call: &ToolCall) -> String {
    let json = serde_json::to_string(call)
        .unwrap_or_else(|_| format!("{{\"name\":\"{}\"}}", call.name));
    format!("<tool_call>\n{}\n</tool_call>", json)
}
