//! System prompt assembly.

use super::Settings;
use crate::tools::tools_prompt;

const DEFAULT_PERSONA: &str = r#"You are Skiff, a coding assistant running in the user's terminal with direct access to their filesystem, shell and git repository.

## How to work
- Act instead of describing: when a tool can answer the question, call it.
- Read files before changing them and check the result after.
- Prefer small, targeted edits over rewriting whole files.
- When a tool fails, read the error, explain it and try another approach.
- Split larger tasks into steps and finish each before starting the next.

## Style
- Reply in the language the user writes in.
- Use markdown, with a language tag on every code block.
- After using tools, summarise what you found or changed."#;

/// The full system prompt: persona (custom or built-in) followed by the tool
/// catalog and call format.
pub fn system_prompt(settings: &Settings) -> String {
    let persona = settings.agent.system_prompt.trim();
    let persona = if persona.is_empty() { DEFAULT_PERSONA } else { persona };
    format!("{}{}", persona, tools_prompt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_persona_keeps_tool_section() {
        let mut settings = Settings::default();
        assert!(system_prompt(&settings).starts_with("You are Skiff"));

        settings.agent.system_prompt = "You are terse.".to_string();
        let prompt = system_prompt(&settings);
        assert!(prompt.starts_with("You are terse."));
        assert!(prompt.contains("<tool_call>"));
        assert!(prompt.contains("**read_file**"));
    }
}
