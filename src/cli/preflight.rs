//! Pre-flight checks before starting a conversation.
//!
//! Validates that the provider can be reached with a key and that the
//! external programs the tools shell out to are available, so problems show
//! up before the first model call rather than in the middle of a turn.

use crate::cli::Output;
use crate::config::{ResolvedProvider, Settings};
use crate::error::{Result, SkiffError};
use std::process::Command;

/// External programs used by the tools.
pub const REQUIRED_TOOLS: &[&str] = &["sh", "git"];

/// Resolve the provider, printing a hint when it cannot be used.
pub fn provider(
    settings: &Settings,
    name: Option<&str>,
    model: Option<&str>,
) -> Result<ResolvedProvider> {
    match settings.resolve_provider(name, model) {
        Ok(resolved) => Ok(resolved),
        Err(e) => {
            Output::error(&e.to_string());
            match &e {
                SkiffError::UnknownProvider(_) => {
                    Output::info("Run 'skiff providers' to see the available providers.")
                }
                _ => Output::info("Run 'skiff doctor' for detailed diagnostics."),
            }
            Err(e)
        }
    }
}

/// Warn about missing external programs. Never fatal: only the tools that
/// need them will fail.
pub fn warn_missing_tools() {
    for name in REQUIRED_TOOLS {
        if let Err(e) = tool_version(name) {
            Output::warning(&format!("{} (some tools will not work)", e));
        }
    }
}

/// First line of `<name> --version`.
pub fn tool_version(name: &str) -> Result<String> {
    let args: &[&str] = match name {
        // POSIX sh has no --version.
        "sh" => &["-c", "echo available"],
        _ => &["--version"],
    };
    match Command::new(name).args(args).output() {
        Ok(output) if output.status.success() => Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("installed")
            .trim()
            .to_string()),
        Ok(_) => Err(SkiffError::Config(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SkiffError::Config(format!("{} not found", name)))
        }
        Err(e) => Err(SkiffError::Config(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sh_is_available() {
        assert_eq!(tool_version("sh").unwrap(), "available");
    }

    #[test]
    fn test_missing_tool() {
        let err = tool_version("skiff-definitely-not-installed").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_unknown_provider_is_reported() {
        let err = provider(&Settings::default(), Some("nowhere"), None).unwrap_err();
        assert!(matches!(err, SkiffError::UnknownProvider(_)));
    }
}
