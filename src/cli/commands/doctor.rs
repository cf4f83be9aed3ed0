//! Doctor command - verify system requirements and configuration.

use crate::cli::preflight::{tool_version, REQUIRED_TOOLS};
use crate::cli::Output;
use crate::config::{api_key_env_var, api_key_file, Settings};
use crate::error::SkiffError;
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn print_section(title: &str, checks: &[CheckResult]) {
    println!("{}", style(title).bold());
    for check in checks {
        check.print();
    }
    println!();
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("Skiff Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let sections: [(&str, Vec<CheckResult>); 4] = [
        ("External Tools", REQUIRED_TOOLS.iter().map(|name| check_tool(name)).collect()),
        ("Provider", vec![check_provider(settings)]),
        ("Storage", check_storage(settings)),
        ("Configuration", vec![check_config_file(config_path)]),
    ];

    let mut errors = 0;
    let mut warnings = 0;
    for (title, checks) in &sections {
        print_section(title, checks);
        errors += checks.iter().filter(|c| c.status == CheckStatus::Error).count();
        warnings += checks.iter().filter(|c| c.status == CheckStatus::Warning).count();
    }

    if errors > 0 {
        anyhow::bail!("{} error(s) found. Please fix them before using Skiff.", errors);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Skiff is ready to use.");
    }

    Ok(())
}

fn check_tool(name: &str) -> CheckResult {
    match tool_version(name) {
        Ok(version) => CheckResult::ok(name, &crate::cli::output::one_line(&version, 50)),
        Err(e) => CheckResult::error(name, &e.to_string(), install_hint(name)),
    }
}

/// Whether the configured provider resolves and has a key.
fn check_provider(settings: &Settings) -> CheckResult {
    let name = settings.provider.name.as_str();
    match settings.resolve_provider(None, None) {
        Ok(resolved) => CheckResult::ok(
            name,
            &format!("{} at {} (key {})", resolved.model, resolved.base_url, resolved.masked_key()),
        ),
        Err(SkiffError::MissingApiKey { .. }) => CheckResult::error(
            name,
            "no API key",
            &format!(
                "Set {}, write the key to {}, or run: skiff config set provider.api_key <key>",
                api_key_env_var(name),
                api_key_file(name).display()
            ),
        ),
        Err(SkiffError::UnknownProvider(_)) => CheckResult::error(
            name,
            "unknown provider",
            "Run 'skiff providers' to see the available providers",
        ),
        Err(e) => CheckResult::error(
            name,
            &e.to_string(),
            "Check the [provider] section of the config",
        ),
    }
}

fn check_storage(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let data_dir = settings.data_dir();
    if data_dir.exists() {
        results.push(CheckResult::ok("Data directory", &data_dir.display().to_string()));
    } else {
        results.push(CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        ));
    }

    let db_path = settings.sessions_db_path();
    if db_path.exists() {
        let size = std::fs::metadata(&db_path)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        results.push(CheckResult::ok(
            "Session database",
            &format!("{} ({})", db_path.display(), size),
        ));
    } else {
        results.push(CheckResult::warning(
            "Session database",
            &format!("{} (not created yet)", db_path.display()),
            "Database will be created by the first chat",
        ));
    }

    results
}

fn check_config_file(config_path: &Path) -> CheckResult {
    if !config_path.exists() {
        return CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: skiff config edit",
        );
    }
    match Settings::load_from(Some(config_path)) {
        Ok(_) => CheckResult::ok("Config file", &config_path.display().to_string()),
        Err(e) => CheckResult::error("Config file", &e.to_string(), "Fix with: skiff config edit"),
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn install_hint(tool: &str) -> &'static str {
    match tool {
        "git" if cfg!(target_os = "macos") => {
            "Install with: xcode-select --install (or brew install git)"
        }
        "git" => "Install with: sudo apt install git (or your package manager)",
        _ => "Install a POSIX shell and make sure it is on PATH",
    }
}
