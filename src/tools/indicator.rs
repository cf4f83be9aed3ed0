use super::ToolCall;

/// How a running tool is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolIndicator {
    pub icon: &'static str,
    pub action: &'static str,
    pub description: &'static str,
    pub category: &'static str,
}

const fn ind(
    icon: &'static str,
    action: &'static str,
    description: &'static str,
    category: &'static str,
) -> ToolIndicator {
    ToolIndicator {
        icon,
        action,
        description,
        category,
    }
}

/// Indicator for a tool name; unknown names get a generic wrench.
pub fn indicator(name: &str) -> ToolIndicator {
    match name {
        "read_file" => ind("📖", "Reading", "Reading file contents", "file"),
        "write_file" => ind("✍️", "Writing", "Writing file", "file"),
        "edit_file" => ind("📝", "Editing", "Editing file", "file"),
        "list_directory" => ind("📁", "Listing", "Listing directory", "file"),
        "create_directory" => ind("📂", "Creating", "Creating directory", "file"),
        "delete_file" => ind("🗑️", "Deleting", "Deleting file", "file"),
        "copy_file" => ind("📋", "Copying", "Copying file", "file"),
        "move_file" => ind("📦", "Moving", "Moving file", "file"),

        "find_files" => ind("🔍", "Searching", "Finding files", "search"),
        "grep_files" => ind("🔎", "Searching", "Searching in files", "search"),
        "code_search" => ind("🔬", "Analyzing", "Searching code", "search"),

        "find_todos" => ind("📋", "Finding", "Finding TODOs", "analysis"),
        "count_lines" => ind("📏", "Counting", "Counting lines", "analysis"),
        "analyze_code" => ind("🔬", "Analyzing", "Analyzing code", "analysis"),
        "project_tree" => ind("🌳", "Mapping", "Building project tree", "analysis"),

        "run_command" => ind("⚡", "Running", "Executing command", "command"),

        "git_status" => ind("📊", "Checking", "Git status", "git"),
        "git_diff" => ind("📃", "Diffing", "Git diff", "git"),
        "git_log" => ind("📜", "Viewing", "Git history", "git"),
        "git_branch" => ind("🌿", "Branching", "Git branch", "git"),
        "git_add" => ind("➕", "Staging", "Git add", "git"),
        "git_commit" => ind("💾", "Committing", "Git commit", "git"),
        "git_push" => ind("🚀", "Pushing", "Git push", "git"),
        "git_pull" => ind("⬇️", "Pulling", "Git pull", "git"),

        "web_search" => ind("🌐", "Searching", "Searching the web", "web"),
        "fetch_url" => ind("🌐", "Fetching", "Fetching URL", "web"),

        "get_cwd" => ind("📍", "Getting", "Current directory", "system"),
        "change_directory" => ind("🚶", "Changing", "Changing directory", "system"),
        "system_info" => ind("💻", "Checking", "System info", "system"),

        _ => ind("🔧", "Executing", "Running tool", "unknown"),
    }
}

/// One-line "starting" label, e.g. ``📖 Reading `src/main.rs` ``.
pub fn start_label(call: &ToolCall) -> String {
    let indicator = indicator(&call.name);

    let details = match call.name.as_str() {
        "read_file" | "write_file" | "edit_file" | "delete_file" | "create_directory" => {
            call.param("path").map(|p| format!("`{}`", truncate_start(p, 40)))
        }
        "list_directory" | "change_directory" | "project_tree" => call
            .param("path")
            .filter(|p| *p != ".")
            .map(|p| format!("`{}`", truncate_start(p, 40))),
        "copy_file" | "move_file" => match (call.param("source"), call.param("destination")) {
            (Some(src), Some(dst)) => Some(format!(
                "`{}` → `{}`",
                truncate_start(src, 30),
                truncate_start(dst, 30)
            )),
            _ => None,
        },
        "run_command" => call
            .param("command")
            .map(|c| format!("`{}`", truncate_end(c, 50))),
        "grep_files" | "find_files" | "code_search" => {
            call.param("pattern").map(|p| format!("for `{}`", truncate_end(p, 40)))
        }
        "web_search" => call.param("query").map(|q| format!("`{}`", truncate_end(q, 40))),
        "fetch_url" => call.param("url").map(|u| format!("`{}`", truncate_end(u, 50))),
        "git_commit" => call
            .param("message")
            .map(|m| format!("`{}`", truncate_end(m, 40))),
        _ => None,
    };

    match details {
        Some(details) => format!("{} {} {}", indicator.icon, indicator.action, details),
        None if indicator.category == "unknown" => {
            format!("{} {} {}", indicator.icon, indicator.action, call.name)
        }
        None => format!("{} {}", indicator.icon, indicator.description),
    }
}

/// Keep the tail of long paths: `...src/agent/runner.rs`.
fn truncate_start(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    let tail: String = s.chars().skip(count - (max - 3)).collect();
    format!("...{}", tail)
}

fn truncate_end(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max - 3).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::catalog;

    #[test]
    fn test_every_catalog_tool_has_indicator() {
        for def in catalog() {
            assert_ne!(indicator(def.name).category, "unknown", "{}", def.name);
        }
    }

    #[test]
    fn test_start_label_with_path() {
        let call = ToolCall::new("read_file").with_param("path", "src/main.rs");
        assert_eq!(start_label(&call), "📖 Reading `src/main.rs`");
    }

    #[test]
    fn test_start_label_without_details() {
        assert_eq!(start_label(&ToolCall::new("git_status")), "📊 Git status");
        let dot = ToolCall::new("list_directory").with_param("path", ".");
        assert_eq!(start_label(&dot), "📁 Listing directory");
        assert_eq!(start_label(&ToolCall::new("frobnicate")), "🔧 Executing frobnicate");
    }

    #[test]
    fn test_truncation_is_char_safe() {
        let long = "ä".repeat(60);
        let label = truncate_end(&long, 10);
        assert_eq!(label.chars().count(), 10);
        assert!(label.ends_with("..."));
        assert_eq!(truncate_start("abcdefghij", 8), "...fghij");
    }
}
