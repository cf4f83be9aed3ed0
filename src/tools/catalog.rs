use std::fmt::Write;

/// Static description of one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    /// Every accepted parameter, in display order.
    pub parameters: &'static [&'static str],
    /// Subset of `parameters` that must be present and non-empty.
    pub required: &'static [&'static str],
}

impl ToolDefinition {
    const fn new(
        name: &'static str,
        description: &'static str,
        parameters: &'static [&'static str],
        required: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            description,
            parameters,
            required,
        }
    }

    pub fn is_required(&self, param: &str) -> bool {
        self.required.contains(&param)
    }
}

const CATALOG: &[ToolDefinition] = &[
    // File operations
    ToolDefinition::new("read_file", "Read the contents of a file", &["path"], &["path"]),
    ToolDefinition::new(
        "write_file",
        "Write content to a file (creates or overwrites)",
        &["path", "content"],
        &["path"],
    ),
    ToolDefinition::new(
        "edit_file",
        "Replace specific text in a file",
        &["path", "old_content", "new_content"],
        &["path", "old_content"],
    ),
    ToolDefinition::new("list_directory", "List files and folders in a directory", &["path"], &[]),
    ToolDefinition::new("create_directory", "Create a new directory", &["path"], &["path"]),
    ToolDefinition::new("delete_file", "Delete a file or empty directory", &["path"], &["path"]),
    ToolDefinition::new(
        "copy_file",
        "Copy a file to a new location",
        &["source", "destination"],
        &["source", "destination"],
    ),
    ToolDefinition::new(
        "move_file",
        "Move a file to a new location",
        &["source", "destination"],
        &["source", "destination"],
    ),
    // Search & analysis
    ToolDefinition::new(
        "find_files",
        "Search for files matching a glob pattern",
        &["path", "pattern"],
        &[],
    ),
    ToolDefinition::new(
        "grep_files",
        "Search for text in files",
        &["path", "pattern", "file_pattern"],
        &["pattern"],
    ),
    ToolDefinition::new(
        "code_search",
        "Search code with a language filter (rust, go, python, js, ts, etc)",
        &["path", "pattern", "language"],
        &["pattern"],
    ),
    ToolDefinition::new(
        "find_todos",
        "Find TODO, FIXME, HACK and XXX comments in code",
        &["path"],
        &[],
    ),
    ToolDefinition::new("count_lines", "Count lines of code per language", &["path"], &[]),
    ToolDefinition::new("analyze_code", "Analyze code structure and statistics", &["path"], &[]),
    ToolDefinition::new(
        "project_tree",
        "Show project structure as a tree",
        &["path", "depth"],
        &[],
    ),
    // Command execution
    ToolDefinition::new("run_command", "Execute a shell command", &["command"], &["command"]),
    // Git
    ToolDefinition::new("git_status", "Show git repository status", &[], &[]),
    ToolDefinition::new(
        "git_diff",
        "Show git diff (use staged=true for staged changes)",
        &["staged"],
        &[],
    ),
    ToolDefinition::new("git_log", "Show recent git commits", &["count"], &[]),
    ToolDefinition::new("git_branch", "Show git branches", &[], &[]),
    ToolDefinition::new(
        "git_add",
        "Stage files for commit (space separated, default .)",
        &["files"],
        &[],
    ),
    ToolDefinition::new("git_commit", "Create a git commit", &["message"], &["message"]),
    ToolDefinition::new("git_push", "Push to a remote repository", &["remote", "branch"], &[]),
    ToolDefinition::new("git_pull", "Pull from a remote repository", &["remote", "branch"], &[]),
    // Web
    ToolDefinition::new("web_search", "Search the web using DuckDuckGo", &["query"], &["query"]),
    ToolDefinition::new("fetch_url", "Fetch the text content of a URL", &["url"], &["url"]),
    // System
    ToolDefinition::new("get_cwd", "Get the current working directory", &[], &[]),
    ToolDefinition::new(
        "change_directory",
        "Change the current working directory",
        &["path"],
        &["path"],
    ),
    ToolDefinition::new("system_info", "Get system information", &[], &[]),
];

/// All registered tools, in prompt order.
pub fn catalog() -> &'static [ToolDefinition] {
    CATALOG
}

pub fn find_definition(name: &str) -> Option<&'static ToolDefinition> {
    CATALOG.iter().find(|def| def.name == name)
}

/// System-prompt section describing the tools and the call format.
pub fn tools_prompt() -> String {
    let mut prompt = String::from("\n\n## Available Tools\n\n");
    prompt.push_str("You can use tools by outputting a <tool_call> block. Format:\n\n");
    prompt.push_str(
        "```\n<tool_call>\n{\"name\": \"tool_name\", \"params\": {\"param1\": \"value1\"}}\n</tool_call>\n```\n\n",
    );
    prompt.push_str("Available tools:\n\n");

    for def in CATALOG {
        let params = if def.parameters.is_empty() {
            "none".to_string()
        } else {
            def.parameters
                .iter()
                .map(|p| {
                    if def.is_required(p) {
                        (*p).to_string()
                    } else {
                        format!("{} (optional)", p)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _ = write!(
            prompt,
            "- **{}**: {}\n  Parameters: {}\n\n",
            def.name, def.description, params
        );
    }

    prompt.push_str("\n### Tool Usage Examples:\n\n");
    for (label, example) in [
        ("To read a file", r#"{"name": "read_file", "params": {"path": "src/main.rs"}}"#),
        ("To list a directory", r#"{"name": "list_directory", "params": {"path": "."}}"#),
        (
            "To write a file",
            r#"{"name": "write_file", "params": {"path": "notes.txt", "content": "Hello World"}}"#,
        ),
        (
            "To run a command",
            r#"{"name": "run_command", "params": {"command": "cargo --version"}}"#,
        ),
    ] {
        let _ = write!(prompt, "{}:\n```\n<tool_call>\n{}\n</tool_call>\n```\n\n", label, example);
    }

    prompt.push_str(
        "IMPORTANT: Always use tools when the user asks about files, folders, or wants to run commands. \
         Don't just describe what to do, actually use the tools!\n",
    );

    prompt
}
