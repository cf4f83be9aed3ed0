use super::catalog::find_definition;
use super::{fs, git, search, shell, system, web, ToolCall, ToolResult};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

/// Default deadline for `run_command`.
pub const DEFAULT_SHELL_TIMEOUT_SECS: u64 = 30;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-agent state threaded through every tool call.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Base for relative paths; only `change_directory` moves it.
    pub cwd: PathBuf,
    pub shell_timeout: Duration,
    pub http: reqwest::Client,
}

impl ExecutionContext {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("skiff/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            cwd: cwd.into(),
            shell_timeout: Duration::from_secs(DEFAULT_SHELL_TIMEOUT_SECS),
            http,
        }
    }

    /// Context rooted at the process working directory.
    pub fn from_process_cwd() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn with_shell_timeout(mut self, timeout: Duration) -> Self {
        self.shell_timeout = timeout;
        self
    }

    /// Resolve a tool path against `cwd`, expanding `~` and dropping `.`/`..`.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path);
        let candidate = Path::new(expanded.as_ref());
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.cwd.join(candidate)
        };
        normalize(&joined)
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Dispatches tool calls against the static catalog.
///
/// Stateless: everything mutable lives in the [`ExecutionContext`]. Failures
/// are always reported as a failed [`ToolResult`], never as a panic or error.
#[derive(Debug, Default, Clone, Copy)]
pub struct Executor;

impl Executor {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, call, ctx), fields(tool = %call.name))]
    pub async fn execute(&self, call: &ToolCall, ctx: &mut ExecutionContext) -> ToolResult {
        let Some(def) = find_definition(&call.name) else {
            return ToolResult::err(format!("unknown tool: {}", call.name));
        };

        if let Some(missing) = def
            .parameters
            .iter()
            .find(|p| def.is_required(p) && call.param(p).is_none())
        {
            return ToolResult::err(format!("{} parameter required", missing));
        }

        debug!("Executing {} with {:?}", call.name, call.params);

        // Required parameters are validated above; `req` cannot miss.
        let req = |key: &str| call.param(key).unwrap_or_default();
        let opt = |key: &str, default: &'static str| call.param(key).unwrap_or(default);

        match def.name {
            "read_file" => fs::read_file(ctx, req("path")).await,
            "write_file" => fs::write_file(ctx, req("path"), opt("content", "")).await,
            "edit_file" => {
                fs::edit_file(ctx, req("path"), req("old_content"), opt("new_content", "")).await
            }
            "list_directory" => fs::list_directory(ctx, opt("path", ".")).await,
            "create_directory" => fs::create_directory(ctx, req("path")).await,
            "delete_file" => fs::delete_file(ctx, req("path")).await,
            "copy_file" => fs::copy_file(ctx, req("source"), req("destination")).await,
            "move_file" => fs::move_file(ctx, req("source"), req("destination")).await,

            "find_files" => search::find_files(ctx, opt("path", "."), opt("pattern", "*")).await,
            "grep_files" => {
                search::grep_files(
                    ctx,
                    opt("path", "."),
                    req("pattern"),
                    call.param("file_pattern"),
                )
                .await
            }
            "code_search" => {
                search::code_search(ctx, opt("path", "."), req("pattern"), call.param("language"))
                    .await
            }
            "find_todos" => search::find_todos(ctx, opt("path", ".")).await,
            "count_lines" => search::count_lines(ctx, opt("path", ".")).await,
            "analyze_code" => search::analyze_code(ctx, opt("path", ".")).await,
            "project_tree" => {
                let depth = parse_count(call.param("depth"), 3);
                search::project_tree(ctx, opt("path", "."), depth).await
            }

            "run_command" => shell::run_command(ctx, req("command")).await,

            "git_status" => git::status(ctx).await,
            "git_diff" => git::diff(ctx, call.param("staged") == Some("true")).await,
            "git_log" => git::log(ctx, parse_count(call.param("count"), 10)).await,
            "git_branch" => git::branch(ctx).await,
            "git_add" => git::add(ctx, opt("files", ".")).await,
            "git_commit" => git::commit(ctx, req("message")).await,
            "git_push" => git::push(ctx, call.param("remote"), call.param("branch")).await,
            "git_pull" => git::pull(ctx, call.param("remote"), call.param("branch")).await,

            "web_search" => web::web_search(ctx, req("query")).await,
            "fetch_url" => web::fetch_url(ctx, req("url")).await,

            "get_cwd" => system::get_cwd(ctx),
            "change_directory" => system::change_directory(ctx, req("path")).await,
            "system_info" => system::system_info().await,

            other => ToolResult::err(format!("unknown tool: {}", other)),
        }
    }
}

/// Parse a positive count, falling back to `default` on garbage or zero.
fn parse_count(value: Option<&str>, default: usize) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}
