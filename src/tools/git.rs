//! Git operations, run in the context's working directory.

use super::{ExecutionContext, ToolResult};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

pub async fn status(ctx: &ExecutionContext) -> ToolResult {
    git(ctx, &["status", "--short", "--branch"]).await
}

pub async fn diff(ctx: &ExecutionContext, staged: bool) -> ToolResult {
    if staged {
        git(ctx, &["diff", "--cached"]).await
    } else {
        git(ctx, &["diff"]).await
    }
}

pub async fn log(ctx: &ExecutionContext, count: usize) -> ToolResult {
    let count = format!("-{}", count);
    git(ctx, &["log", &count, "--oneline"]).await
}

pub async fn branch(ctx: &ExecutionContext) -> ToolResult {
    git(ctx, &["branch", "-a"]).await
}

/// Stage a whitespace-separated list of paths.
pub async fn add(ctx: &ExecutionContext, files: &str) -> ToolResult {
    let mut args = vec!["add", "--"];
    args.extend(files.split_whitespace());
    let result = git(ctx, &args).await;
    if result.success && result.output.is_empty() {
        return ToolResult::ok(format!("Staged: {}", files));
    }
    result
}

pub async fn commit(ctx: &ExecutionContext, message: &str) -> ToolResult {
    git(ctx, &["commit", "-m", message]).await
}

pub async fn push(
    ctx: &ExecutionContext,
    remote: Option<&str>,
    branch: Option<&str>,
) -> ToolResult {
    git(ctx, &remote_args("push", remote, branch)).await
}

pub async fn pull(
    ctx: &ExecutionContext,
    remote: Option<&str>,
    branch: Option<&str>,
) -> ToolResult {
    git(ctx, &remote_args("pull", remote, branch)).await
}

/// A branch without a remote targets `origin`.
fn remote_args<'a>(
    verb: &'a str,
    remote: Option<&'a str>,
    branch: Option<&'a str>,
) -> Vec<&'a str> {
    let mut args = vec![verb];
    match (remote, branch) {
        (Some(remote), Some(branch)) => args.extend([remote, branch]),
        (Some(remote), None) => args.push(remote),
        (None, Some(branch)) => args.extend(["origin", branch]),
        (None, None) => {}
    }
    args
}

async fn git(ctx: &ExecutionContext, args: &[&str]) -> ToolResult {
    debug!("git {}", args.join(" "));

    let command = Command::new("git")
        .args(args)
        .current_dir(&ctx.cwd)
        .stdin(Stdio::null())
        .env("GIT_TERMINAL_PROMPT", "0")
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(ctx.shell_timeout, command).await {
        Err(_) => return ToolResult::err("git command timed out"),
        Ok(Err(e)) => return ToolResult::err(format!("failed to run git: {}", e)),
        Ok(Ok(output)) => output,
    };

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&stderr);
    }

    if output.status.success() {
        ToolResult::ok(text)
    } else {
        ToolResult::err_with_output(output.status.to_string(), text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo() -> (TempDir, ExecutionContext) {
        let dir = TempDir::new().unwrap();
        for args in [
            vec!["init", "-q"],
            vec!["config", "user.name", "Skiff Test"],
            vec!["config", "user.email", "skiff@example.com"],
        ] {
            let status = std::process::Command::new("git")
                .args(&args)
                .current_dir(dir.path())
                .status()
                .unwrap();
            assert!(status.success());
        }
        let ctx = ExecutionContext::new(dir.path());
        (dir, ctx)
    }

    #[test]
    fn test_remote_args() {
        assert_eq!(remote_args("push", None, None), vec!["push"]);
        assert_eq!(remote_args("push", None, Some("main")), vec!["push", "origin", "main"]);
        assert_eq!(
            remote_args("pull", Some("upstream"), Some("dev")),
            vec!["pull", "upstream", "dev"]
        );
    }

    #[tokio::test]
    async fn test_add_commit_log() {
        let (dir, ctx) = repo();
        std::fs::write(dir.path().join("a.txt"), "one").unwrap();

        let status_before = status(&ctx).await;
        assert!(status_before.success);
        assert!(status_before.output.contains("?? a.txt"));

        assert!(add(&ctx, "a.txt").await.success);
        let staged = diff(&ctx, true).await;
        assert!(staged.output.contains("+one"));

        let committed = commit(&ctx, "first commit").await;
        assert!(committed.success, "{:?}", committed.error);

        let history = log(&ctx, 5).await;
        assert!(history.output.contains("first commit"));
    }

    #[tokio::test]
    async fn test_failure_outside_repo() {
        let dir = TempDir::new().unwrap();
        let ctx = ExecutionContext::new(dir.path());
        let result = log(&ctx, 1).await;
        assert!(!result.success);
        assert!(result.output.to_lowercase().contains("not a git repository"));
    }
}
