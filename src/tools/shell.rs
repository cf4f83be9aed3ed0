//! Shell command execution with a hard deadline.

use super::{ExecutionContext, ToolResult};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long to wait for pipe readers to drain after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

type Buffer = Arc<Mutex<Vec<u8>>>;

/// Run `command` through `sh -c` in the context's working directory.
///
/// On timeout the child is killed and whatever it printed so far is returned
/// as the output of a failed result.
pub async fn run_command(ctx: &ExecutionContext, command: &str) -> ToolResult {
    debug!("Running `{}` in {}", command, ctx.cwd.display());

    let mut child = match Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(&ctx.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return ToolResult::err(format!("failed to start command: {}", e)),
    };

    let stdout = Buffer::default();
    let stderr = Buffer::default();
    let mut readers = Vec::with_capacity(2);
    if let Some(pipe) = child.stdout.take() {
        readers.push(spawn_reader(pipe, stdout.clone()));
    }
    if let Some(pipe) = child.stderr.take() {
        readers.push(spawn_reader(pipe, stderr.clone()));
    }

    let status = tokio::time::timeout(ctx.shell_timeout, child.wait()).await;

    if status.is_err() {
        warn!("Command timed out after {:?}: {}", ctx.shell_timeout, command);
        if let Err(e) = child.kill().await {
            debug!("Failed to kill timed out command: {}", e);
        }
    }

    for reader in readers {
        let _ = tokio::time::timeout(DRAIN_GRACE, reader).await;
    }
    let output = combine(&stdout, &stderr);

    match status {
        Err(_) => ToolResult::err_with_output("command timed out", output),
        Ok(Err(e)) => {
            ToolResult::err_with_output(format!("failed to wait for command: {}", e), output)
        }
        Ok(Ok(status)) if status.success() => ToolResult::ok(output),
        Ok(Ok(status)) => ToolResult::err_with_output(status.to_string(), output),
    }
}

fn spawn_reader<R>(mut pipe: R, sink: Buffer) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut buf) = sink.lock() {
                        buf.extend_from_slice(&chunk[..n]);
                    }
                }
            }
        }
    })
}

/// stdout, then stderr on a new line when both are present.
fn combine(stdout: &Buffer, stderr: &Buffer) -> String {
    let read = |b: &Buffer| {
        b.lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    };
    let mut output = read(stdout);
    let err = read(stderr);
    if !err.is_empty() {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&err);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_runs_in_context_cwd() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let ctx = ExecutionContext::new(dir.path());

        let result = run_command(&ctx, "ls").await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output.trim(), "marker.txt");
    }

    #[tokio::test]
    async fn test_nonzero_exit_keeps_output() {
        let dir = TempDir::new().unwrap();
        let ctx = ExecutionContext::new(dir.path());

        let result = run_command(&ctx, "echo out; echo oops >&2; exit 3").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains('3'));
        assert_eq!(result.output, "out\n\noops\n");
    }

    #[tokio::test]
    async fn test_timeout_returns_partial_output() {
        let dir = TempDir::new().unwrap();
        let ctx = ExecutionContext::new(dir.path()).with_shell_timeout(Duration::from_millis(300));

        let started = std::time::Instant::now();
        let result = run_command(&ctx, "echo partial; exec sleep 5").await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("command timed out"));
        assert_eq!(result.output.trim(), "partial");
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
