use super::{ExecutionContext, ToolResult};
use std::fmt::Write;
use sysinfo::System;

pub fn get_cwd(ctx: &ExecutionContext) -> ToolResult {
    ToolResult::ok(ctx.cwd.display().to_string())
}

/// Move the context's working directory. The process cwd is left alone.
pub async fn change_directory(ctx: &mut ExecutionContext, path: &str) -> ToolResult {
    let target = ctx.resolve(path);
    match tokio::fs::metadata(&target).await {
        Ok(meta) if meta.is_dir() => {
            ctx.cwd = target;
            ToolResult::ok(format!("Changed to: {}", ctx.cwd.display()))
        }
        Ok(_) => ToolResult::err(format!("not a directory: {}", target.display())),
        Err(e) => ToolResult::err(format!("failed to change directory: {}", e)),
    }
}

pub async fn system_info() -> ToolResult {
    tokio::task::spawn_blocking(collect_system_info)
        .await
        .unwrap_or_else(|e| ToolResult::err(format!("failed to collect system info: {}", e)))
}

fn collect_system_info() -> ToolResult {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_cpu_all();

    let gib = |bytes: u64| bytes as f64 / (1024.0 * 1024.0 * 1024.0);
    let mut output = String::new();

    let _ = writeln!(
        output,
        "OS: {}",
        System::long_os_version().unwrap_or_else(|| std::env::consts::OS.to_string())
    );
    if let Some(kernel) = System::kernel_version() {
        let _ = writeln!(output, "Kernel: {}", kernel);
    }
    let _ = writeln!(output, "Architecture: {}", std::env::consts::ARCH);
    if let Some(host) = System::host_name() {
        let _ = writeln!(output, "Hostname: {}", host);
    }
    let _ = writeln!(output, "CPUs: {}", sys.cpus().len());
    if let Some(cpu) = sys.cpus().first() {
        let brand = cpu.brand().trim();
        if !brand.is_empty() {
            let _ = writeln!(output, "CPU: {}", brand);
        }
    }
    let _ = writeln!(
        output,
        "Memory: {:.1} GiB used / {:.1} GiB total",
        gib(sys.used_memory()),
        gib(sys.total_memory())
    );
    let _ = writeln!(output, "Uptime: {}s", System::uptime());
    if let Ok(shell) = std::env::var("SHELL") {
        let _ = writeln!(output, "Shell: {}", shell);
    }

    ToolResult::ok(output.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_change_directory_rejects_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("file.txt"), "").unwrap();
        let mut ctx = ExecutionContext::new(dir.path());

        let result = change_directory(&mut ctx, "file.txt").await;
        assert!(!result.success);
        assert_eq!(ctx.cwd, dir.path());

        let missing = change_directory(&mut ctx, "nope").await;
        assert!(!missing.success);
    }

    #[tokio::test]
    async fn test_change_directory_and_get_cwd() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut ctx = ExecutionContext::new(dir.path());

        assert!(change_directory(&mut ctx, "sub").await.success);
        assert_eq!(get_cwd(&ctx).output, dir.path().join("sub").display().to_string());
        assert!(change_directory(&mut ctx, "..").await.success);
        assert_eq!(ctx.cwd, dir.path());
    }

    #[tokio::test]
    async fn test_system_info_reports_basics() {
        let result = system_info().await;
        assert!(result.success);
        assert!(result.output.contains("Architecture: "));
        assert!(result.output.contains("Memory: "));
    }
}
