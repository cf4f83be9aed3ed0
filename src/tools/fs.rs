//! File operations.

use super::{ExecutionContext, ToolResult};
use chrono::{DateTime, Local};
use std::path::Path;
use tokio::fs;

pub async fn read_file(ctx: &ExecutionContext, path: &str) -> ToolResult {
    let path = ctx.resolve(path);
    match fs::read(&path).await {
        Ok(bytes) => ToolResult::ok(String::from_utf8_lossy(&bytes)),
        Err(e) => ToolResult::err(format!("failed to read file: {}", e)),
    }
}

pub async fn write_file(ctx: &ExecutionContext, path: &str, content: &str) -> ToolResult {
    let path = ctx.resolve(path);
    if let Err(e) = ensure_parent(&path).await {
        return ToolResult::err(format!("failed to create directory: {}", e));
    }
    match fs::write(&path, content).await {
        Ok(()) => ToolResult::ok(format!("File written: {}", path.display())),
        Err(e) => ToolResult::err(format!("failed to write file: {}", e)),
    }
}

/// Replace the first occurrence of `old_content`.
pub async fn edit_file(
    ctx: &ExecutionContext,
    path: &str,
    old_content: &str,
    new_content: &str,
) -> ToolResult {
    let path = ctx.resolve(path);
    let content = match fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) => return ToolResult::err(format!("failed to read file: {}", e)),
    };

    if !content.contains(old_content) {
        return ToolResult::err("old content not found in file");
    }

    let updated = content.replacen(old_content, new_content, 1);
    match fs::write(&path, updated).await {
        Ok(()) => ToolResult::ok(format!("File edited: {}", path.display())),
        Err(e) => ToolResult::err(format!("failed to write file: {}", e)),
    }
}

pub async fn list_directory(ctx: &ExecutionContext, path: &str) -> ToolResult {
    let path = ctx.resolve(path);
    let mut reader = match fs::read_dir(&path).await {
        Ok(reader) => reader,
        Err(e) => return ToolResult::err(format!("failed to read directory: {}", e)),
    };

    let mut rows = Vec::new();
    loop {
        let entry = match reader.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => return ToolResult::err(format!("failed to read directory: {}", e)),
        };
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        let modified = meta
            .modified()
            .map(|t| DateTime::<Local>::from(t).format("%b %d %H:%M").to_string())
            .unwrap_or_else(|_| "            ".to_string());
        let kind = if meta.is_dir() { 'd' } else { '-' };
        let name = entry.file_name().to_string_lossy().into_owned();
        rows.push((name.clone(), format!("{} {:>8} {} {}", kind, meta.len(), modified, name)));
    }

    rows.sort_by(|a, b| a.0.cmp(&b.0));
    let mut output = rows
        .into_iter()
        .map(|(_, row)| row)
        .collect::<Vec<_>>()
        .join("\n");
    if !output.is_empty() {
        output.push('\n');
    }
    ToolResult::ok(output)
}

pub async fn create_directory(ctx: &ExecutionContext, path: &str) -> ToolResult {
    let path = ctx.resolve(path);
    match fs::create_dir_all(&path).await {
        Ok(()) => ToolResult::ok(format!("Directory created: {}", path.display())),
        Err(e) => ToolResult::err(format!("failed to create directory: {}", e)),
    }
}

/// Remove a file or an empty directory.
pub async fn delete_file(ctx: &ExecutionContext, path: &str) -> ToolResult {
    let path = ctx.resolve(path);
    let result = match fs::symlink_metadata(&path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir(&path).await,
        Ok(_) => fs::remove_file(&path).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => ToolResult::ok(format!("Deleted: {}", path.display())),
        Err(e) => ToolResult::err(format!("failed to delete: {}", e)),
    }
}

pub async fn copy_file(ctx: &ExecutionContext, source: &str, destination: &str) -> ToolResult {
    let src = ctx.resolve(source);
    let dst = ctx.resolve(destination);
    if let Err(e) = ensure_parent(&dst).await {
        return ToolResult::err(format!("failed to create destination directory: {}", e));
    }
    match fs::copy(&src, &dst).await {
        Ok(_) => ToolResult::ok(format!("Copied: {} -> {}", src.display(), dst.display())),
        Err(e) => ToolResult::err(format!("failed to copy: {}", e)),
    }
}

pub async fn move_file(ctx: &ExecutionContext, source: &str, destination: &str) -> ToolResult {
    let src = ctx.resolve(source);
    let dst = ctx.resolve(destination);
    if let Err(e) = ensure_parent(&dst).await {
        return ToolResult::err(format!("failed to create destination directory: {}", e));
    }
    match fs::rename(&src, &dst).await {
        Ok(()) => ToolResult::ok(format!("Moved: {} -> {}", src.display(), dst.display())),
        Err(e) => ToolResult::err(format!("failed to move: {}", e)),
    }
}

async fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}
