//! Search and code-analysis tools.
//!
//! Walks honour `.gitignore`, skip hidden entries and common build output, and
//! run on the blocking pool.

use super::{ExecutionContext, ToolResult};
use ignore::{DirEntry, WalkBuilder};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Directories never worth descending into.
const SKIP_DIRS: &[&str] = &["target", "node_modules", "vendor", "dist", "build", "__pycache__"];

/// Files above this size are not scanned for content.
const MAX_SCAN_BYTES: u64 = 1024 * 1024;

const MAX_MATCHES: usize = 500;

pub async fn find_files(ctx: &ExecutionContext, path: &str, pattern: &str) -> ToolResult {
    let root = ctx.resolve(path);
    let cwd = ctx.cwd.clone();
    let pattern = pattern.to_string();

    blocking(move || {
        let matcher = match glob::Pattern::new(&pattern) {
            Ok(matcher) => matcher,
            Err(e) => return ToolResult::err(format!("invalid pattern: {}", e)),
        };
        if !root.exists() {
            return ToolResult::err(format!("path not found: {}", root.display()));
        }

        let matches: Vec<String> = walker(&root, None)
            .filter(|entry| entry.depth() > 0)
            .filter(|entry| matcher.matches(&entry.file_name().to_string_lossy()))
            .map(|entry| display_path(&cwd, entry.path()))
            .take(MAX_MATCHES)
            .collect();

        if matches.is_empty() {
            ToolResult::ok("No files found")
        } else {
            ToolResult::ok(matches.join("\n"))
        }
    })
    .await
}

/// Plain substring search, optionally restricted by a file-name glob.
pub async fn grep_files(
    ctx: &ExecutionContext,
    path: &str,
    pattern: &str,
    file_pattern: Option<&str>,
) -> ToolResult {
    let root = ctx.resolve(path);
    let cwd = ctx.cwd.clone();
    let pattern = pattern.to_string();
    let file_pattern = file_pattern.map(str::to_string);

    blocking(move || {
        let name_filter = match file_pattern.as_deref().map(glob::Pattern::new).transpose() {
            Ok(filter) => filter,
            Err(e) => return ToolResult::err(format!("invalid file_pattern: {}", e)),
        };

        let files = text_files(&root).filter(|p| {
            name_filter.as_ref().map_or(true, |f| {
                p.file_name()
                    .map(|n| f.matches(&n.to_string_lossy()))
                    .unwrap_or(false)
            })
        });

        let output = collect_matches(&cwd, files, |line| line.contains(pattern.as_str()));
        ToolResult::ok(output.unwrap_or_else(|| "No matches found".to_string()))
    })
    .await
}

/// Regex search over source files of one language.
pub async fn code_search(
    ctx: &ExecutionContext,
    path: &str,
    pattern: &str,
    language: Option<&str>,
) -> ToolResult {
    let root = ctx.resolve(path);
    let cwd = ctx.cwd.clone();
    let extensions = language.map(language_extensions);
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(_) => match Regex::new(&regex::escape(pattern)) {
            Ok(regex) => regex,
            Err(e) => return ToolResult::err(format!("invalid pattern: {}", e)),
        },
    };

    blocking(move || {
        let files = text_files(&root).filter(|p| match &extensions {
            Some(exts) => extension(p).map_or(false, |e| exts.iter().any(|x| *x == e)),
            None => extension(p).map_or(false, |e| language_for(&e).is_some()),
        });

        let output = collect_matches(&cwd, files, |line| regex.is_match(line));
        ToolResult::ok(output.unwrap_or_else(|| "No matches found".to_string()))
    })
    .await
}

pub async fn find_todos(ctx: &ExecutionContext, path: &str) -> ToolResult {
    let root = ctx.resolve(path);
    let cwd = ctx.cwd.clone();

    blocking(move || {
        let files = text_files(&root).filter(|p| is_source(p));
        let output = collect_matches(&cwd, files, |line| todo_regex().is_match(line));
        ToolResult::ok(output.unwrap_or_else(|| "No TODO comments found".to_string()))
    })
    .await
}

#[derive(Default)]
struct LanguageStats {
    files: usize,
    lines: usize,
    blank: usize,
}

pub async fn count_lines(ctx: &ExecutionContext, path: &str) -> ToolResult {
    let root = ctx.resolve(path);

    blocking(move || {
        if !root.exists() {
            return ToolResult::err(format!("path not found: {}", root.display()));
        }
        let stats = language_stats(&root);
        if stats.is_empty() {
            return ToolResult::ok("No source files found");
        }

        let mut rows: Vec<_> = stats.into_iter().collect();
        rows.sort_by(|a, b| b.1.lines.cmp(&a.1.lines).then(a.0.cmp(&b.0)));

        let mut output = format!(
            "{:<14} {:>7} {:>9} {:>9}\n",
            "Language", "Files", "Lines", "Code"
        );
        let (mut files, mut lines, mut code) = (0, 0, 0);
        for (language, s) in &rows {
            let _ = writeln!(
                output,
                "{:<14} {:>7} {:>9} {:>9}",
                language,
                s.files,
                s.lines,
                s.lines - s.blank
            );
            files += s.files;
            lines += s.lines;
            code += s.lines - s.blank;
        }
        let _ = write!(output, "{:<14} {:>7} {:>9} {:>9}", "Total", files, lines, code);
        ToolResult::ok(output)
    })
    .await
}

pub async fn analyze_code(ctx: &ExecutionContext, path: &str) -> ToolResult {
    let root = ctx.resolve(path);

    blocking(move || {
        if !root.exists() {
            return ToolResult::err(format!("path not found: {}", root.display()));
        }

        let mut files = 0usize;
        let mut dirs = 0usize;
        let mut bytes = 0u64;
        let mut largest: Vec<(u64, PathBuf)> = Vec::new();

        for entry in walker(&root, None).filter(|e| e.depth() > 0) {
            match entry.file_type() {
                Some(t) if t.is_dir() => dirs += 1,
                Some(t) if t.is_file() => {
                    files += 1;
                    let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                    bytes += size;
                    largest.push((size, entry.into_path()));
                }
                _ => {}
            }
        }
        largest.sort_by(|a, b| b.0.cmp(&a.0));
        largest.truncate(5);

        let stats = language_stats(&root);
        let total_lines: usize = stats.values().map(|s| s.lines).sum();

        let mut output = format!("Code analysis: {}\n\n", root.display());
        let _ = writeln!(output, "Files: {}", files);
        let _ = writeln!(output, "Directories: {}", dirs);
        let _ = writeln!(output, "Total size: {}", human_bytes(bytes));
        let _ = writeln!(output, "Source lines: {}", total_lines);

        if !stats.is_empty() {
            output.push_str("\nLanguages:\n");
            let mut rows: Vec<_> = stats.iter().collect();
            rows.sort_by(|a, b| b.1.lines.cmp(&a.1.lines));
            for (language, s) in rows {
                let share = if total_lines > 0 {
                    s.lines as f64 * 100.0 / total_lines as f64
                } else {
                    0.0
                };
                let _ = writeln!(
                    output,
                    "  {:<12} {:>5} files {:>8} lines ({:.1}%)",
                    language, s.files, s.lines, share
                );
            }
        }

        if !largest.is_empty() {
            output.push_str("\nLargest files:\n");
            for (size, path) in &largest {
                let rel = path.strip_prefix(&root).unwrap_or(path);
                let _ = writeln!(output, "  {:>10}  {}", human_bytes(*size), rel.display());
            }
        }

        ToolResult::ok(output.trim_end().to_string())
    })
    .await
}

pub async fn project_tree(ctx: &ExecutionContext, path: &str, depth: usize) -> ToolResult {
    let root = ctx.resolve(path);

    blocking(move || {
        if !root.is_dir() {
            return ToolResult::err(format!("not a directory: {}", root.display()));
        }

        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        let mut output = format!("{}/\n", name);

        for entry in walker(&root, Some(depth)).filter(|e| e.depth() > 0) {
            let indent = "  ".repeat(entry.depth() - 1);
            let name = entry.file_name().to_string_lossy();
            let is_dir = entry.file_type().map_or(false, |t| t.is_dir());
            let _ = writeln!(output, "{}{}{}", indent, name, if is_dir { "/" } else { "" });
        }

        ToolResult::ok(output.trim_end().to_string())
    })
    .await
}

async fn blocking<F>(job: F) -> ToolResult
where
    F: FnOnce() -> ToolResult + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .unwrap_or_else(|e| ToolResult::err(format!("search task failed: {}", e)))
}

fn walker(root: &Path, max_depth: Option<usize>) -> impl Iterator<Item = DirEntry> {
    WalkBuilder::new(root)
        .max_depth(max_depth)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            !(entry.file_type().map_or(false, |t| t.is_dir())
                && SKIP_DIRS.contains(&entry.file_name().to_string_lossy().as_ref()))
        })
        .build()
        .filter_map(Result::ok)
}

fn text_files(root: &Path) -> impl Iterator<Item = PathBuf> {
    walker(root, None)
        .filter(|entry| entry.file_type().map_or(false, |t| t.is_file()))
        .filter(|entry| entry.metadata().map_or(false, |m| m.len() <= MAX_SCAN_BYTES))
        .map(DirEntry::into_path)
}

fn read_text(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    if bytes.iter().take(8000).any(|b| *b == 0) {
        return None;
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// `path:line: text` for every matching line, or `None` when nothing matched.
fn collect_matches<I, F>(cwd: &Path, files: I, is_match: F) -> Option<String>
where
    I: Iterator<Item = PathBuf>,
    F: Fn(&str) -> bool,
{
    let mut output = String::new();
    let mut count = 0usize;

    for file in files {
        let Some(content) = read_text(&file) else {
            continue;
        };
        for (idx, line) in content.lines().enumerate() {
            if !is_match(line) {
                continue;
            }
            count += 1;
            if count <= MAX_MATCHES {
                let _ = writeln!(
                    output,
                    "{}:{}: {}",
                    display_path(cwd, &file),
                    idx + 1,
                    line.trim()
                );
            }
        }
    }

    if count == 0 {
        return None;
    }
    if count > MAX_MATCHES {
        let _ = writeln!(output, "... ({} more matches)", count - MAX_MATCHES);
    }
    Some(output)
}

fn language_stats(root: &Path) -> BTreeMap<&'static str, LanguageStats> {
    let mut stats: BTreeMap<&'static str, LanguageStats> = BTreeMap::new();
    for file in text_files(root) {
        let Some(language) = extension(&file).and_then(|e| language_for(&e)) else {
            continue;
        };
        let Some(content) = read_text(&file) else {
            continue;
        };
        let entry = stats.entry(language).or_default();
        entry.files += 1;
        for line in content.lines() {
            entry.lines += 1;
            if line.trim().is_empty() {
                entry.blank += 1;
            }
        }
    }
    stats
}

fn display_path(cwd: &Path, path: &Path) -> String {
    path.strip_prefix(cwd).unwrap_or(path).display().to_string()
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

fn is_source(path: &Path) -> bool {
    extension(path).map_or(false, |e| language_for(&e).is_some())
}

fn todo_regex() -> &'static Regex {
    static TODO: OnceLock<Regex> = OnceLock::new();
    TODO.get_or_init(|| {
        Regex::new(r"\b(TODO|FIXME|HACK|XXX)\b").expect("todo regex must compile")
    })
}

/// Language name for a file extension.
pub fn language_for(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "rs" => "Rust",
        "go" => "Go",
        "py" => "Python",
        "js" | "jsx" | "mjs" | "cjs" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "java" => "Java",
        "kt" | "kts" => "Kotlin",
        "c" | "h" => "C",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => "C++",
        "cs" => "C#",
        "rb" => "Ruby",
        "php" => "PHP",
        "swift" => "Swift",
        "scala" => "Scala",
        "sh" | "bash" | "zsh" => "Shell",
        "lua" => "Lua",
        "dart" => "Dart",
        "ex" | "exs" => "Elixir",
        "hs" => "Haskell",
        "sql" => "SQL",
        "html" => "HTML",
        "css" | "scss" | "less" => "CSS",
        "vue" => "Vue",
        "svelte" => "Svelte",
        "toml" => "TOML",
        "yaml" | "yml" => "YAML",
        "json" => "JSON",
        "md" => "Markdown",
        _ => return None,
    })
}

/// File extensions for a `code_search` language filter.
fn language_extensions(language: &str) -> Vec<&'static str> {
    match language.to_lowercase().as_str() {
        "rust" | "rs" => vec!["rs"],
        "go" | "golang" => vec!["go"],
        "python" | "py" => vec!["py"],
        "javascript" | "js" => vec!["js", "jsx", "mjs", "cjs"],
        "typescript" | "ts" => vec!["ts", "tsx"],
        "java" => vec!["java"],
        "kotlin" | "kt" => vec!["kt", "kts"],
        "c" => vec!["c", "h"],
        "cpp" | "c++" => vec!["cpp", "cc", "cxx", "hpp", "hh", "h"],
        "csharp" | "c#" | "cs" => vec!["cs"],
        "ruby" | "rb" => vec!["rb"],
        "php" => vec!["php"],
        "swift" => vec!["swift"],
        "shell" | "sh" | "bash" => vec!["sh", "bash", "zsh"],
        _ => Vec::new(),
    }
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
