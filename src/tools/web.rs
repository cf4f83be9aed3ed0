//! Web search and URL fetching.

use super::{ExecutionContext, ToolResult};
use regex::Regex;
use std::fmt::Write;
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const MAX_RESULTS: usize = 8;
/// Fetched pages are cut to this many characters.
const MAX_FETCH_CHARS: usize = 20_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub async fn web_search(ctx: &ExecutionContext, query: &str) -> ToolResult {
    let url = format!("{}?q={}", SEARCH_ENDPOINT, urlencoding::encode(query));
    debug!("Web search: {}", query);

    let body = match ctx.http.get(&url).send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(body) => body,
            Err(e) => return ToolResult::err(format!("failed to read search results: {}", e)),
        },
        Ok(response) => {
            return ToolResult::err(format!("search failed: HTTP {}", response.status()))
        }
        Err(e) => return ToolResult::err(format!("search failed: {}", e)),
    };

    let hits = parse_search_results(&body);
    if hits.is_empty() {
        return ToolResult::ok(format!("No results found for: {}", query));
    }

    let mut output = format!("Search results for: {}\n\n", query);
    for (i, hit) in hits.iter().enumerate() {
        let _ = writeln!(output, "{}. {}\n   {}", i + 1, hit.title, hit.url);
        if !hit.snippet.is_empty() {
            let _ = writeln!(output, "   {}", hit.snippet);
        }
        output.push('\n');
    }
    ToolResult::ok(output.trim_end().to_string())
}

pub async fn fetch_url(ctx: &ExecutionContext, raw: &str) -> ToolResult {
    let url = match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        Ok(url) => return ToolResult::err(format!("unsupported scheme: {}", url.scheme())),
        Err(e) => return ToolResult::err(format!("invalid url: {}", e)),
    };

    let response = match ctx.http.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => return ToolResult::err(format!("failed to fetch: {}", e)),
    };

    let status = response.status();
    let html_header = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.contains("html"));

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return ToolResult::err(format!("failed to read body: {}", e)),
    };

    let text = if html_header || looks_like_html(&body) {
        html_to_text(&body)
    } else {
        body
    };
    let text = truncate_chars(&text, MAX_FETCH_CHARS);

    if status.is_success() {
        ToolResult::ok(text)
    } else {
        ToolResult::err_with_output(format!("HTTP {}", status), text)
    }
}

fn result_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
            .expect("result link regex must compile")
    })
}

fn snippet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)class="result__snippet"[^>]*>(.*?)</(?:a|div|td)>"#)
            .expect("snippet regex must compile")
    })
}

/// Pull result titles, target URLs and snippets out of DuckDuckGo's HTML page.
pub fn parse_search_results(html: &str) -> Vec<SearchHit> {
    let snippets: Vec<String> = snippet_regex()
        .captures_iter(html)
        .map(|c| html_to_text(&c[1]))
        .collect();

    result_link_regex()
        .captures_iter(html)
        .enumerate()
        .map(|(i, c)| SearchHit {
            title: html_to_text(&c[2]),
            url: unwrap_redirect(&decode_entities(&c[1])),
            snippet: snippets.get(i).cloned().unwrap_or_default(),
        })
        .take(MAX_RESULTS)
        .collect()
}

/// DuckDuckGo wraps targets as `//duckduckgo.com/l/?uddg=<encoded>`.
fn unwrap_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };
    Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}

fn block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript|head)[^>]*>.*?</(script|style|noscript|head)>")
            .expect("block regex must compile")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex must compile"))
}

/// Sniff documents served without an HTML content type.
fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start().chars().take(15).collect::<String>().to_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Crude HTML to text: drop scripts, styles and tags, decode common entities,
/// collapse whitespace per line and drop empty lines.
pub fn html_to_text(html: &str) -> String {
    let without_blocks = block_regex().replace_all(html, " ");
    let with_breaks = without_blocks
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n")
        .replace("</p>", "\n")
        .replace("</div>", "\n")
        .replace("</li>", "\n")
        .replace("</h1>", "\n")
        .replace("</h2>", "\n")
        .replace("</h3>", "\n");
    let stripped = tag_regex().replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);

    decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\n... (truncated)", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_html_to_text() {
        let html = "<html><head><title>x</title></head><body><script>var a = 1;</script>\
                    <h1>Title</h1><p>Hello &amp; <b>welcome</b></p></body></html>";
        assert_eq!(html_to_text(html), "Title\nHello & welcome");
    }

    #[test]
    fn test_parse_search_results() {
        let html = r#"
            <div class="result">
              <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc">The <b>Rust</b> Language</a>
              <a class="result__snippet" href="x">A language empowering <b>everyone</b>.</a>
            </div>
            <div class="result">
              <a class="result__a" href="https://doc.rust-lang.org/book/">The Book</a>
            </div>
        "#;
        let hits = parse_search_results(html);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "The Rust Language");
        assert_eq!(hits[0].url, "https://www.rust-lang.org/");
        assert_eq!(hits[0].snippet, "A language empowering everyone.");
        assert_eq!(hits[1].url, "https://doc.rust-lang.org/book/");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc\n... (truncated)");
    }

    #[tokio::test]
    async fn test_fetch_url_strips_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    "<div><p>Fetched text</p></div>",
                    "text/html; charset=utf-8",
                ),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let ctx = ExecutionContext::new(dir.path());
        let result = fetch_url(&ctx, &format!("{}/page", server.uri())).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output, "Fetched text");
    }

    #[tokio::test]
    async fn test_fetch_url_sniffs_untyped_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plain"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<!DOCTYPE html><html><body><p>Sniffed</p></body></html>"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/notes"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a < b and <c>"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let ctx = ExecutionContext::new(dir.path());
        let sniffed = fetch_url(&ctx, &format!("{}/plain", server.uri())).await;
        assert_eq!(sniffed.output, "Sniffed");
        let plain = fetch_url(&ctx, &format!("{}/notes", server.uri())).await;
        assert_eq!(plain.output, "a < b and <c>");
    }

    #[tokio::test]
    async fn test_fetch_url_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        let ctx = ExecutionContext::new(dir.path());
        assert!(fetch_url(&ctx, "not a url").await.error.unwrap().starts_with("invalid url"));
        assert_eq!(
            fetch_url(&ctx, "file:///etc/passwd").await.error.as_deref(),
            Some("unsupported scheme: file")
        );
    }
}
