//! HTTP transport for OpenAI-compatible `/chat/completions` endpoints.

use super::sse::{SseLine, SseLineParser};
use super::{ChatTransport, Completion, Message, TransportError};
use crate::config::ResolvedProvider;
use crate::error::{Result, SkiffError};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Default timeout for tool-enabled chat requests (2 minutes).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Idle keep-alive window for pooled connections.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Idle connections kept per host.
const POOL_MAX_IDLE_PER_HOST: usize = 100;

/// Everything the transport needs to reach one provider.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub provider: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub extra_headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn from_provider(provider: &ResolvedProvider, timeout: Duration) -> Self {
        Self {
            provider: provider.name.clone(),
            base_url: provider.base_url.clone(),
            api_key: provider.api_key.clone(),
            model: provider.model.clone(),
            extra_headers: provider.extra_headers.clone(),
            timeout,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Streaming chat client with a pooled, keep-alive HTTP connection.
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    provider: String,
    headers: HeaderMap,
}

impl HttpTransport {
    /// Create a transport for the given provider configuration.
    pub fn new(config: TransportConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        let headers = build_headers(&config)?;

        Ok(Self {
            http,
            endpoint: chat_completions_url(&config.base_url),
            model: config.model,
            provider: config.provider,
            headers,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn read_stream(
        &self,
        response: reqwest::Response,
        cancel: &CancellationToken,
    ) -> std::result::Result<Completion, TransportError> {
        let mut body = response.bytes_stream();
        let mut parser = SseLineParser::new();
        let mut completion = Completion::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                next = body.next() => next,
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) if e.is_timeout() => return Err(TransportError::from_reqwest(&e)),
                Some(Err(e)) => return Err(TransportError::StreamParse(e.to_string())),
                None => break,
            };

            for line in parser.feed(&chunk) {
                if apply_line(&mut completion, line) {
                    return Ok(completion);
                }
            }
        }

        if let Some(line) = parser.finish() {
            apply_line(&mut completion, line);
        }

        Ok(completion)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    #[instrument(
        skip(self, messages, cancel),
        fields(provider = %self.provider, model = %self.model, messages = messages.len())
    )]
    async fn complete(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> std::result::Result<Completion, TransportError> {
        let request = self
            .http
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(&ChatRequest {
                model: &self.model,
                messages,
                stream: true,
            });

        debug!("POST {}", self.endpoint);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            response = request.send() => response.map_err(|e| TransportError::from_reqwest(&e))?,
        };

        let status = response.status();
        if status != StatusCode::OK {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                body = response.text() => body.unwrap_or_default(),
            };
            return Err(TransportError::Http {
                status: status.as_u16(),
                message: parse_error_message(status, &body),
            });
        }

        let completion = self.read_stream(response, cancel).await?;
        debug!(
            "Received {} chars (finish_reason: {:?})",
            completion.text.len(),
            completion.finish_reason
        );
        Ok(completion)
    }
}

/// Fold one stream line into the completion. Returns `true` on `[DONE]`.
fn apply_line(completion: &mut Completion, line: SseLine) -> bool {
    match line {
        SseLine::Done => true,
        SseLine::Data(envelope) => {
            if let Some(content) = envelope.content() {
                completion.text.push_str(content);
            }
            if let Some(reason) = envelope.finish_reason() {
                completion.finish_reason = Some(reason.to_string());
            }
            if let Some(tokens) = envelope.total_tokens() {
                completion.total_tokens = Some(tokens);
            }
            false
        }
    }
}

/// `<base_url>/chat/completions`, tolerating a trailing slash.
pub fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Prefer the structured `{error:{message}}` body, fall back to raw text.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        if !parsed.error.message.is_empty() {
            return parsed.error.message;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

fn build_headers(config: &TransportConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("skiff/", env!("CARGO_PKG_VERSION"))),
    );

    if !config.api_key.is_empty() {
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| SkiffError::Config("API key contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
    }

    for (key, value) in &config.extra_headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| SkiffError::Config(format!("Invalid header name: {}", key)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| SkiffError::Config(format!("Invalid value for header {}", key)))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> TransportConfig {
        TransportConfig {
            provider: "openrouter".to_string(),
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            extra_headers: vec![("X-Title".to_string(), "Skiff".to_string())],
            timeout: Duration::from_secs(5),
        }
    }

    fn sse_body(parts: &[&str]) -> String {
        let mut body = String::new();
        for part in parts {
            let chunk = serde_json::json!({"choices": [{"delta": {"content": part}}]});
            body.push_str(&format!("data: {}\n\n", chunk));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    #[test]
    fn test_chat_completions_url() {
        assert_eq!(
            chat_completions_url("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            chat_completions_url("http://localhost:11434/v1"),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_parse_error_message_prefers_structured_body() {
        let body = r#"{"error":{"message":"invalid model","type":"bad_request"}}"#;
        assert_eq!(parse_error_message(StatusCode::BAD_REQUEST, body), "invalid model");
        assert_eq!(
            parse_error_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
        assert_eq!(
            parse_error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
    }

    #[tokio::test]
    async fn test_streams_and_concatenates_deltas() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(header("accept", "text/event-stream"))
            .and(header("x-title", "Skiff"))
            .and(body_partial_json(serde_json::json!({"model": "test-model", "stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_body(&["Hello", ", ", "world"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(config(&format!("{}/v1", server.uri()))).unwrap();
        let completion = transport
            .complete(&[Message::user("hi")], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(completion.text, "Hello, world");
    }

    #[tokio::test]
    async fn test_done_sentinel_stops_reading() {
        let server = MockServer::start().await;
        let body = format!(
            "{}data: {}\n\n",
            sse_body(&["kept"]),
            serde_json::json!({"choices": [{"delta": {"content": "ignored"}}]})
        );
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(config(&server.uri())).unwrap();
        let completion = transport
            .complete(&[Message::user("hi")], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(completion.text, "kept");
    }

    #[tokio::test]
    async fn test_non_200_maps_to_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_string(r#"{"error":{"message":"slow down"}}"#),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(config(&server.uri())).unwrap();
        let err = transport
            .complete(&[Message::user("hi")], &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransportError::Http {
                status: 429,
                message: "slow down".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) is not listening in test environments.
        let transport = HttpTransport::new(config("http://127.0.0.1:9")).unwrap();
        let err = transport
            .complete(&[Message::user("hi")], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Network { connect: true, .. }));
        assert!(crate::resilience::is_retryable(&err));
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_not_a_refused_connection() {
        let transport = HttpTransport::new(config("http://skiff-no-such-host.invalid")).unwrap();
        let err = transport
            .complete(&[Message::user("hi")], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Network { connect: false, .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&["x"])))
            .expect(0)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(config(&server.uri())).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = transport
            .complete(&[Message::user("hi")], &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, TransportError::Cancelled);
    }
}
