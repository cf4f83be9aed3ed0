//! Line-oriented parser for `text/event-stream` chat-completion bodies.

use serde::Deserialize;

/// Streaming chunk envelope (`chat.completion.chunk`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChunkEnvelope {
    pub choices: Vec<ChunkChoice>,
    pub usage: Option<ChunkUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChunkChoice {
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChunkDelta {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChunkUsage {
    pub total_tokens: Option<u64>,
}

impl ChunkEnvelope {
    /// Text carried by `choices[0].delta.content`, if any.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|c| !c.is_empty())
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .filter(|r| !r.is_empty())
    }

    pub fn total_tokens(&self) -> Option<u64> {
        self.usage.as_ref().and_then(|u| u.total_tokens)
    }
}

/// One meaningful line of the event stream.
#[derive(Debug, Clone)]
pub enum SseLine {
    /// A parsed `data: {...}` chunk.
    Data(ChunkEnvelope),
    /// The `data: [DONE]` sentinel.
    Done,
}

/// Incremental parser: feed raw body bytes, get back complete lines.
///
/// Blank lines, comments, non-`data` fields and payloads that are not valid
/// chunk JSON are dropped; they never fail the stream.
#[derive(Debug, Default)]
pub struct SseLineParser {
    buffer: Vec<u8>,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a body chunk and drain every complete line it finishes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseLine> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(line) = parse_line(&String::from_utf8_lossy(&raw)) {
                lines.push(line);
            }
        }

        lines
    }

    /// Flush a trailing line that had no terminating newline.
    pub fn finish(&mut self) -> Option<SseLine> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&raw))
    }
}

/// Parse a single stream line.
pub fn parse_line(line: &str) -> Option<SseLine> {
    let line = line.trim();
    let payload = line.strip_prefix("data:")?.trim_start();

    if payload == "[DONE]" {
        return Some(SseLine::Done);
    }
    if payload.is_empty() {
        return None;
    }

    match serde_json::from_str::<ChunkEnvelope>(payload) {
        Ok(envelope) => Some(SseLine::Data(envelope)),
        Err(e) => {
            tracing::debug!("Skipping unparseable stream line: {}", e);
            None
        }
    }
}
