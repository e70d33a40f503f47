//! Decoder for the summary event stream.
//!
//! The transport is chunked text: each logical event is one line starting
//! with `data:` followed by a JSON object carrying an `event` discriminator.
//! Other lines (`event:`, comments, blank keep-alives) are ignored. Chunks
//! may split a line, or a multi-byte character, anywhere; bytes are buffered
//! until a full line is available.

use serde::{Deserialize, Serialize};

pub const DATA_PREFIX: &str = "data:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum SummaryFrame {
    /// Progress message, no content.
    Status {
        #[serde(default)]
        message: String,
    },
    /// Incremental chunk to append.
    Delta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        html: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// Terminal success. When content is present it replaces the accumulation.
    Complete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        html: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// Terminal failure with a user-facing message.
    Error {
        #[serde(default)]
        message: String,
    },
}

impl SummaryFrame {
    /// Content carried by a delta or complete frame, `html` preferred.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Delta { html, text } | Self::Complete { html, text } => {
                html.as_deref().or(text.as_deref())
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

/// Parse one complete line. `None` for non-data lines and malformed frames.
pub fn parse_line(line: &str) -> Option<SummaryFrame> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?.trim_start();
    if payload.is_empty() {
        return None;
    }
    match serde_json::from_str::<SummaryFrame>(payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping malformed summary frame");
            None
        }
    }
}

/// Incremental line splitter over raw byte chunks.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SummaryFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            if let Some(frame) = parse_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing line that had no newline when the stream ended.
    pub fn finish(&mut self) -> Option<SummaryFrame> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&rest))
    }

    /// Bytes held back waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Encode a frame as an SSE `data:` payload (the JSON only; the server adds
/// the `data:` marker and line framing).
pub fn encode_frame(frame: &SummaryFrame) -> Result<String, serde_json::Error> {
    serde_json::to_string(frame)
}
