// src/source.rs
//! Message-source boundary: whatever observes the chat stream delivers
//! `(author, text, handle, timestamp)` tuples here, already extracted from
//! its surface. The engine never sees markup.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// One observed chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage<H> {
    /// Lower-cased author identity; empty when unknown.
    pub author: String,
    /// Normalized, trimmed message text; never empty.
    pub text: String,
    /// Observation timestamp.
    pub ts: SystemTime,
    /// Opaque handle to the message's external representation.
    pub handle: H,
}

/// What a source can push: a message, or a surface reset.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceItem<H> {
    Message(ChatMessage<H>),
    /// The observed surface changed (page/channel switch); the host flushes
    /// the cache since every cached handle is now stale.
    Reset,
}

#[async_trait::async_trait]
pub trait MessageSource {
    type Handle: Clone + PartialEq + Send;

    /// Next item, or `None` when the stream ends.
    async fn next_item(&mut self) -> Result<Option<SourceItem<Self::Handle>>>;

    fn name(&self) -> &'static str;
}

/// Normalize extracted text: decode HTML entities, collapse whitespace,
/// trim. Whitespace-only input normalizes to an empty string — callers must
/// drop those before the engine sees them.
pub fn normalize_text(s: &str) -> String {
    let out = html_escape::decode_html_entities(s).to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    let out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

/// Handle type for line-oriented sources: the ordinal of the message in the
/// stream. The renderer maps it back to whatever it drew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

// --- tolerant wire variants for the stdin stream ---

#[derive(Debug, Clone, Deserialize)]
struct ChatLine {
    author: Option<String>,
    text: String,
    /// RFC 3339; defaults to arrival time when absent.
    ts: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResetLine {
    reset: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AnyLine {
    Reset(ResetLine),
    Message(ChatLine),
}

/// Demo/replay source: one JSON object per stdin line, either
/// `{"author": "...", "text": "...", "ts": "..."}` or `{"reset": true}`.
pub struct StdinSource {
    lines: Lines<BufReader<Stdin>>,
    seq: u64,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            seq: 0,
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MessageSource for StdinSource {
    type Handle = MessageId;

    async fn next_item(&mut self) -> Result<Option<SourceItem<MessageId>>> {
        loop {
            let line = match self.lines.next_line().await.context("read stdin")? {
                Some(l) => l,
                None => return Ok(None),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            // A bad line must not kill the stream.
            let any: AnyLine = match serde_json::from_str(trimmed) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(target: "source", error = %e, "unparseable input line, skipping");
                    continue;
                }
            };

            match any {
                AnyLine::Reset(ResetLine { reset: true }) => return Ok(Some(SourceItem::Reset)),
                AnyLine::Reset(_) => continue,
                AnyLine::Message(m) => {
                    let text = normalize_text(&m.text);
                    if text.is_empty() {
                        continue;
                    }
                    let author = m
                        .author
                        .unwrap_or_default()
                        .trim()
                        .to_lowercase();
                    let ts = m.ts.map(SystemTime::from).unwrap_or_else(SystemTime::now);
                    self.seq += 1;
                    return Ok(Some(SourceItem::Message(ChatMessage {
                        author,
                        text,
                        ts,
                        handle: MessageId(self.seq),
                    })));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "stdin"
    }
}
