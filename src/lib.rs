// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod config;
pub mod decision;
pub mod engine;
pub mod metrics;
pub mod pipeline;
pub mod render;
pub mod similarity;
pub mod source;

// ---- Re-exports for stable public API ----
pub use crate::config::DedupConfig;
pub use crate::decision::{Expired, MatchKind, Merge, MergeDecision};
pub use crate::engine::{CacheEntry, DedupEngine};
pub use crate::render::{ConsoleRenderer, Renderer};
pub use crate::source::{ChatMessage, MessageId, MessageSource, SourceItem, StdinSource};
