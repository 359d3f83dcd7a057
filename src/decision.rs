//! Decision types returned by the engine — the whole renderer contract.
//!
//! The engine never touches the visible representation itself; it hands the
//! renderer a [`MergeDecision`] (per ingested message) or an [`Expired`]
//! record (per swept entry) and the renderer performs the UI side effects.

use serde::{Deserialize, Serialize};

/// Which tier of the matching algorithm fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Repetition,
    Fuzzy,
}

impl MatchKind {
    /// Exact equality matches are authoritative; the other tiers are
    /// best-effort candidates.
    pub fn is_exact(self) -> bool {
        matches!(self, MatchKind::Exact)
    }
}

/// Instruction to fold a duplicate into an existing visible entry.
///
/// The renderer must rewrite the target's visible text to `display_text`,
/// suppress the author/badge decorations on the target, and hide (not
/// remove) the duplicate's own representation behind `hide`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merge<H> {
    /// Handle of the surviving entry whose text is rewritten.
    pub target: H,
    /// Handle of the incoming duplicate to hide.
    pub hide: H,
    /// New visible text for the target, `"×N: <original>"`.
    pub display_text: String,
    /// Occurrences folded into the entry so far, including the original.
    pub count: u32,
    pub kind: MatchKind,
}

/// Terminal classification of one ingested message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MergeDecision<H> {
    /// Authored by the configured current user; never cached, never matched.
    SelfSkip,
    /// Folded into an existing entry.
    Merged(Merge<H>),
    /// Remembered as a new distinct entry; renderer takes no action.
    Inserted,
}

impl<H> MergeDecision<H> {
    pub fn as_merged(&self) -> Option<&Merge<H>> {
        match self {
            MergeDecision::Merged(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, MergeDecision::Inserted)
    }
}

/// An entry removed by the TTL sweep. The renderer must restore the original
/// un-merged text on `handle`, undoing any earlier count rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expired<H> {
    pub handle: H,
    pub restore_text: String,
}
