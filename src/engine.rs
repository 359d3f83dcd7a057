//! # Dedup Cache Engine
//! Pure, testable logic that maps each incoming message to a
//! [`MergeDecision`]: fold it into a live cache entry, remember it as new,
//! or skip it because the local user wrote it. No I/O beyond tracing and
//! metrics; the host applies decisions through its renderer.
//!
//! Matching is first-fit over the live entries, in insertion order:
//! - an exact match of normalised text is authoritative and ends the scan;
//! - the first repetition or fuzzy hit is kept as a fallback while the scan
//!   keeps looking for a later exact match.
//!
//! Entries die two ways only: the TTL sweep (`sweep_expired`, driven by the
//! host's ticker) and least-recently-seen eviction when the cache is full.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::config::DedupConfig;
use crate::decision::{Expired, MatchKind, Merge, MergeDecision};
use crate::similarity::{
    is_repetitive, normalise, same_repeated_char, similarity, within_fuzzy_len,
};
use crate::source::ChatMessage;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("dedup_messages_total", "Messages ingested by the engine.");
        describe_counter!("dedup_merged_total", "Messages folded into an existing entry.");
        describe_counter!("dedup_inserted_total", "Messages remembered as new entries.");
        describe_counter!("dedup_self_skip_total", "Messages skipped as self-authored.");
        describe_counter!("dedup_evicted_total", "Entries evicted by the capacity bound.");
        describe_counter!("dedup_expired_total", "Entries removed by the TTL sweep.");
        describe_gauge!("dedup_cache_entries", "Live entries currently cached.");
    });
}

/// One distinct message currently considered live.
#[derive(Debug, Clone)]
pub struct CacheEntry<H> {
    /// Literal text first seen; doubles as the dedup key, unique in the cache.
    pub original_text: String,
    /// Occurrences folded in, including the original. Never below 1.
    pub count: u32,
    /// Timestamp of the most recent fold (insertion or merge).
    pub last_seen: SystemTime,
    /// Author of the first message that created the entry.
    pub author: String,
    /// Opaque renderer-owned handle; only ever cloned back out in decisions.
    pub handle: H,
}

/// Bounded cache of recent messages plus the three-tier matching algorithm.
///
/// Single-threaded by design: `ingest` and `sweep_expired` must be
/// serialized by the caller (one event task, or an external mutex).
#[derive(Debug)]
pub struct DedupEngine<H> {
    cfg: DedupConfig,
    ttl: Duration,
    entries: VecDeque<CacheEntry<H>>,
}

impl<H: Clone + PartialEq> DedupEngine<H> {
    /// Build an engine from a validated config (see `DedupConfig::validate`).
    pub fn new(cfg: DedupConfig) -> Self {
        ensure_metrics_described();
        let ttl = cfg.cache_ttl();
        let prealloc = cfg.max_cache_size.min(1_024);
        Self {
            cfg,
            ttl,
            entries: VecDeque::with_capacity(prealloc),
        }
    }

    /// Classify one message. Precondition: `msg.text` is non-empty and
    /// already trimmed — sources drop empty messages before calling.
    pub fn ingest(&mut self, msg: ChatMessage<H>, now: SystemTime) -> MergeDecision<H> {
        debug_assert!(!msg.text.is_empty(), "sources must drop empty messages");
        counter!("dedup_messages_total").increment(1);

        if self.is_self(&msg.author) {
            tracing::debug!(target: "dedup", author = %msg.author, text = %msg.text,
                "skipping deduplication for current user");
            counter!("dedup_self_skip_total").increment(1);
            return MergeDecision::SelfSkip;
        }

        let normalised = normalise(&msg.text, self.cfg.ignore_case);

        let mut candidate: Option<(usize, MatchKind)> = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            // A message compared against its own representation is a
            // re-observation artifact, not a duplicate.
            if entry.handle == msg.handle {
                continue;
            }

            let cached = normalise(&entry.original_text, self.cfg.ignore_case);

            if normalised == cached {
                candidate = Some((idx, MatchKind::Exact));
                break;
            }
            if candidate.is_some() {
                // Already holding a non-exact fallback; only a later exact
                // match may still override it.
                continue;
            }

            if is_repetitive(&normalised)
                && is_repetitive(&cached)
                && same_repeated_char(&normalised, &cached)
            {
                // "???" ~ "??????" regardless of run length.
                candidate = Some((idx, MatchKind::Repetition));
            } else if self.cfg.use_levenshtein && within_fuzzy_len(&normalised, &cached) {
                let sim = similarity(&normalised, &cached);
                if sim >= self.cfg.similarity_threshold {
                    candidate = Some((idx, MatchKind::Fuzzy));
                }
            }
        }

        match candidate {
            Some((idx, kind)) => self.merge_into(idx, kind, msg, now),
            None => self.insert_new(msg, now),
        }
    }

    /// Remove every entry idle for longer than the TTL and report them so
    /// the renderer can restore their original text. Idempotent.
    pub fn sweep_expired(&mut self, now: SystemTime) -> Vec<Expired<H>> {
        let ttl = self.ttl;
        let mut expired = Vec::new();
        self.entries.retain(|e| {
            let age = now.duration_since(e.last_seen).unwrap_or_default();
            if age > ttl {
                expired.push(Expired {
                    handle: e.handle.clone(),
                    restore_text: e.original_text.clone(),
                });
                false
            } else {
                true
            }
        });
        if !expired.is_empty() {
            tracing::debug!(target: "dedup", removed = expired.len(), "ttl sweep");
            counter!("dedup_expired_total").increment(expired.len() as u64);
            gauge!("dedup_cache_entries").set(self.entries.len() as f64);
        }
        expired
    }

    /// Flush everything — the stream surface changed (page/channel switch),
    /// so the cached handles no longer exist. No renderer actions.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!(target: "dedup", dropped = self.entries.len(), "cache flushed");
        }
        self.entries.clear();
        gauge!("dedup_cache_entries").set(0.0);
    }

    /// Bind (or re-bind) the local user identity once the host detects it.
    pub fn set_self_user(&mut self, user: &str) {
        let user = user.trim().to_lowercase();
        self.cfg.self_user = (!user.is_empty()).then_some(user);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live entries in insertion order, for diagnostics and tests.
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry<H>> {
        self.entries.iter()
    }

    // -- internals --

    /// An unset or empty self user never matches, so a message with a
    /// missing author (empty string) is "not self".
    fn is_self(&self, author: &str) -> bool {
        match &self.cfg.self_user {
            Some(u) if !u.is_empty() => author.to_lowercase() == *u,
            _ => false,
        }
    }

    fn merge_into(
        &mut self,
        idx: usize,
        kind: MatchKind,
        msg: ChatMessage<H>,
        now: SystemTime,
    ) -> MergeDecision<H> {
        let entry = &mut self.entries[idx];
        entry.count += 1;
        entry.last_seen = now;

        tracing::debug!(target: "dedup", kind = ?kind, incoming = %msg.text,
            original = %entry.original_text, count = entry.count, "merged duplicate");
        counter!("dedup_merged_total").increment(1);

        MergeDecision::Merged(Merge {
            target: entry.handle.clone(),
            hide: msg.handle,
            display_text: format!("×{}: {}", entry.count, entry.original_text),
            count: entry.count,
            kind,
        })
    }

    fn insert_new(&mut self, msg: ChatMessage<H>, now: SystemTime) -> MergeDecision<H> {
        // Keys stay unique: a re-observation under the same handle skipped
        // the match scan, so an entry with this key may already exist and is
        // replaced wholesale.
        if let Some(pos) = self.entries.iter().position(|e| e.original_text == msg.text) {
            self.entries.remove(pos);
        }

        if self.entries.len() >= self.cfg.max_cache_size {
            self.evict_least_recent();
        }

        tracing::debug!(target: "dedup", author = %msg.author, text = %msg.text, "new message");
        counter!("dedup_inserted_total").increment(1);

        self.entries.push_back(CacheEntry {
            original_text: msg.text,
            count: 1,
            last_seen: now,
            author: msg.author,
            handle: msg.handle,
        });
        gauge!("dedup_cache_entries").set(self.entries.len() as f64);
        MergeDecision::Inserted
    }

    /// Drop the entry with the smallest `last_seen`; first minimum wins on
    /// ties so the scan stays a single pass.
    fn evict_least_recent(&mut self) {
        let mut oldest: Option<(usize, SystemTime)> = None;
        for (idx, e) in self.entries.iter().enumerate() {
            match oldest {
                Some((_, t)) if e.last_seen >= t => {}
                _ => oldest = Some((idx, e.last_seen)),
            }
        }
        if let Some((idx, _)) = oldest {
            if let Some(e) = self.entries.remove(idx) {
                tracing::debug!(target: "dedup", text = %e.original_text, "evicted by capacity");
                counter!("dedup_evicted_total").increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn ts(sec: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000 + sec)
    }

    fn msg(author: &str, text: &str, handle: u32) -> ChatMessage<u32> {
        ChatMessage {
            author: author.to_string(),
            text: text.to_string(),
            ts: ts(0),
            handle,
        }
    }

    fn engine(cfg: DedupConfig) -> DedupEngine<u32> {
        DedupEngine::new(cfg)
    }

    #[test]
    fn exact_duplicate_merges() {
        let mut e = engine(DedupConfig::default());
        assert!(e.ingest(msg("alice", "hello there", 1), ts(0)).is_inserted());
        let d = e.ingest(msg("bob", "hello there", 2), ts(1));
        let m = d.as_merged().expect("second occurrence must merge");
        assert_eq!(m.kind, MatchKind::Exact);
        assert_eq!(m.count, 2);
        assert_eq!(m.target, 1);
        assert_eq!(m.hide, 2);
        assert_eq!(m.display_text, "×2: hello there");
        assert_eq!(e.len(), 1);
    }

    #[test]
    fn later_exact_match_beats_earlier_repetition_candidate() {
        let mut e = engine(DedupConfig::default());
        e.ingest(msg("a", "!!!!", 1), ts(0));
        // Re-observed under the same handle, so it bypasses the scan and
        // both runs end up cached side by side.
        e.ingest(msg("a", "!!!", 1), ts(1));

        // "!!!" repetition-matches the first entry early in the scan but
        // exact-matches the second; exact must win.
        let d = e.ingest(msg("b", "!!!", 2), ts(2));
        let m = d.as_merged().unwrap();
        assert_eq!(m.kind, MatchKind::Exact);
        assert_eq!(m.display_text, "×2: !!!");
    }

    #[test]
    fn same_handle_is_never_compared() {
        let mut e = engine(DedupConfig::default());
        e.ingest(msg("a", "hello", 7), ts(0));
        // Same text re-observed under the same handle: not a duplicate, and
        // the entry is replaced rather than doubled.
        let d = e.ingest(msg("a", "hello", 7), ts(1));
        assert!(d.is_inserted());
        assert_eq!(e.len(), 1);
        assert_eq!(e.entries().next().unwrap().count, 1);
    }

    #[test]
    fn self_user_is_skipped_and_not_cached() {
        let cfg = DedupConfig {
            self_user: Some("streamer".into()),
            ..DedupConfig::default()
        };
        let mut e = engine(cfg);
        assert_eq!(e.ingest(msg("Streamer", "hi chat", 1), ts(0)), MergeDecision::SelfSkip);
        assert!(e.is_empty());
    }

    #[test]
    fn empty_author_is_not_self_even_with_unset_user() {
        let mut e = engine(DedupConfig::default());
        assert!(e.ingest(msg("", "hello", 1), ts(0)).is_inserted());
    }

    #[test]
    fn fuzzy_tier_respects_toggle() {
        let cfg = DedupConfig {
            use_levenshtein: false,
            ..DedupConfig::default()
        };
        let mut e = engine(cfg);
        e.ingest(msg("a", "hello world", 1), ts(0));
        assert!(e.ingest(msg("b", "hello worl", 2), ts(1)).is_inserted());
    }

    #[test]
    fn sweep_reports_restore_text() {
        let cfg = DedupConfig {
            cache_ttl_ms: 1_000,
            ..DedupConfig::default()
        };
        let mut e = engine(cfg);
        e.ingest(msg("a", "fading message", 1), ts(0));
        let gone = e.sweep_expired(ts(2));
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].handle, 1);
        assert_eq!(gone[0].restore_text, "fading message");
        assert!(e.is_empty());
        // idempotent
        assert!(e.sweep_expired(ts(2)).is_empty());
    }
}
