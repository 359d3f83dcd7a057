// src/render.rs
//! Renderer boundary: the engine decides, the renderer owns every visible
//! side effect (and the handles' lifetimes).

use crate::decision::{Expired, Merge};

/// Applies merge decisions to whatever surface the messages live on.
pub trait Renderer {
    type Handle;

    /// Rewrite the target's visible text to `merge.display_text`, suppress
    /// its author/badge decorations, and hide (not remove) `merge.hide`.
    fn render_merge(&mut self, merge: &Merge<Self::Handle>);

    /// A newly remembered message needs no visible change.
    fn render_insert(&mut self, _handle: &Self::Handle) {}

    /// The entry is no longer tracked: restore its original un-merged text.
    fn render_expired(&mut self, expired: &Expired<Self::Handle>);
}

/// Log-only renderer for the demo host and smoke tests.
#[derive(Debug, Default)]
pub struct ConsoleRenderer;

impl Renderer for ConsoleRenderer {
    type Handle = crate::source::MessageId;

    fn render_merge(&mut self, merge: &Merge<Self::Handle>) {
        println!(
            "[merge {:?} -> {:?}] {}",
            merge.hide, merge.target, merge.display_text
        );
    }

    fn render_expired(&mut self, expired: &Expired<Self::Handle>) {
        println!("[restore {:?}] {}", expired.handle, expired.restore_text);
    }
}
