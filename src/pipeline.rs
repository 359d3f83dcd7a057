// src/pipeline.rs
//! Host loop wiring source → engine → renderer, plus the periodic TTL
//! sweep. Every engine call happens on this one task, which is exactly the
//! serialization the engine requires.

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::time::{Duration, SystemTime};

use crate::decision::MergeDecision;
use crate::engine::DedupEngine;
use crate::render::Renderer;
use crate::source::{MessageSource, SourceItem};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("dedup_sweep_runs_total", "TTL sweep ticks executed.");
        describe_gauge!("dedup_last_sweep_ts", "Unix ts of the last TTL sweep.");
    });
}

#[derive(Clone, Copy, Debug)]
pub struct PipelineCfg {
    pub sweep_interval: Duration,
}

impl Default for PipelineCfg {
    fn default() -> Self {
        // One sweep per second keeps expiry within a second of the TTL.
        Self {
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// Drain `source` to completion, applying every decision through `renderer`.
pub async fn run<S, R>(
    cfg: PipelineCfg,
    mut source: S,
    renderer: &mut R,
    engine: &mut DedupEngine<S::Handle>,
) -> Result<()>
where
    S: MessageSource,
    R: Renderer<Handle = S::Handle>,
{
    ensure_metrics_described();
    let source_name = source.name();
    let mut ticker = tokio::time::interval(cfg.sweep_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for exp in engine.sweep_expired(SystemTime::now()) {
                    renderer.render_expired(&exp);
                }
                counter!("dedup_sweep_runs_total").increment(1);
                gauge!("dedup_last_sweep_ts")
                    .set(chrono::Utc::now().timestamp().max(0) as f64);
            }
            item = source.next_item() => {
                match item? {
                    None => {
                        tracing::info!(target: "dedup", source = source_name, "stream ended");
                        break;
                    }
                    Some(SourceItem::Reset) => {
                        tracing::info!(target: "dedup", source = source_name,
                            "stream surface changed, flushing cache");
                        engine.clear();
                    }
                    Some(SourceItem::Message(msg)) => {
                        let now = msg.ts;
                        let handle = msg.handle.clone();
                        match engine.ingest(msg, now) {
                            MergeDecision::Merged(m) => renderer.render_merge(&m),
                            MergeDecision::Inserted => renderer.render_insert(&handle),
                            MergeDecision::SelfSkip => {}
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
