//! Chat Deduplicator — Binary Entrypoint
//! Reads a chat stream as JSON lines on stdin, runs the dedup engine over
//! it, and logs the merge/restore actions a real renderer would apply.
//!
//! See `README.md` for the wire format and configuration keys.

use chat_deduplicator::config::DedupConfig;
use chat_deduplicator::engine::DedupEngine;
use chat_deduplicator::metrics::Metrics;
use chat_deduplicator::pipeline::{self, PipelineCfg};
use chat_deduplicator::render::ConsoleRenderer;
use chat_deduplicator::source::{MessageId, StdinSource};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact tracing to stderr; `debug = true` in the config raises the
/// default filter so every classification decision is visible.
fn init_tracing(debug: bool) {
    let default = if debug { "dedup=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    // Config is read once; invalid values abort startup.
    let cfg = DedupConfig::load()?;
    init_tracing(cfg.debug);
    tracing::info!(
        target: "dedup",
        ttl_ms = cfg.cache_ttl_ms,
        max_size = cfg.max_cache_size,
        ignore_case = cfg.ignore_case,
        fuzzy = cfg.use_levenshtein,
        threshold = cfg.similarity_threshold,
        "starting"
    );

    let metrics = Metrics::init(cfg.cache_ttl_ms);
    let debug = cfg.debug;

    let mut engine: DedupEngine<MessageId> = DedupEngine::new(cfg);
    let mut renderer = ConsoleRenderer;
    pipeline::run(
        PipelineCfg::default(),
        StdinSource::new(),
        &mut renderer,
        &mut engine,
    )
    .await?;

    if debug {
        tracing::debug!(target: "metrics", "{}", metrics.render());
    }
    Ok(())
}
