// src/config.rs
//! Engine configuration: loaded once at startup, validated, then immutable.
//!
//! Sources, in order: JSON file (`DEDUP_CONFIG_PATH`, default
//! `config/dedup.json`; a missing file just means defaults), then `DEDUP_*`
//! environment overrides. Invalid values are fatal at initialization — the
//! engine never has to re-validate per call.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, str::FromStr, time::Duration};

pub const ENV_CONFIG_PATH: &str = "DEDUP_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/dedup.json";

fn default_cache_ttl_ms() -> u64 {
    60_000
}
fn default_max_cache_size() -> usize {
    10_000
}
fn default_ignore_case() -> bool {
    true
}
fn default_use_levenshtein() -> bool {
    true
}
fn default_similarity_threshold() -> f64 {
    0.9
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Verbose classification logging (raises the default tracing filter).
    #[serde(default)]
    pub debug: bool,
    /// Entry TTL in milliseconds; entries idle longer than this are swept.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    /// Capacity bound; the least-recently-seen entry is evicted to make room.
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,
    /// Case-fold texts before comparison.
    #[serde(default = "default_ignore_case")]
    pub ignore_case: bool,
    /// Enable the fuzzy edit-distance tier.
    #[serde(default = "default_use_levenshtein")]
    pub use_levenshtein: bool,
    /// Inclusive similarity threshold for the fuzzy tier, in [0.0, 1.0].
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Lower-cased identity of the local user; their messages are never
    /// deduplicated. May also be bound later via `DedupEngine::set_self_user`.
    #[serde(default)]
    pub self_user: Option<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            debug: false,
            cache_ttl_ms: default_cache_ttl_ms(),
            max_cache_size: default_max_cache_size(),
            ignore_case: default_ignore_case(),
            use_levenshtein: default_use_levenshtein(),
            similarity_threshold: default_similarity_threshold(),
            self_user: None,
        }
    }
}

impl DedupConfig {
    /// Load from the path in `DEDUP_CONFIG_PATH` (or the default location),
    /// apply env overrides, and validate. The standard startup entrypoint.
    pub fn load() -> Result<Self> {
        let path = env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = if Path::new(&path).exists() {
            Self::load_from_file(&path)?
        } else {
            tracing::info!(target: "dedup", path = %path, "no config file, using defaults");
            Self::default()
        };
        cfg.apply_env_overrides()?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(&path)
            .with_context(|| format!("read config {}", path.as_ref().display()))?;
        let cfg: DedupConfig = serde_json::from_str(&data)
            .with_context(|| format!("parse config {}", path.as_ref().display()))?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_bool("DEDUP_DEBUG")? {
            self.debug = v;
        }
        if let Some(v) = env_parse::<u64>("DEDUP_CACHE_TTL_MS")? {
            self.cache_ttl_ms = v;
        }
        if let Some(v) = env_parse::<usize>("DEDUP_MAX_CACHE_SIZE")? {
            self.max_cache_size = v;
        }
        if let Some(v) = env_bool("DEDUP_IGNORE_CASE")? {
            self.ignore_case = v;
        }
        if let Some(v) = env_bool("DEDUP_USE_LEVENSHTEIN")? {
            self.use_levenshtein = v;
        }
        if let Some(v) = env_parse::<f64>("DEDUP_SIMILARITY_THRESHOLD")? {
            self.similarity_threshold = v;
        }
        if let Ok(v) = env::var("DEDUP_SELF_USER") {
            let v = v.trim().to_string();
            self.self_user = (!v.is_empty()).then_some(v);
        }
        Ok(())
    }

    /// Author identities are compared lower-cased; fold the configured one
    /// here so the engine can use plain equality.
    fn normalize(&mut self) {
        if let Some(u) = &self.self_user {
            self.self_user = Some(u.trim().to_lowercase());
        }
    }

    /// Startup-time sanity check; violations are configuration errors, not
    /// something the engine recovers from per call.
    pub fn validate(&self) -> Result<()> {
        if self.max_cache_size < 1 {
            bail!("max_cache_size must be >= 1 (got {})", self.max_cache_size);
        }
        if self.cache_ttl_ms == 0 {
            bail!("cache_ttl_ms must be > 0");
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            bail!(
                "similarity_threshold must be within [0.0, 1.0] (got {})",
                self.similarity_threshold
            );
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => Ok(Some(v)),
            Err(e) => bail!("invalid {key}={raw}: {e}"),
        },
        Err(_) => Ok(None),
    }
}

fn env_bool(key: &str) -> Result<Option<bool>> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Ok(Some(true)),
            "0" | "false" => Ok(Some(false)),
            other => bail!("invalid {key}={other}: expected true/false"),
        },
        Err(_) => Ok(None),
    }
}
