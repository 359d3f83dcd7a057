// tests/config_load.rs
//
// Config loading: file + env override precedence and startup validation.
// Env-mutating tests are serialized (process-global state).

use serial_test::serial;
use std::{env, fs};

use chat_deduplicator::DedupConfig;

const ENV_KEYS: &[&str] = &[
    "DEDUP_CONFIG_PATH",
    "DEDUP_DEBUG",
    "DEDUP_CACHE_TTL_MS",
    "DEDUP_MAX_CACHE_SIZE",
    "DEDUP_IGNORE_CASE",
    "DEDUP_USE_LEVENSHTEIN",
    "DEDUP_SIMILARITY_THRESHOLD",
    "DEDUP_SELF_USER",
];

fn clear_env() {
    for k in ENV_KEYS {
        env::remove_var(k);
    }
}

fn tmp_path(name: &str) -> std::path::PathBuf {
    env::temp_dir().join(format!("chat-dedup-test-{}-{name}.json", std::process::id()))
}

#[test]
fn defaults_mirror_documented_values() {
    let cfg = DedupConfig::default();
    assert!(!cfg.debug);
    assert_eq!(cfg.cache_ttl_ms, 60_000);
    assert_eq!(cfg.max_cache_size, 10_000);
    assert!(cfg.ignore_case);
    assert!(cfg.use_levenshtein);
    assert_eq!(cfg.similarity_threshold, 0.9);
    assert_eq!(cfg.self_user, None);
    assert!(cfg.validate().is_ok());
}

#[test]
fn partial_file_fills_in_defaults() {
    let path = tmp_path("partial");
    fs::write(&path, r#"{"max_cache_size": 500, "ignore_case": false}"#).unwrap();
    let cfg = DedupConfig::load_from_file(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(cfg.max_cache_size, 500);
    assert!(!cfg.ignore_case);
    // untouched keys keep their defaults
    assert_eq!(cfg.cache_ttl_ms, 60_000);
    assert_eq!(cfg.similarity_threshold, 0.9);
}

#[test]
fn malformed_file_is_an_error() {
    let path = tmp_path("malformed");
    fs::write(&path, "{not json").unwrap();
    assert!(DedupConfig::load_from_file(&path).is_err());
    fs::remove_file(&path).ok();
}

#[test]
fn validation_rejects_bad_ranges() {
    let mut cfg = DedupConfig {
        max_cache_size: 0,
        ..DedupConfig::default()
    };
    assert!(cfg.validate().is_err());

    cfg.max_cache_size = 1;
    cfg.similarity_threshold = 1.5;
    assert!(cfg.validate().is_err());
    cfg.similarity_threshold = -0.1;
    assert!(cfg.validate().is_err());

    cfg.similarity_threshold = 0.9;
    cfg.cache_ttl_ms = 0;
    assert!(cfg.validate().is_err());
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    clear_env();
    env::set_var("DEDUP_CONFIG_PATH", tmp_path("does-not-exist"));
    let cfg = DedupConfig::load().unwrap();
    clear_env();
    assert_eq!(cfg.max_cache_size, 10_000);
}

#[test]
#[serial]
fn env_overrides_beat_file_values() {
    clear_env();
    let path = tmp_path("override");
    fs::write(&path, r#"{"max_cache_size": 500, "self_user": "FromFile"}"#).unwrap();
    env::set_var("DEDUP_CONFIG_PATH", &path);
    env::set_var("DEDUP_MAX_CACHE_SIZE", "77");
    env::set_var("DEDUP_SELF_USER", "StreamerGal");
    env::set_var("DEDUP_USE_LEVENSHTEIN", "false");

    let cfg = DedupConfig::load().unwrap();
    clear_env();
    fs::remove_file(&path).ok();

    assert_eq!(cfg.max_cache_size, 77);
    assert!(!cfg.use_levenshtein);
    // identities are folded for the engine's equality check
    assert_eq!(cfg.self_user.as_deref(), Some("streamergal"));
}

#[test]
#[serial]
fn unparseable_env_value_is_fatal() {
    clear_env();
    env::set_var("DEDUP_CONFIG_PATH", tmp_path("none"));
    env::set_var("DEDUP_CACHE_TTL_MS", "soon");
    let res = DedupConfig::load();
    clear_env();
    assert!(res.is_err());
}

#[test]
#[serial]
fn out_of_range_env_value_fails_validation() {
    clear_env();
    env::set_var("DEDUP_CONFIG_PATH", tmp_path("none"));
    env::set_var("DEDUP_SIMILARITY_THRESHOLD", "1.2");
    let res = DedupConfig::load();
    clear_env();
    assert!(res.is_err());
}
