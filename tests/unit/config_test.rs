//! Tests for configuration validation

use std::collections::HashMap;
use std::time::Duration;

use calendar_sync::config::SyncConfig;

#[test]
fn test_default_config_is_valid() {
    let config = SyncConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.lock_ttl(), Duration::from_secs(60));
    assert_eq!(config.key_space().queue_key(), "calendar:queue");
}

#[test]
fn test_zero_ttl_is_rejected() {
    let invalid = SyncConfig {
        lock_ttl_ms: 0,
        ..SyncConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_empty_queue_key_is_rejected() {
    let invalid = SyncConfig {
        queue_key: String::new(),
        ..SyncConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_zero_idle_passes_is_rejected() {
    let invalid = SyncConfig {
        drain_max_idle_passes: 0,
        ..SyncConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_from_json_str_fills_defaults() {
    let config = SyncConfig::from_json_str(r#"{"key_prefix":"fleet:","lock_ttl_ms":5000}"#).unwrap();
    assert_eq!(config.key_prefix, "fleet:");
    assert_eq!(config.queue_key, "queue");
    assert_eq!(config.lock_ttl_ms, 5000);

    assert!(SyncConfig::from_json_str(r#"{"lock_ttl_ms":0}"#).is_err());
    assert!(SyncConfig::from_json_str("not json").is_err());
}

#[test]
fn test_from_lookup_reads_prefixed_vars() {
    let vars: HashMap<&str, &str> = [
        ("CALENDAR_SYNC_KEY_PREFIX", "fleet:calendar:"),
        ("CALENDAR_SYNC_LOCK_TTL_MS", "15000"),
        ("CALENDAR_SYNC_DRAIN_IDLE_BACKOFF_MS", "50"),
    ]
    .into_iter()
    .collect();

    let config = SyncConfig::from_lookup(|name| vars.get(name).map(|v| (*v).to_string())).unwrap();
    assert_eq!(config.key_prefix, "fleet:calendar:");
    assert_eq!(config.lock_ttl_ms, 15_000);
    assert_eq!(config.drain_settings().idle_backoff, Duration::from_millis(50));
    assert_eq!(config.drain_max_idle_passes, 20);
}

#[test]
fn test_from_lookup_rejects_bad_numbers() {
    let err = SyncConfig::from_lookup(|name| {
        (name == "CALENDAR_SYNC_LOCK_TTL_MS").then(|| "soon".to_string())
    })
    .unwrap_err();
    assert!(err.to_string().contains("CALENDAR_SYNC_LOCK_TTL_MS"));

    assert!(SyncConfig::from_lookup(|name| {
        (name == "CALENDAR_SYNC_LOCK_TTL_MS").then(|| "0".to_string())
    })
    .is_err());
}
