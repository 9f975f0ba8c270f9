//! Sync service configuration.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{AppResult, DrainSettings, KeySpace};

/// Environment variable prefix read by [`SyncConfig::from_env`].
pub const ENV_PREFIX: &str = "CALENDAR_SYNC_";

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Prefix for every lock store key.
    pub key_prefix: String,
    /// Name of the pending set, appended to `key_prefix`.
    pub queue_key: String,
    /// TTL of lock records in milliseconds. Must be non-zero.
    pub lock_ttl_ms: u64,
    /// Pause after a drain pass that made no progress, in milliseconds.
    pub drain_idle_backoff_ms: u64,
    /// Idle passes after which a drain gives up.
    pub drain_max_idle_passes: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            key_prefix: "calendar:".into(),
            queue_key: "queue".into(),
            lock_ttl_ms: 60_000,
            drain_idle_backoff_ms: 500,
            drain_max_idle_passes: 20,
        }
    }
}

impl SyncConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.lock_ttl_ms == 0 {
            return Err("lock_ttl_ms must be greater than 0".into());
        }
        if self.queue_key.is_empty() {
            return Err("queue_key must not be empty".into());
        }
        if self.drain_max_idle_passes == 0 {
            return Err("drain_max_idle_passes must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from `CALENDAR_SYNC_*` environment variables,
    /// reading a `.env` file first if one exists. Unset variables keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Fails when a numeric variable does not parse or validation fails.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Fails when a numeric variable does not parse or validation fails.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
        let mut cfg = Self::default();
        if let Some(prefix) = var("KEY_PREFIX") {
            cfg.key_prefix = prefix;
        }
        if let Some(queue) = var("QUEUE_KEY") {
            cfg.queue_key = queue;
        }
        if let Some(ttl) = var("LOCK_TTL_MS") {
            cfg.lock_ttl_ms = ttl
                .parse()
                .with_context(|| format!("{ENV_PREFIX}LOCK_TTL_MS={ttl}"))?;
        }
        if let Some(backoff) = var("DRAIN_IDLE_BACKOFF_MS") {
            cfg.drain_idle_backoff_ms = backoff
                .parse()
                .with_context(|| format!("{ENV_PREFIX}DRAIN_IDLE_BACKOFF_MS={backoff}"))?;
        }
        if let Some(passes) = var("DRAIN_MAX_IDLE_PASSES") {
            cfg.drain_max_idle_passes = passes
                .parse()
                .with_context(|| format!("{ENV_PREFIX}DRAIN_MAX_IDLE_PASSES={passes}"))?;
        }
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }

    /// Key naming derived from this configuration.
    pub fn key_space(&self) -> KeySpace {
        KeySpace::new(self.key_prefix.clone(), self.queue_key.clone())
    }

    /// Lock TTL as a duration.
    pub const fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    /// Drain loop tuning.
    pub const fn drain_settings(&self) -> DrainSettings {
        DrainSettings {
            idle_backoff: Duration::from_millis(self.drain_idle_backoff_ms),
            max_idle_passes: self.drain_max_idle_passes,
        }
    }
}
