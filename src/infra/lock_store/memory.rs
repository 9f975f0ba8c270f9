//! In-memory lock store with TTL expiry and set collections.
//!
//! Process-local, so it only coordinates actors inside one service instance.
//! Intended for development and tests; production deployments plug a shared
//! store in behind [`LockStore`].

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{LockStore, SyncError};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Default)]
struct State {
    values: HashMap<String, Entry>,
    sets: HashMap<String, BTreeSet<String>>,
}

impl State {
    fn live_value(&mut self, key: &str, now: Instant) -> Option<&Entry> {
        if self.values.get(key).is_some_and(|e| !e.is_live(now)) {
            self.values.remove(key);
        }
        self.values.get(key)
    }
}

/// Key/value + set store held behind a single `parking_lot::Mutex`, which
/// makes every operation atomic.
#[derive(Default)]
pub struct InMemoryLockStore {
    state: Mutex<State>,
}

impl InMemoryLockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` unconditionally, optionally with a TTL. Used to seed
    /// reservations the way the periodic reconciler would.
    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.state.lock().values.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    /// Delete `key` unconditionally.
    pub fn delete(&self, key: &str) {
        self.state.lock().values.remove(key);
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        let mut state = self.state.lock();
        Ok(state
            .live_value(key, Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn acquire_lock(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, SyncError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.live_value(key, now).is_some() {
            return Ok(false);
        }
        let expires_at = (!ttl.is_zero()).then(|| now + ttl);
        state.values.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn release_lock(&self, key: &str, value: &str) -> Result<bool, SyncError> {
        let mut state = self.state.lock();
        let held = state
            .live_value(key, Instant::now())
            .is_some_and(|entry| entry.value == value);
        if held {
            state.values.remove(key);
        }
        Ok(held)
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), SyncError> {
        self.state
            .lock()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), SyncError> {
        let mut state = self.state.lock();
        if let Some(set) = state.sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                state.sets.remove(key);
            }
        }
        Ok(())
    }

    async fn get_set(&self, key: &str) -> Result<Vec<String>, SyncError> {
        Ok(self
            .state
            .lock()
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }
}
