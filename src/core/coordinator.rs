//! Lock and reservation coordinator.
//!
//! Arbitrates which actor (webhook handler, drain task, periodic reconciler)
//! may mutate a synchronization unit. Three records live in the shared
//! [`LockStore`]:
//!
//! - `<prefix>lock:<key>`: exclusive lock holding a random token, with TTL.
//! - `<prefix>reserved:<key>`: set by the periodic reconciler before it
//!   touches a unit. Only read here; a reservation always wins.
//! - `<prefix><queue>`: the pending set of units awaiting reconciliation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::core::{LockStore, SyncError};
use crate::util::serde::SyncKey;

/// Naming scheme for lock, reservation and pending-set keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
    queue: String,
}

impl KeySpace {
    /// Create a key space. `prefix` is prepended verbatim to every key.
    pub fn new(prefix: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            queue: queue.into(),
        }
    }

    /// Key of the lock record for `key`.
    pub fn lock_key(&self, key: &SyncKey) -> String {
        format!("{}lock:{}", self.prefix, key)
    }

    /// Key of the reservation record for `key`.
    pub fn reserved_key(&self, key: &SyncKey) -> String {
        format!("{}reserved:{}", self.prefix, key)
    }

    /// Key of the shared pending set.
    pub fn queue_key(&self) -> String {
        format!("{}{}", self.prefix, self.queue)
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new("calendar:", "queue")
    }
}

/// Outcome of [`LockCoordinator::acquire`].
#[derive(Debug)]
pub enum Acquisition {
    /// The caller owns the unit and must release the guard when done.
    Acquired(LockGuard),
    /// The periodic reconciler holds a reservation; defer to it.
    Reserved,
    /// Another actor holds the lock.
    Contended,
}

impl Acquisition {
    /// Whether a reservation pre-empted the caller.
    pub const fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved)
    }

    /// Lock token, if the lock was obtained.
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Acquired(guard) => Some(guard.token()),
            Self::Reserved | Self::Contended => None,
        }
    }
}

/// Proof of ownership of one unit's lock.
///
/// Call [`LockGuard::release`] on every exit path. A guard dropped without
/// release (panic, cancelled future) hands the release to the current tokio
/// runtime; outside a runtime the lock is left to expire by TTL.
pub struct LockGuard {
    store: Arc<dyn LockStore>,
    sync_key: SyncKey,
    lock_key: String,
    token: String,
    released: bool,
}

impl LockGuard {
    /// Random token stored in the lock record.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Unit this guard locks.
    pub const fn sync_key(&self) -> &SyncKey {
        &self.sync_key
    }

    /// Release the lock. Failures are logged; the TTL is the backstop.
    ///
    /// If this future is dropped before the store answers, the guard's drop
    /// fallback issues the release again.
    pub async fn release(mut self) {
        release_logged(self.store.as_ref(), &self.lock_key, &self.token).await;
        self.released = true;
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("sync_key", &self.sync_key)
            .field("lock_key", &self.lock_key)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = Arc::clone(&self.store);
        let lock_key = std::mem::take(&mut self.lock_key);
        let token = std::mem::take(&mut self.token);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tracing::warn!(lock_key = %lock_key, "lock guard dropped without release, releasing in background");
            handle.spawn(async move {
                release_logged(store.as_ref(), &lock_key, &token).await;
            });
        } else {
            tracing::error!(lock_key = %lock_key, "lock guard dropped outside a runtime; lock will expire by TTL");
        }
    }
}

async fn release_logged(store: &dyn LockStore, lock_key: &str, token: &str) {
    match store.release_lock(lock_key, token).await {
        Ok(true) => tracing::debug!(lock_key, "released calendar lock"),
        // Expired or taken over; it will not outlive its TTL either way.
        Ok(false) => tracing::error!(lock_key, "calendar lock not held by this token"),
        Err(e) => tracing::error!(lock_key, error = %e, "failed to release calendar lock"),
    }
}

/// Implements the acquire / enqueue / retry-once protocol for single units.
#[derive(Clone)]
pub struct LockCoordinator {
    store: Arc<dyn LockStore>,
    keys: KeySpace,
    lock_ttl: Duration,
}

impl LockCoordinator {
    /// Create a coordinator.
    ///
    /// # Errors
    ///
    /// [`SyncError::Config`] when `lock_ttl` is zero: stores treat a zero TTL
    /// as "never expires", which would let a crashed holder keep the unit
    /// forever.
    pub fn new(
        store: Arc<dyn LockStore>,
        keys: KeySpace,
        lock_ttl: Duration,
    ) -> Result<Self, SyncError> {
        if lock_ttl.is_zero() {
            return Err(SyncError::Config("lock ttl must be non-zero".into()));
        }
        Ok(Self {
            store,
            keys,
            lock_ttl,
        })
    }

    /// Key naming in use.
    pub const fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    /// TTL applied to every lock acquisition.
    pub const fn lock_ttl(&self) -> Duration {
        self.lock_ttl
    }

    /// Try to take exclusive ownership of `key`.
    ///
    /// With `enqueue_on_contention` false the call is a dry check: it never
    /// touches the pending set. With it true, a contended unit is added to the
    /// pending set, and unless a reservation is the cause, acquisition is
    /// retried once to cover a holder that released in between.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::LockStore`] when the lock store cannot be reached.
    pub async fn acquire(
        &self,
        key: &SyncKey,
        enqueue_on_contention: bool,
    ) -> Result<Acquisition, SyncError> {
        let reserved = self.store.get(&self.keys.reserved_key(key)).await?.is_some();
        if reserved && !enqueue_on_contention {
            return Ok(Acquisition::Reserved);
        }

        if !reserved {
            if let Some(token) = self.try_lock(key).await? {
                return Ok(Acquisition::Acquired(self.guard(key, token)));
            }
        }

        if !enqueue_on_contention {
            return Ok(Acquisition::Contended);
        }

        self.enqueue(key).await?;
        if reserved {
            tracing::debug!(sync_key = %key, "unit reserved by reconciler, queued");
            return Ok(Acquisition::Reserved);
        }

        match self.try_lock(key).await? {
            Some(token) => Ok(Acquisition::Acquired(self.guard(key, token))),
            None => {
                tracing::debug!(sync_key = %key, "unit locked elsewhere, queued");
                Ok(Acquisition::Contended)
            }
        }
    }

    /// Release a previously acquired lock.
    pub async fn release(&self, guard: LockGuard) {
        guard.release().await;
    }

    /// Add `key` to the pending set.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::LockStore`] on store failure.
    pub async fn enqueue(&self, key: &SyncKey) -> Result<(), SyncError> {
        self.store.add_to_set(&self.keys.queue_key(), key.as_str()).await
    }

    /// Remove `key` from the pending set.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::LockStore`] on store failure.
    pub async fn remove_pending(&self, key: &SyncKey) -> Result<(), SyncError> {
        self.store
            .remove_from_set(&self.keys.queue_key(), key.as_str())
            .await
    }

    /// Snapshot of the pending set.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::LockStore`] on store failure.
    pub async fn pending(&self) -> Result<Vec<SyncKey>, SyncError> {
        let members = self.store.get_set(&self.keys.queue_key()).await?;
        Ok(members.into_iter().map(SyncKey::from).collect())
    }

    async fn try_lock(&self, key: &SyncKey) -> Result<Option<String>, SyncError> {
        let token = Uuid::new_v4().to_string();
        let acquired = self
            .store
            .acquire_lock(&self.keys.lock_key(key), &token, self.lock_ttl)
            .await?;
        Ok(acquired.then_some(token))
    }

    fn guard(&self, key: &SyncKey, token: String) -> LockGuard {
        LockGuard {
            store: Arc::clone(&self.store),
            sync_key: key.clone(),
            lock_key: self.keys.lock_key(key),
            token,
            released: false,
        }
    }
}
