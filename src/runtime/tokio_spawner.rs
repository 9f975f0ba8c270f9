//! Tokio runtime spawner implementation.

use std::future::Future;

use crate::core::{Spawn, SyncError};

/// Spawner that runs detached tasks on a tokio runtime.
///
/// Tasks are spawned on the runtime behind the stored handle, not on whatever
/// runtime happens to poll the caller, so drains keep running after the
/// request that started them completes.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    /// Create a spawner from a tokio runtime handle.
    pub const fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Spawner bound to the runtime the caller is running on.
    ///
    /// # Errors
    ///
    /// [`SyncError::Internal`] when called outside a tokio runtime.
    pub fn current() -> Result<Self, SyncError> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| SyncError::Internal(format!("no tokio runtime: {e}")))
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        drop(self.handle.spawn(fut));
    }
}
