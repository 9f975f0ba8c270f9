//! Runtime-agnostic task spawning.

use std::future::Future;

use tokio::sync::oneshot;

/// Abstraction for spawning detached tasks on a runtime.
pub trait Spawn {
    /// Spawn a future; the caller keeps no handle to it.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Spawn `fut` and return a receiver for its output.
///
/// The task keeps running if the receiver is dropped, so awaiting the
/// receiver from a request handler gives "wait for the result unless the
/// client goes away, and finish the work either way".
pub fn spawn_outliving<S, F, T>(spawner: &S, fut: F) -> oneshot::Receiver<T>
where
    S: Spawn + ?Sized,
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    spawner.spawn(async move {
        // The receiver may be gone (client disconnected); the work still ran.
        let _ = tx.send(fut.await);
    });
    rx
}
