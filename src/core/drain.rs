//! Drain scheduler: a process-wide single-flight gate plus the background
//! loop that empties the pending set.
//!
//! The gate is process-local. Several service instances may each run one
//! drain against the same pending set at the same time; that is redundant but
//! safe, because every unit is still processed under its lock.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::reconcile::{DrainStep, Reconciler};
use crate::core::Spawn;
use crate::util::serde::SyncKey;

/// Single-flight guard bounding concurrent drains to one.
///
/// Injectable so tests can observe and drive the gate deterministically.
pub trait DrainGate: Send + Sync {
    /// Flip idle to draining. Returns false if a drain is already active.
    fn try_begin(&self) -> bool;
    /// Flip back to idle.
    fn finish(&self);
    /// Whether a drain is active.
    fn is_draining(&self) -> bool;
}

/// Default gate: a boolean behind a `parking_lot::Mutex`, held only for the
/// check-and-set.
#[derive(Debug, Default)]
pub struct ProcessDrainGate {
    draining: Mutex<bool>,
}

impl ProcessDrainGate {
    /// Create an idle gate.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DrainGate for ProcessDrainGate {
    fn try_begin(&self) -> bool {
        let mut draining = self.draining.lock();
        if *draining {
            return false;
        }
        *draining = true;
        true
    }

    fn finish(&self) {
        *self.draining.lock() = false;
    }

    fn is_draining(&self) -> bool {
        *self.draining.lock()
    }
}

/// Ownership of the gate. Dropping the permit resets the gate, so a drain
/// that returns early, halts or panics can never leave it stuck.
pub struct DrainPermit {
    gate: Arc<dyn DrainGate>,
}

impl DrainPermit {
    /// Take the gate if it is idle.
    pub fn try_acquire(gate: &Arc<dyn DrainGate>) -> Option<Self> {
        gate.try_begin().then(|| Self {
            gate: Arc::clone(gate),
        })
    }
}

impl Drop for DrainPermit {
    fn drop(&mut self) {
        self.gate.finish();
    }
}

/// Tuning for the drain loop.
#[derive(Debug, Clone)]
pub struct DrainSettings {
    /// Pause after a pass in which every unit was owned by someone else.
    pub idle_backoff: Duration,
    /// Consecutive idle passes after which the drain gives up and leaves the
    /// remaining units for the next trigger.
    pub max_idle_passes: u32,
}

impl Default for DrainSettings {
    fn default() -> Self {
        Self {
            idle_backoff: Duration::from_millis(500),
            max_idle_passes: 20,
        }
    }
}

/// Result of [`DrainScheduler::maybe_start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStart {
    /// A drain task was spawned with this many seed units.
    Started {
        /// Size of the seed batch.
        queued: usize,
    },
    /// A drain is already active in this process.
    AlreadyRunning,
    /// Nothing queued (or the pending set could not be read).
    Idle,
}

/// Summary of one drain run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Passes over a pending-set snapshot.
    pub passes: u32,
    /// Units reconciled.
    pub reconciled: usize,
    /// Units dropped as stale or because the integration is disabled.
    pub resolved: usize,
    /// Units whose policy evaluation failed; they stay queued.
    pub failed: usize,
    /// Stopped by the circuit breaker or a pending-set read failure.
    pub halted: bool,
    /// Stopped after too many passes without progress.
    pub gave_up: bool,
}

impl DrainReport {
    fn record(&mut self, step: DrainStep) {
        match step {
            DrainStep::Reconciled(_) => self.reconciled += 1,
            DrainStep::Resolved => self.resolved += 1,
            DrainStep::Failed => self.failed += 1,
            DrainStep::Skipped | DrainStep::Halt => {}
        }
    }
}

/// Starts background drains, at most one per gate.
pub struct DrainScheduler<S> {
    reconciler: Arc<Reconciler>,
    gate: Arc<dyn DrainGate>,
    spawner: S,
    settings: DrainSettings,
}

impl<S: Clone> Clone for DrainScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            reconciler: Arc::clone(&self.reconciler),
            gate: Arc::clone(&self.gate),
            spawner: self.spawner.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S> DrainScheduler<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a scheduler.
    pub fn new(
        reconciler: Arc<Reconciler>,
        gate: Arc<dyn DrainGate>,
        spawner: S,
        settings: DrainSettings,
    ) -> Self {
        Self {
            reconciler,
            gate,
            spawner,
            settings,
        }
    }

    /// Gate in use.
    pub const fn gate(&self) -> &Arc<dyn DrainGate> {
        &self.gate
    }

    /// Shared reconciler.
    pub const fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Spawn a drain unless one is already running or nothing is queued.
    ///
    /// The pending set is read before the gate is taken, so the gate only
    /// flips to draining on a non-empty snapshot and a trigger that observes
    /// a freshly queued unit can still win it. Never waits for the drain
    /// itself.
    pub async fn maybe_start(&self) -> DrainStart {
        if self.gate.is_draining() {
            tracing::debug!("calendar drain already running");
            return DrainStart::AlreadyRunning;
        }

        let seed = match self.reconciler.coordinator().pending().await {
            Ok(seed) => seed,
            Err(e) => {
                tracing::error!(error = %e, "failed to read pending calendar units");
                return DrainStart::Idle;
            }
        };
        if seed.is_empty() {
            return DrainStart::Idle;
        }

        let Some(permit) = DrainPermit::try_acquire(&self.gate) else {
            tracing::debug!("calendar drain already running");
            return DrainStart::AlreadyRunning;
        };

        let queued = seed.len();
        let reconciler = Arc::clone(&self.reconciler);
        let gate = Arc::clone(&self.gate);
        let settings = self.settings.clone();
        self.spawner.spawn(async move {
            drain_until_quiet(&reconciler, &gate, &settings, permit, seed).await;
        });
        tracing::debug!(queued, "calendar drain started");
        DrainStart::Started { queued }
    }
}

/// Run drains back to back while holding the gate.
///
/// A trigger that arrives while the last pass is finishing sees the gate
/// taken and returns; the pending set is therefore re-read once the permit is
/// gone, and a new drain starts if units were left behind.
async fn drain_until_quiet(
    reconciler: &Reconciler,
    gate: &Arc<dyn DrainGate>,
    settings: &DrainSettings,
    mut permit: DrainPermit,
    mut seed: Vec<SyncKey>,
) {
    loop {
        let report = run_drain(reconciler, settings, seed).await;
        tracing::info!(
            passes = report.passes,
            reconciled = report.reconciled,
            resolved = report.resolved,
            failed = report.failed,
            halted = report.halted,
            gave_up = report.gave_up,
            "calendar drain finished"
        );
        drop(permit);
        if report.halted || report.gave_up {
            return;
        }

        seed = match reconciler.coordinator().pending().await {
            Ok(pending) if !pending.is_empty() => pending,
            Ok(_) => return,
            Err(e) => {
                tracing::error!(error = %e, "failed to re-read pending calendar units");
                return;
            }
        };
        let Some(next) = DrainPermit::try_acquire(gate) else {
            return;
        };
        permit = next;
    }
}

/// Drain the pending set starting from `seed`.
///
/// Each pass processes a snapshot in order; the first unit that trips the
/// circuit breaker ends the whole drain. After a full pass the pending set is
/// re-read to pick up units re-added meanwhile, until it is empty.
pub async fn run_drain(
    reconciler: &Reconciler,
    settings: &DrainSettings,
    seed: Vec<SyncKey>,
) -> DrainReport {
    let mut report = DrainReport::default();
    let mut batch = seed;
    let mut idle_passes = 0;

    loop {
        report.passes += 1;
        let mut progressed = false;
        for key in &batch {
            let step = reconciler.process_queued(key).await;
            report.record(step);
            if step.made_progress() {
                progressed = true;
            }
            if !step.continue_draining() {
                report.halted = true;
                return report;
            }
        }

        if progressed {
            idle_passes = 0;
        } else {
            idle_passes += 1;
            if idle_passes >= settings.max_idle_passes {
                tracing::warn!(remaining = batch.len(), "calendar drain making no progress, giving up");
                report.gave_up = true;
                return report;
            }
            tokio::time::sleep(settings.idle_backoff).await;
        }

        batch = match reconciler.coordinator().pending().await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(error = %e, "failed to re-read pending calendar units");
                report.halted = true;
                return report;
            }
        };
        if batch.is_empty() {
            return report;
        }
    }
}
