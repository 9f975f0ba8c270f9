//! Event reconciliation: turns the policy evaluator's verdict into provider
//! and store writes, and processes single queued units for the drain task.

use std::sync::Arc;

use uuid::Uuid;

use crate::core::audit::{Actor, AuditAction, AuditTrail};
use crate::core::{
    Acquisition, CalendarProvider, EventStore, LockCoordinator, PolicyEvaluator, SyncError,
};
use crate::util::serde::{EventDetails, SyncKey};

/// What a reconciliation pass did to the provider-side event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The provider changed the event and the new snapshot was persisted.
    Updated,
    /// The provider already had the desired event.
    Unchanged,
    /// The evaluator decided the host needs no event.
    NoEventNeeded,
}

/// Result of processing one queued unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStep {
    /// The unit was reconciled.
    Reconciled(ReconcileOutcome),
    /// Another actor owns the unit (lock held or reserved); it stays queued.
    Skipped,
    /// Nothing to do: integration disabled or the unit no longer exists.
    Resolved,
    /// Policy evaluation failed for this unit only; it was re-queued.
    Failed,
    /// Provider or store failure; the unit stays queued and the drain must
    /// stop.
    Halt,
}

impl DrainStep {
    /// Whether the drain may move on to the next unit.
    pub const fn continue_draining(&self) -> bool {
        !matches!(self, Self::Halt)
    }

    /// Whether the unit left the pending set for good.
    pub const fn made_progress(&self) -> bool {
        matches!(self, Self::Reconciled(_) | Self::Resolved)
    }

    const fn audit_action(&self) -> AuditAction {
        match self {
            Self::Reconciled(_) => AuditAction::Processed,
            Self::Skipped => AuditAction::Skipped,
            Self::Resolved => AuditAction::Stale,
            Self::Failed => AuditAction::Failed,
            Self::Halt => AuditAction::CircuitBroken,
        }
    }
}

/// Shared reconciliation context used by both the webhook path and the drain
/// task.
pub struct Reconciler {
    coordinator: LockCoordinator,
    events: Arc<dyn EventStore>,
    calendar: Arc<dyn CalendarProvider>,
    evaluator: Arc<dyn PolicyEvaluator>,
    audit: AuditTrail,
}

impl Reconciler {
    /// Create a reconciler over the given collaborators.
    pub fn new(
        coordinator: LockCoordinator,
        events: Arc<dyn EventStore>,
        calendar: Arc<dyn CalendarProvider>,
        evaluator: Arc<dyn PolicyEvaluator>,
    ) -> Self {
        Self {
            coordinator,
            events,
            calendar,
            evaluator,
            audit: AuditTrail::disabled(),
        }
    }

    /// Attach an audit trail.
    #[must_use]
    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    /// Lock coordinator.
    pub const fn coordinator(&self) -> &LockCoordinator {
        &self.coordinator
    }

    /// Persistent store.
    pub fn events(&self) -> &dyn EventStore {
        self.events.as_ref()
    }

    /// Audit trail.
    pub const fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Run the policy evaluator for `details` and push its verdict to the
    /// provider. A changed event is persisted, which also resets the host's
    /// webhook status.
    ///
    /// Callers must hold the unit's lock.
    ///
    /// # Errors
    ///
    /// [`SyncError::Evaluation`] when the evaluator fails,
    /// [`SyncError::Provider`] on calendar API failure, and
    /// [`SyncError::Datastore`] when the snapshot cannot be saved.
    pub async fn reconcile(&self, details: &EventDetails) -> Result<ReconcileOutcome, SyncError> {
        let body = self
            .evaluator
            .evaluate(details)
            .await
            .map_err(SyncError::Evaluation)?;
        let Some(body) = body else {
            tracing::debug!(sync_key = %details.event.uuid, "no calendar event needed");
            return Ok(ReconcileOutcome::NoEventNeeded);
        };

        let calendar = self.calendar.configure(&details.email).await?;
        let request_id = Uuid::new_v4().to_string();
        let update = calendar
            .get_and_update_event(&details.event, &body, &request_id)
            .await?;
        if !update.changed {
            return Ok(ReconcileOutcome::Unchanged);
        }

        self.events
            .save_event_snapshot(details.host_id, &update.event)
            .await?;
        tracing::info!(
            sync_key = %details.event.uuid,
            new_uuid = %update.event.uuid,
            host_id = details.host_id,
            "calendar event updated"
        );
        Ok(ReconcileOutcome::Updated)
    }

    /// Process one unit taken from the pending set.
    ///
    /// Tries the lock without queueing; a contended or reserved unit is
    /// skipped and stays queued. Otherwise the unit is removed from the
    /// pending set before any work, so a re-add that races with processing
    /// survives for the next pass. Any failure after that puts the unit back,
    /// so an outage never drops queued work.
    pub async fn process_queued(&self, key: &SyncKey) -> DrainStep {
        let step = match self.coordinator.acquire(key, false).await {
            Ok(Acquisition::Acquired(guard)) => {
                let step = self.process_locked(key).await;
                guard.release().await;
                step
            }
            Ok(Acquisition::Reserved | Acquisition::Contended) => DrainStep::Skipped,
            Err(e) => {
                tracing::error!(sync_key = %key, error = %e, "failed to acquire calendar lock, stopping drain");
                DrainStep::Halt
            }
        };
        self.audit.record(
            key,
            Actor::Drain,
            step.audit_action(),
            match step {
                DrainStep::Reconciled(outcome) => Some(format!("{outcome:?}")),
                _ => None,
            },
        );
        step
    }

    async fn process_locked(&self, key: &SyncKey) -> DrainStep {
        if let Err(e) = self.coordinator.remove_pending(key).await {
            // Still queued; nothing to restore.
            tracing::error!(sync_key = %key, error = %e, "failed to remove unit from pending set, stopping drain");
            return DrainStep::Halt;
        }

        match self.events.calendar_integration_enabled().await {
            Ok(true) => {}
            Ok(false) => return DrainStep::Resolved,
            Err(e) => return self.requeue_after(key, &e).await,
        }

        let details = match self.events.get_event_details_by_sync_key(key).await {
            Ok(details) => details,
            Err(e) if e.is_not_found() => {
                tracing::debug!(sync_key = %key, "queued unit no longer exists");
                return DrainStep::Resolved;
            }
            Err(e) => return self.requeue_after(key, &e).await,
        };

        match self.reconcile(&details).await {
            Ok(outcome) => DrainStep::Reconciled(outcome),
            Err(e) => self.requeue_after(key, &e).await,
        }
    }

    /// Put `key` back into the pending set after a failure and classify the
    /// failure for the drain loop.
    async fn requeue_after(&self, key: &SyncKey, error: &SyncError) -> DrainStep {
        if let Err(e) = self.coordinator.enqueue(key).await {
            tracing::error!(sync_key = %key, error = %e, "failed to re-queue calendar unit");
        }
        if error.trips_circuit_breaker() {
            tracing::error!(sync_key = %key, error = %error, "calendar sync failure, stopping drain");
            DrainStep::Halt
        } else {
            tracing::warn!(sync_key = %key, error = %error, "failed to reconcile queued unit");
            DrainStep::Failed
        }
    }
}
