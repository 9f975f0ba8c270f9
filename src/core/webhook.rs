//! Webhook reconciliation handler: entry point for calendar push
//! notifications.

use crate::core::audit::{Actor, AuditAction};
use crate::core::drain::DrainScheduler;
use crate::core::reconcile::{ReconcileOutcome, Reconciler};
use crate::core::spawn::spawn_outliving;
use crate::core::{Acquisition, Spawn, SyncError};
use crate::util::serde::{EventDetails, ResourceState, SyncKey};

/// What the handler did with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Channel handshake; nothing to do.
    Ignored,
    /// Calendar integration is disabled.
    Disabled,
    /// Another actor holds the unit; it was added to the pending set.
    Queued,
    /// The periodic reconciler reserved the unit; left queued for it.
    Deferred,
    /// The unit no longer exists.
    Resolved,
    /// Reconciled inline.
    Processed(ReconcileOutcome),
}

/// Check the caller-supplied channel id against the one stored with the
/// event. The channel id is the shared secret authenticating the call.
///
/// # Errors
///
/// [`SyncError::Unauthorized`] on mismatch, or when the event has no channel.
pub fn verify_channel(details: &EventDetails, channel_id: &str) -> Result<(), SyncError> {
    match details.event.channel_id.as_deref() {
        Some(expected) if !expected.is_empty() && expected == channel_id => Ok(()),
        _ => Err(SyncError::Unauthorized(format!(
            "channel id mismatch for calendar event {}",
            details.event.uuid
        ))),
    }
}

/// Handles push notifications without blocking on slow provider calls more
/// than the inline unit requires, and kicks off background drains.
pub struct WebhookHandler<S> {
    scheduler: DrainScheduler<S>,
    spawner: S,
}

impl<S> WebhookHandler<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a handler. `spawner` runs the inline work so that it survives
    /// the request future being dropped.
    pub const fn new(scheduler: DrainScheduler<S>, spawner: S) -> Self {
        Self { scheduler, spawner }
    }

    /// Drain scheduler shared with this handler.
    pub const fn scheduler(&self) -> &DrainScheduler<S> {
        &self.scheduler
    }

    /// Handle one notification for `sync_key`.
    ///
    /// Returns success for every outcome except an authorization failure or a
    /// non-recoverable internal error. Inline processing runs on a detached
    /// task, so a client disconnect does not abort provider or store writes.
    ///
    /// # Errors
    ///
    /// [`SyncError::Unauthorized`] on channel mismatch; lock store, datastore,
    /// evaluator and provider errors from the inline path.
    #[tracing::instrument(skip_all, fields(sync_key = %sync_key))]
    pub async fn handle(
        &self,
        sync_key: SyncKey,
        channel_id: String,
        resource_state: ResourceState,
    ) -> Result<WebhookOutcome, SyncError> {
        if resource_state.is_handshake() {
            tracing::debug!("calendar channel handshake");
            return Ok(WebhookOutcome::Ignored);
        }

        let scheduler = self.scheduler.clone();
        let rx = spawn_outliving(&self.spawner, async move {
            handle_detached(&scheduler, &sync_key, &channel_id).await
        });
        rx.await
            .map_err(|_| SyncError::Internal("webhook task ended without a result".into()))?
    }
}

async fn handle_detached<S>(
    scheduler: &DrainScheduler<S>,
    key: &SyncKey,
    channel_id: &str,
) -> Result<WebhookOutcome, SyncError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let reconciler = scheduler.reconciler();
    if !reconciler.events().calendar_integration_enabled().await? {
        return Ok(WebhookOutcome::Disabled);
    }

    let outcome = match reconciler.coordinator().acquire(key, true).await? {
        Acquisition::Contended => {
            // The holder re-checks the pending set when it finishes.
            reconciler
                .audit()
                .record(key, Actor::Webhook, AuditAction::Queued, None);
            return Ok(WebhookOutcome::Queued);
        }
        Acquisition::Reserved => match load_authorized(reconciler, key, channel_id).await {
            Ok(_) => {
                reconciler
                    .audit()
                    .record(key, Actor::Webhook, AuditAction::Deferred, None);
                Ok(WebhookOutcome::Deferred)
            }
            Err(e) if e.is_not_found() => Ok(WebhookOutcome::Resolved),
            Err(e) => Err(e),
        },
        Acquisition::Acquired(guard) => {
            let result = process_inline(reconciler, key, channel_id).await;
            guard.release().await;
            result
        }
    };

    let rejected = matches!(outcome, Err(SyncError::Unauthorized(_)));
    match &outcome {
        Ok(WebhookOutcome::Processed(result)) => reconciler.audit().record(
            key,
            Actor::Webhook,
            AuditAction::Processed,
            Some(format!("{result:?}")),
        ),
        Err(e) if rejected => {
            tracing::warn!(error = %e, "rejected calendar webhook");
            reconciler.audit().record(
                key,
                Actor::Webhook,
                AuditAction::Rejected,
                Some(e.to_string()),
            );
        }
        Err(e) => reconciler.audit().record(
            key,
            Actor::Webhook,
            AuditAction::Failed,
            Some(e.to_string()),
        ),
        Ok(_) => {}
    }

    // An unauthenticated caller must not be able to trigger background work.
    if !rejected {
        scheduler.maybe_start().await;
    }
    outcome
}

async fn process_inline(
    reconciler: &Reconciler,
    key: &SyncKey,
    channel_id: &str,
) -> Result<WebhookOutcome, SyncError> {
    let details = match load_authorized(reconciler, key, channel_id).await {
        Ok(details) => details,
        Err(e) if e.is_not_found() => {
            clear_pending(reconciler, key).await;
            return Ok(WebhookOutcome::Resolved);
        }
        Err(e) => return Err(e),
    };

    // This request satisfies any retry queued for the unit so far.
    clear_pending(reconciler, key).await;
    let outcome = reconciler.reconcile(&details).await?;
    Ok(WebhookOutcome::Processed(outcome))
}

async fn load_authorized(
    reconciler: &Reconciler,
    key: &SyncKey,
    channel_id: &str,
) -> Result<EventDetails, SyncError> {
    let details = reconciler.events().get_event_details_by_sync_key(key).await?;
    verify_channel(&details, channel_id)?;
    Ok(details)
}

async fn clear_pending(reconciler: &Reconciler, key: &SyncKey) {
    if let Err(e) = reconciler.coordinator().remove_pending(key).await {
        tracing::warn!(sync_key = %key, error = %e, "failed to remove unit from pending set");
    }
}
