//! Collaborator interfaces consumed by the sync core.
//!
//! The lock store, persistent store, calendar provider and policy evaluator
//! are all owned elsewhere; the core only talks to them through these traits
//! and shares them as `Arc<dyn _>` between the webhook path and the drain task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::{AppResult, SyncError};
use crate::util::serde::{CalendarEvent, EventDetails, SyncKey};

/// Fleet-wide key/value store with TTLs and set collections.
///
/// Every method must be atomic in the backing store: the coordinator relies on
/// `acquire_lock` being a conditional set and `release_lock` a
/// compare-and-delete.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Read a plain key.
    async fn get(&self, key: &str) -> Result<Option<String>, SyncError>;

    /// Set `key` to `value` with `ttl` only if it does not exist yet.
    async fn acquire_lock(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, SyncError>;

    /// Delete `key` only if it still holds `value`.
    async fn release_lock(&self, key: &str, value: &str) -> Result<bool, SyncError>;

    /// Add `member` to the set at `key`. Adding an existing member is a no-op.
    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), SyncError>;

    /// Remove `member` from the set at `key`.
    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), SyncError>;

    /// List the members of the set at `key`.
    async fn get_set(&self, key: &str) -> Result<Vec<String>, SyncError>;
}

/// Persistent store for host, team and calendar event metadata.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Whether the calendar integration is enabled at all.
    async fn calendar_integration_enabled(&self) -> Result<bool, SyncError>;

    /// Load the unit identified by `key`. Returns [`SyncError::NotFound`] when
    /// the event was deleted or recreated under another UUID.
    async fn get_event_details_by_sync_key(&self, key: &SyncKey)
        -> Result<EventDetails, SyncError>;

    /// Persist a new provider snapshot for the event row `event.id` and reset
    /// the host's webhook status to [`crate::util::serde::WebhookStatus::None`].
    async fn save_event_snapshot(&self, host_id: u32, event: &CalendarEvent)
        -> Result<(), SyncError>;
}

/// Result of a provider get-and-update call.
#[derive(Debug, Clone)]
pub struct EventUpdate {
    /// Event as the provider now has it.
    pub event: CalendarEvent,
    /// Whether anything about the event changed.
    pub changed: bool,
}

/// Calendar provider client factory.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Bind a client to one user's calendar.
    async fn configure(&self, email: &str) -> Result<Arc<dyn UserCalendar>, SyncError>;
}

/// Calendar client bound to a single user.
#[async_trait]
pub trait UserCalendar: Send + Sync {
    /// Fetch `existing` from the provider, recreating or rewriting it so that
    /// it carries `body`. `request_id` makes the call idempotent provider-side.
    async fn get_and_update_event(
        &self,
        existing: &CalendarEvent,
        body: &str,
        request_id: &str,
    ) -> Result<EventUpdate, SyncError>;
}

/// Business callback deciding what the event should say.
///
/// Returns `Some(body)` when the host should have a remediation event and
/// `None` when no event is needed.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Compute the desired event body for `details`.
    async fn evaluate(&self, details: &EventDetails) -> AppResult<Option<String>>;
}

#[async_trait]
impl<F> PolicyEvaluator for F
where
    F: Fn(&EventDetails) -> AppResult<Option<String>> + Send + Sync,
{
    async fn evaluate(&self, details: &EventDetails) -> AppResult<Option<String>> {
        self(details)
    }
}
