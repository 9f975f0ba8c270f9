//! In-memory event store for development and testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::core::{EventStore, SyncError};
use crate::util::serde::{CalendarEvent, EventDetails, SyncKey, WebhookStatus};

/// Event details indexed by sync key (the event UUID).
pub struct InMemoryEventStore {
    events: RwLock<HashMap<SyncKey, EventDetails>>,
    enabled: AtomicBool,
    lookups: AtomicUsize,
    saves: AtomicUsize,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
            enabled: AtomicBool::new(true),
            lookups: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }
}

impl InMemoryEventStore {
    /// Create an empty store with the integration enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a unit.
    pub fn insert(&self, details: EventDetails) {
        self.events.write().insert(details.event.sync_key(), details);
    }

    /// Delete a unit.
    pub fn remove(&self, key: &SyncKey) -> Option<EventDetails> {
        self.events.write().remove(key)
    }

    /// Current state of a unit.
    pub fn get(&self, key: &SyncKey) -> Option<EventDetails> {
        self.events.read().get(key).cloned()
    }

    /// Toggle the calendar integration.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Number of detail lookups served.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Acquire)
    }

    /// Number of snapshots saved.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Acquire)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn calendar_integration_enabled(&self) -> Result<bool, SyncError> {
        Ok(self.enabled.load(Ordering::Acquire))
    }

    async fn get_event_details_by_sync_key(
        &self,
        key: &SyncKey,
    ) -> Result<EventDetails, SyncError> {
        self.lookups.fetch_add(1, Ordering::AcqRel);
        self.get(key)
            .ok_or_else(|| SyncError::NotFound(format!("calendar event {key}")))
    }

    async fn save_event_snapshot(
        &self,
        host_id: u32,
        event: &CalendarEvent,
    ) -> Result<(), SyncError> {
        let mut events = self.events.write();
        let previous = events
            .iter()
            .find(|(_, d)| d.event.id == event.id && d.host_id == host_id)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| SyncError::NotFound(format!("calendar event row {}", event.id)))?;
        let Some(mut details) = events.remove(&previous) else {
            return Err(SyncError::NotFound(format!("calendar event {previous}")));
        };
        details.email.clone_from(&event.email);
        details.event = event.clone();
        details.webhook_status = WebhookStatus::None;
        // Recreated events come back under a new UUID, which re-keys the unit.
        events.insert(event.sync_key(), details);
        drop(events);
        self.saves.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
