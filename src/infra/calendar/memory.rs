//! In-memory calendar provider.
//!
//! Keeps one body per event UUID and reports a change whenever the requested
//! body differs from the stored one. Failure injection lets tests simulate a
//! provider outage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::core::{CalendarProvider, EventUpdate, SyncError, UserCalendar};
use crate::util::serde::CalendarEvent;

#[derive(Default)]
struct Shared {
    bodies: Mutex<HashMap<String, String>>,
    request_ids: Mutex<Vec<String>>,
    calls: AtomicUsize,
    failing: AtomicBool,
    recreate: AtomicBool,
}

/// Provider double backed by a map of event UUID to body.
#[derive(Clone, Default)]
pub struct InMemoryCalendar {
    shared: Arc<Shared>,
}

impl InMemoryCalendar {
    /// Create an empty calendar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`SyncError::Provider`].
    pub fn set_failing(&self, failing: bool) {
        self.shared.failing.store(failing, Ordering::Release);
    }

    /// Make every subsequent update recreate the event under a new UUID.
    pub fn set_recreate(&self, recreate: bool) {
        self.shared.recreate.store(recreate, Ordering::Release);
    }

    /// Number of get-and-update calls received.
    pub fn call_count(&self) -> usize {
        self.shared.calls.load(Ordering::Acquire)
    }

    /// Body currently stored for `uuid`.
    pub fn body(&self, uuid: &str) -> Option<String> {
        self.shared.bodies.lock().get(uuid).cloned()
    }

    /// Request ids seen so far, in call order.
    pub fn request_ids(&self) -> Vec<String> {
        self.shared.request_ids.lock().clone()
    }
}

#[async_trait]
impl CalendarProvider for InMemoryCalendar {
    async fn configure(&self, email: &str) -> Result<Arc<dyn UserCalendar>, SyncError> {
        if email.is_empty() {
            return Err(SyncError::Provider("no calendar owner email".into()));
        }
        Ok(Arc::new(UserView {
            email: email.to_string(),
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct UserView {
    email: String,
    shared: Arc<Shared>,
}

#[async_trait]
impl UserCalendar for UserView {
    async fn get_and_update_event(
        &self,
        existing: &CalendarEvent,
        body: &str,
        request_id: &str,
    ) -> Result<EventUpdate, SyncError> {
        self.shared.calls.fetch_add(1, Ordering::AcqRel);
        self.shared.request_ids.lock().push(request_id.to_string());
        if self.shared.failing.load(Ordering::Acquire) {
            return Err(SyncError::Provider("calendar API unavailable".into()));
        }

        let mut bodies = self.shared.bodies.lock();
        if bodies.get(&existing.uuid).map(String::as_str) == Some(body) {
            return Ok(EventUpdate {
                event: existing.clone(),
                changed: false,
            });
        }

        let mut event = existing.clone();
        event.email.clone_from(&self.email);
        if self.shared.recreate.load(Ordering::Acquire) {
            bodies.remove(&existing.uuid);
            event.uuid = Uuid::new_v4().to_string();
        }
        event.data = serde_json::json!({ "body": body, "request_id": request_id });
        bodies.insert(event.uuid.clone(), body.to_string());
        drop(bodies);
        Ok(EventUpdate {
            event,
            changed: true,
        })
    }
}
