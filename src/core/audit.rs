//! Audit trail of coordination decisions.
//!
//! Every webhook and drain decision can be recorded so operators can answer
//! "who touched this event, and why did it wait".

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::util::clock::now_ms;
use crate::util::serde::SyncKey;

/// Which actor made the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// Inbound push notification.
    Webhook,
    /// Background drain task.
    Drain,
}

/// What happened to the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// Reconciled while holding the lock.
    Processed,
    /// Added to the pending set because the lock was held elsewhere.
    Queued,
    /// Left to the periodic reconciler because of a reservation.
    Deferred,
    /// Skipped by the drain because another actor owns it.
    Skipped,
    /// Unit vanished since it was queued.
    Stale,
    /// Drain aborted on this unit after a provider failure.
    CircuitBroken,
    /// Channel id did not match.
    Rejected,
    /// Reconciliation failed.
    Failed,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Processed => "processed",
            Self::Queued => "queued",
            Self::Deferred => "deferred",
            Self::Skipped => "skipped",
            Self::Stale => "stale",
            Self::CircuitBroken => "circuit_broken",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Audit event structure.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Unit the decision is about.
    pub sync_key: SyncKey,
    /// Deciding actor.
    pub actor: Actor,
    /// Decision taken.
    pub action: AuditAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context (error text, outcome).
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Helper to build an audit event stamped with the current time.
pub fn build_audit_event(
    sync_key: &SyncKey,
    actor: Actor,
    action: AuditAction,
    detail: Option<String>,
) -> AuditEvent {
    let created_at_ms = now_ms();
    AuditEvent {
        event_id: format!("{sync_key}-{action}-{created_at_ms}"),
        sync_key: sync_key.clone(),
        actor,
        action,
        created_at_ms,
        detail,
    }
}

/// Audit sink shared between the webhook path and the drain task.
pub type SharedAuditSink = Arc<Mutex<dyn AuditSink>>;

/// Optional audit sink; recording is a no-op when none is attached.
#[derive(Clone, Default)]
pub struct AuditTrail {
    sink: Option<SharedAuditSink>,
}

impl AuditTrail {
    /// Trail writing into `sink`.
    pub fn new(sink: SharedAuditSink) -> Self {
        Self { sink: Some(sink) }
    }

    /// Trail that records nothing.
    pub const fn disabled() -> Self {
        Self { sink: None }
    }

    /// Record one decision.
    pub fn record(
        &self,
        sync_key: &SyncKey,
        actor: Actor,
        action: AuditAction,
        detail: Option<String>,
    ) {
        if let Some(sink) = &self.sink {
            sink.lock()
                .record(build_audit_event(sync_key, actor, action, detail));
        }
    }
}
