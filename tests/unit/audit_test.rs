//! Tests for audit sink

use std::sync::Arc;

use calendar_sync::core::{
    build_audit_event, Actor, AuditAction, AuditSink, AuditTrail, InMemoryAuditSink,
};
use calendar_sync::util::serde::SyncKey;
use parking_lot::Mutex;

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    let key = SyncKey::new("evt1");

    sink.record(build_audit_event(
        &key,
        Actor::Webhook,
        AuditAction::Processed,
        Some("Updated".to_string()),
    ));

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].sync_key, key);
    assert_eq!(events[0].actor, Actor::Webhook);
    assert_eq!(events[0].action, AuditAction::Processed);
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);

    for uuid in ["evt1", "evt2", "evt3"] {
        sink.record(build_audit_event(
            &SyncKey::new(uuid),
            Actor::Drain,
            AuditAction::Skipped,
            None,
        ));
    }

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].sync_key.as_str(), "evt2");
    assert_eq!(events[1].sync_key.as_str(), "evt3");
}

#[test]
fn test_build_audit_event() {
    let event = build_audit_event(
        &SyncKey::new("evt1"),
        Actor::Drain,
        AuditAction::CircuitBroken,
        Some("calendar provider error: 503".to_string()),
    );

    assert!(event.event_id.starts_with("evt1-circuit_broken-"));
    assert_eq!(event.detail.as_deref(), Some("calendar provider error: 503"));
    assert!(event.created_at_ms > 0);
}

#[test]
fn test_disabled_trail_records_nothing() {
    let sink = Arc::new(Mutex::new(InMemoryAuditSink::new(4)));
    AuditTrail::disabled().record(&SyncKey::new("a"), Actor::Webhook, AuditAction::Queued, None);
    assert!(sink.lock().events().is_empty());

    let trail = AuditTrail::new(sink.clone());
    trail.record(&SyncKey::new("a"), Actor::Webhook, AuditAction::Queued, None);
    assert_eq!(sink.lock().events().len(), 1);
}
