//! Tests for utility types

use calendar_sync::util::serde::{CalendarEvent, EventDetails, SyncKey, WebhookStatus};
use calendar_sync::util::{init_tracing, now_ms, DEFAULT_LOG_FILTER};
use chrono::{TimeZone, Utc};

fn event(uuid: &str) -> CalendarEvent {
    let start = Utc.with_ymd_and_hms(2026, 3, 4, 15, 0, 0).unwrap();
    CalendarEvent {
        id: 9,
        uuid: uuid.to_string(),
        email: "user@example.com".to_string(),
        start_time: start,
        end_time: start + chrono::Duration::minutes(30),
        timezone: Some("America/Chicago".to_string()),
        data: serde_json::json!({ "etag": "\"3181161784712000\"" }),
        channel_id: Some("chan".to_string()),
    }
}

#[test]
fn test_event_sync_key() {
    assert_eq!(event("abc").sync_key(), SyncKey::new("abc"));
}

#[test]
fn test_webhook_status_defaults_to_none() {
    assert_eq!(WebhookStatus::default(), WebhookStatus::None);
    assert_eq!(
        serde_json::to_string(&WebhookStatus::Pending).unwrap(),
        "\"pending\""
    );
}

#[test]
fn test_event_details_json_shape() {
    let details = EventDetails {
        team_id: None,
        host_id: 3,
        email: "user@example.com".to_string(),
        event: event("abc"),
        webhook_status: WebhookStatus::Retry,
    };
    let json = serde_json::to_value(&details).unwrap();
    assert_eq!(json["event"]["uuid"], "abc");
    assert_eq!(json["event"]["start_time"], "2026-03-04T15:00:00Z");
    assert_eq!(json["webhook_status"], "retry");

    let back: EventDetails = serde_json::from_value(json).unwrap();
    assert_eq!(back, details);
}

#[test]
fn test_now_ms_is_monotonic_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(a > 0);
    assert!(b >= a);
}

#[test]
fn test_default_log_filter_parses() {
    assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    assert!(tracing::dispatcher::has_been_set());
}
