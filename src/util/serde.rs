//! Serializable domain types shared across the coordinator, stores and API.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of one synchronization unit: the provider-side UUID of a host's
/// recurring reminder event. Stable for the life of the event relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncKey(String);

impl SyncKey {
    /// Wrap a raw identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SyncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SyncKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for SyncKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl AsRef<str> for SyncKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resource state announced by a calendar push notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// Channel handshake sent once when a watch channel is opened.
    Sync,
    /// The watched resource changed.
    Exists,
    /// The watched resource was deleted.
    NotExists,
    /// Any state this service does not know about.
    Other(String),
}

impl ResourceState {
    /// Parse the raw header value. Unknown values are kept verbatim.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sync" => Self::Sync,
            "exists" => Self::Exists,
            "not_exists" => Self::NotExists,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Whether this notification is a handshake/sync ping rather than a change.
    pub const fn is_handshake(&self) -> bool {
        matches!(self, Self::Sync)
    }
}

impl From<&str> for ResourceState {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// Progress of the "policy remediation" webhook fired while an event is
/// happening.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    /// Neutral baseline; nothing is awaiting delivery.
    #[default]
    None,
    /// Waiting for the host to report fresh policy results.
    Pending,
    /// Webhook delivered.
    Sent,
    /// Delivery failed permanently.
    Error,
    /// Delivery failed and will be retried.
    Retry,
}

/// Last-known provider-side snapshot of a calendar event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Row identifier in the persistent store.
    pub id: u32,
    /// Provider-side event UUID (the unit's [`SyncKey`]).
    pub uuid: String,
    /// Calendar owner.
    pub email: String,
    /// Scheduled start.
    pub start_time: DateTime<Utc>,
    /// Scheduled end.
    pub end_time: DateTime<Utc>,
    /// IANA timezone of the owner's calendar, if known.
    pub timezone: Option<String>,
    /// Opaque provider data (etag, body tag, watch resource id, ...).
    pub data: serde_json::Value,
    /// Watch channel identifier; inbound notifications must present it.
    pub channel_id: Option<String>,
}

impl CalendarEvent {
    /// Synchronization key of this event.
    pub fn sync_key(&self) -> SyncKey {
        SyncKey::new(self.uuid.clone())
    }
}

/// Everything the reconciliation path needs about one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    /// Owning team, if the host belongs to one.
    pub team_id: Option<u32>,
    /// Host the reminder is about.
    pub host_id: u32,
    /// Email of the host's end user.
    pub email: String,
    /// Current event snapshot.
    pub event: CalendarEvent,
    /// Remediation webhook progress for the host.
    pub webhook_status: WebhookStatus,
}
