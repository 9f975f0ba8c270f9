//! Request/response models for the webhook endpoint.
//!
//! The HTTP transport maps [`crate::core::SyncError::Unauthorized`] and other
//! errors to status codes; these models only carry the notification fields.

use serde::{Deserialize, Serialize};

use crate::core::{DrainGate, Spawn, SyncError, WebhookHandler, WebhookOutcome};
use crate::util::serde::{ResourceState, SyncKey};

/// Header carrying the watch channel id.
pub const HEADER_CHANNEL_ID: &str = "x-goog-channel-id";
/// Header carrying the resource state.
pub const HEADER_RESOURCE_STATE: &str = "x-goog-resource-state";

/// One push notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookNotification {
    /// Unit the notification is about (taken from the callback URL).
    pub sync_key: SyncKey,
    /// Channel id presented by the caller.
    pub channel_id: String,
    /// Raw resource state.
    pub resource_state: String,
}

impl WebhookNotification {
    /// Build a notification from request headers (names compared
    /// case-insensitively).
    ///
    /// # Errors
    ///
    /// [`SyncError::Unauthorized`] when the channel id header is missing.
    pub fn from_headers<'a, I>(sync_key: SyncKey, headers: I) -> Result<Self, SyncError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut channel_id = None;
        let mut resource_state = String::new();
        for (name, value) in headers {
            if name.eq_ignore_ascii_case(HEADER_CHANNEL_ID) {
                channel_id = Some(value.trim().to_string());
            } else if name.eq_ignore_ascii_case(HEADER_RESOURCE_STATE) {
                resource_state = value.trim().to_string();
            }
        }
        let channel_id = channel_id
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SyncError::Unauthorized("missing channel id".into()))?;
        Ok(Self {
            sync_key,
            channel_id,
            resource_state,
        })
    }
}

/// Reply body for a handled notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookReply {
    /// Unit the notification was about.
    pub sync_key: SyncKey,
    /// Short outcome label.
    pub outcome: String,
}

/// Handle a parsed notification.
///
/// # Errors
///
/// Propagates the handler's authorization and internal errors.
pub async fn handle_notification<S>(
    handler: &WebhookHandler<S>,
    req: WebhookNotification,
) -> Result<WebhookReply, SyncError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let state = ResourceState::parse(&req.resource_state);
    let outcome = handler
        .handle(req.sync_key.clone(), req.channel_id, state)
        .await?;
    Ok(WebhookReply {
        sync_key: req.sync_key,
        outcome: outcome_label(outcome).to_string(),
    })
}

const fn outcome_label(outcome: WebhookOutcome) -> &'static str {
    match outcome {
        WebhookOutcome::Ignored => "ignored",
        WebhookOutcome::Disabled => "disabled",
        WebhookOutcome::Queued => "queued",
        WebhookOutcome::Deferred => "deferred",
        WebhookOutcome::Resolved => "resolved",
        WebhookOutcome::Processed(_) => "processed",
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Whether this instance is draining the pending set.
    pub draining: bool,
}

/// Return a health payload.
pub fn health(gate: &dyn DrainGate) -> Health {
    Health {
        ok: true,
        draining: gate.is_draining(),
    }
}
