//! Runtime adapters and the webhook API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{
    handle_notification, health, Health, WebhookNotification, WebhookReply, HEADER_CHANNEL_ID,
    HEADER_RESOURCE_STATE,
};
pub use tokio_spawner::TokioSpawner;
