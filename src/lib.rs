//! # Calendar Sync
//!
//! Distributed coordination for keeping a host's remediation calendar event
//! in sync with the fleet's live policy compliance state.
//!
//! Two actors mutate the same calendar event: push notifications from the
//! calendar provider (webhooks) and a periodic reconciler that walks all
//! hosts. This crate is the layer that keeps them from double-writing an
//! event, losing an update, or blocking a request thread on slow provider
//! calls.
//!
//! ## Pieces
//!
//! - **Lock & reservation coordinator** ([`core::LockCoordinator`]): per-unit
//!   locks with random tokens and TTLs in a shared [`core::LockStore`]. A
//!   reservation set by the periodic reconciler always wins.
//! - **Pending set**: an idempotent retry queue of units that could not be
//!   processed when their notification arrived.
//! - **Drain scheduler** ([`core::DrainScheduler`]): a process-wide
//!   single-flight gate and a detached task that empties the pending set,
//!   stopping on the first provider failure.
//! - **Webhook handler** ([`core::WebhookHandler`]): processes a notification
//!   inline when it wins the lock, queues it otherwise, then nudges the drain.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use calendar_sync::builders::SyncServiceBuilder;
//! use calendar_sync::config::SyncConfig;
//! use calendar_sync::runtime::TokioSpawner;
//!
//! let handler = SyncServiceBuilder::new(SyncConfig::from_env()?)
//!     .lock_store(lock_store)
//!     .event_store(event_store)
//!     .calendar(calendar)
//!     .evaluator(Arc::new(evaluator))
//!     .build(TokioSpawner::current()?)?;
//!
//! let outcome = handler.handle(sync_key, channel_id, state).await?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Coordination core: locks, pending set, drain scheduling, webhook handling.
pub mod core;
/// Configuration models for keys, TTLs and drain tuning.
pub mod config;
/// Builders wiring configuration and collaborators together.
pub mod builders;
/// Infrastructure adapters for the lock store, event store and calendar.
pub mod infra;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
