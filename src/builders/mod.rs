//! Builders wiring configuration and collaborators into a running service.

pub mod service_builder;

pub use service_builder::SyncServiceBuilder;
