//! Configuration models for lock keys, TTLs and drain tuning.

pub mod sync;

pub use sync::SyncConfig;
