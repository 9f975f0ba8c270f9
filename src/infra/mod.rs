//! Infrastructure adapters for the lock store, persistent store and calendar
//! provider.

pub mod calendar;
pub mod event_store;
pub mod lock_store;

pub use calendar::InMemoryCalendar;
pub use event_store::InMemoryEventStore;
pub use lock_store::InMemoryLockStore;
