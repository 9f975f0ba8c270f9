//! Lock store backends.

pub mod memory;

pub use memory::InMemoryLockStore;
