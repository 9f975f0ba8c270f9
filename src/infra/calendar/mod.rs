//! Calendar provider backends.

pub mod memory;

pub use memory::InMemoryCalendar;
