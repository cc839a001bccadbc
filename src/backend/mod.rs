//! Storage backend implementations.
//!
//! - [`MemoryBackend`] - in-memory container, optionally persisted as JSON

mod memory;

pub use memory::{FormatOptions, MemoryBackend};
