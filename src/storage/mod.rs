//! Storage backends implementing [`crate::core::DocumentStore`]

pub mod in_memory;

pub use in_memory::InMemoryStore;
