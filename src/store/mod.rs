//! Storage backends that need no external service

pub mod memory;

pub use memory::MemoryStore;
