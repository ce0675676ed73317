//! Knowledge store implementations for Switchyard.

pub mod noop;
pub mod in_memory;
pub mod qdrant;

pub use noop::NoopStore;
pub use in_memory::InMemoryStore;
pub use qdrant::QdrantStore;
