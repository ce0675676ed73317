//! # Switchyard Core
//!
//! Domain types, traits, and error definitions for the Switchyard agent
//! messaging runtime. This crate has **no runtime machinery**; it defines
//! the model that every other crate builds on.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (transport, generation backend, knowledge
//! store) is a trait here. Implementations live in their own crates. This
//! enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted stand-ins
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod identity;
pub mod event;
pub mod transport;
pub mod message;
pub mod skill;
pub mod provider;
pub mod memory;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use identity::AgentId;
pub use event::{Envelope, EnvelopeKind, Event};
pub use transport::{InProcessTransport, Transport};
pub use message::{ChatHistory, HistoryEntry, Role};
pub use skill::{Skill, SkillArguments, SkillLibrary, SkillSettings};
pub use provider::{Embedder, GenerationBackend};
pub use memory::{KnowledgeStore, MemoryEntry, MemoryQuery};
