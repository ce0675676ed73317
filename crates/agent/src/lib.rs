//! AI-backed agents for Switchyard.
//!
//! Agents here are plain [`Agent`](switchyard_runtime::Agent)
//! implementations that own their state and compose a
//! [`GenerationPipeline`] for the retrieve-then-invoke step:
//!
//! 1. **Receive** an envelope from the worker runtime
//! 2. **Augment** the ask with chat history and retrieved knowledge
//! 3. **Invoke** a skill on the generation backend
//! 4. **Publish** the result, or answer the request it came in on

pub mod devteam;
pub mod pipeline;

pub use devteam::ProductManager;
pub use pipeline::GenerationPipeline;

#[cfg(test)]
pub(crate) mod test_helpers;
