//! Generation backend traits: the abstraction over completion services.
//!
//! A backend executes a named skill with a set of arguments and returns the
//! generated text. Agents never talk to a backend directly; they go through
//! the generation pipeline, which owns the degrade-to-empty policy.
//!
//! Implementations: OpenAI-compatible endpoints (including Azure OpenAI).

use async_trait::async_trait;
use crate::error::GenerationError;
use crate::skill::SkillArguments;

/// The core GenerationBackend trait.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai", "azure").
    fn name(&self) -> &str;

    /// Invoke `skill` with `args` and return the generated text.
    async fn invoke(
        &self,
        skill: &str,
        args: &SkillArguments,
    ) -> std::result::Result<String, GenerationError>;

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, GenerationError> {
        Ok(true)
    }
}

/// Text embedding, used by vector memory stores.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed each input, returning one vector per input in order.
    async fn embed(&self, inputs: &[String]) -> std::result::Result<Vec<Vec<f32>>, GenerationError>;
}
