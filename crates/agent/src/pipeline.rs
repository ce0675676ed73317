//! Generation pipeline: retrieve, then invoke.
//!
//! # Flow
//!
//! 1. Append the ask to the instance's chat history; the rendered history
//!    becomes the `input` argument
//! 2. Retrieve passages for a knowledge tag and splice them into the
//!    instruction at its `!tag!` placeholder
//! 3. Invoke the named skill on the generation backend
//! 4. Append the generated text to the history
//!
//! Failures in steps 2 and 3 never reach the caller. A retrieval failure
//! counts as "no passages"; a generation failure yields an empty string,
//! which callers must read as "nothing produced". Nothing is retried.

use std::sync::Arc;
use switchyard_config::MemoryConfig;
use switchyard_core::error::{GenerationError, RetrievalError};
use switchyard_core::memory::{KnowledgeStore, MemoryEntry, MemoryQuery};
use switchyard_core::message::{ChatHistory, Role};
use switchyard_core::provider::GenerationBackend;
use switchyard_core::skill::SkillArguments;
use tracing::{debug, error, info, warn};

/// The argument key holding the rendered chat history.
pub const INPUT: &str = "input";

/// Retrieve-then-invoke helper shared by AI-backed agents.
#[derive(Clone)]
pub struct GenerationPipeline {
    backend: Arc<dyn GenerationBackend>,
    memory: Option<Arc<dyn KnowledgeStore>>,
    retrieval_limit: usize,
    min_relevance: f32,
}

impl GenerationPipeline {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        let defaults = MemoryConfig::default();
        Self {
            backend,
            memory: None,
            retrieval_limit: defaults.retrieval_limit,
            min_relevance: defaults.min_relevance,
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn KnowledgeStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Apply the `[memory]` retrieval settings.
    pub fn with_memory_config(mut self, config: &MemoryConfig) -> Self {
        self.retrieval_limit = config.retrieval_limit.max(1);
        self.min_relevance = config.min_relevance;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Record `ask` as a user turn and build the skill arguments from the
    /// whole conversation so far.
    pub fn append_history(history: &mut ChatHistory, ask: &str) -> SkillArguments {
        history.push(Role::User, ask);
        SkillArguments::with_input(history.render())
    }

    /// Passages for `tag` relevant to `query`. Without a store there is
    /// nothing to find.
    pub async fn retrieve(&self, tag: &str, query: &str) -> Result<Vec<MemoryEntry>, RetrievalError> {
        let Some(memory) = &self.memory else {
            return Ok(Vec::new());
        };
        let query = MemoryQuery::new(tag, query)
            .with_limit(self.retrieval_limit)
            .with_min_score(self.min_relevance);
        memory.retrieve(query).await
    }

    /// Fill `instruction`'s `!tag!` placeholder with passages retrieved for
    /// the current input and store the result as `args[tag]`.
    ///
    /// The placeholder is removed when nothing is found or retrieval fails.
    pub async fn add_knowledge(
        &self,
        instruction: &str,
        tag: &str,
        mut args: SkillArguments,
    ) -> SkillArguments {
        let query = args.get(INPUT).unwrap_or_default().to_string();

        let passages = match self.retrieve(tag, &query).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(tag, error = %e, "Knowledge retrieval failed, continuing without passages");
                Vec::new()
            }
        };
        debug!(tag, passages = passages.len(), "Knowledge retrieved");

        let knowledge = passages
            .iter()
            .map(|entry| entry.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        args.insert(tag, splice(instruction, tag, &knowledge));
        args
    }

    /// Invoke `skill` on the backend.
    pub async fn call_function(
        &self,
        skill: &str,
        args: &SkillArguments,
    ) -> Result<String, GenerationError> {
        self.backend.invoke(skill, args).await
    }

    /// Run the whole pipeline for one ask. Returns the generated text, or an
    /// empty string if generation failed.
    pub async fn generate(
        &self,
        history: &mut ChatHistory,
        ask: &str,
        skill: &str,
        instruction: &str,
        tag: &str,
    ) -> String {
        let args = Self::append_history(history, ask);
        let args = self.add_knowledge(instruction, tag, args).await;

        match self.call_function(skill, &args).await {
            Ok(text) => {
                info!(
                    skill,
                    backend = self.backend.name(),
                    chars = text.len(),
                    "Generation complete"
                );
                if !text.is_empty() {
                    history.push(Role::Assistant, text.as_str());
                }
                text
            }
            Err(e) => {
                error!(skill, backend = self.backend.name(), error = %e, "Generation failed");
                String::new()
            }
        }
    }
}

/// Replace `!tag!` in `instruction` with `knowledge`.
fn splice(instruction: &str, tag: &str, knowledge: &str) -> String {
    instruction.replace(&format!("!{tag}!"), knowledge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingStore, ScriptedBackend, StaticStore};

    const INSTRUCTION: &str = "Consider the following architectural guidelines:!waf!";

    #[test]
    fn append_history_renders_conversation() {
        let mut history = ChatHistory::new();
        GenerationPipeline::append_history(&mut history, "first ask");
        let args = GenerationPipeline::append_history(&mut history, "second ask");

        assert_eq!(history.len(), 2);
        assert_eq!(args.get(INPUT), Some("user: first ask\nuser: second ask"));
    }

    #[test]
    fn splice_replaces_or_removes_placeholder() {
        assert_eq!(
            splice(INSTRUCTION, "waf", "Use managed identities"),
            "Consider the following architectural guidelines:Use managed identities"
        );
        assert_eq!(splice(INSTRUCTION, "waf", ""), "Consider the following architectural guidelines:");
        assert_eq!(splice("no placeholder", "waf", "x"), "no placeholder");
    }

    #[tokio::test]
    async fn add_knowledge_splices_passages() {
        let store = StaticStore::new(vec!["Encrypt data at rest", "Prefer managed services"]);
        let pipeline = GenerationPipeline::new(Arc::new(ScriptedBackend::text("unused")))
            .with_memory(Arc::new(store));

        let args = pipeline
            .add_knowledge(INSTRUCTION, "waf", SkillArguments::with_input("build a CLI"))
            .await;

        assert_eq!(
            args.get("waf"),
            Some("Consider the following architectural guidelines:Encrypt data at rest\nPrefer managed services")
        );
        assert_eq!(args.get(INPUT), Some("build a CLI"));
    }

    #[tokio::test]
    async fn add_knowledge_without_store_removes_placeholder() {
        let pipeline = GenerationPipeline::new(Arc::new(ScriptedBackend::text("unused")));
        let args = pipeline
            .add_knowledge(INSTRUCTION, "waf", SkillArguments::with_input("x"))
            .await;
        assert_eq!(args.get("waf"), Some("Consider the following architectural guidelines:"));
    }

    #[tokio::test]
    async fn retrieval_failure_does_not_block_generation() {
        let backend = Arc::new(ScriptedBackend::text("# Readme"));
        let pipeline = GenerationPipeline::new(backend.clone()).with_memory(Arc::new(FailingStore));

        let mut history = ChatHistory::new();
        let text = pipeline
            .generate(&mut history, "build a CLI", "pm.readme", INSTRUCTION, "waf")
            .await;

        assert_eq!(text, "# Readme");
        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.get("waf"), Some("Consider the following architectural guidelines:"));
    }

    #[tokio::test]
    async fn generation_failure_degrades_to_empty() {
        let pipeline = GenerationPipeline::new(Arc::new(ScriptedBackend::failing(
            GenerationError::RateLimited { retry_after_secs: 5 },
        )));

        let mut history = ChatHistory::new();
        let text = pipeline
            .generate(&mut history, "build a CLI", "pm.readme", INSTRUCTION, "waf")
            .await;

        assert!(text.is_empty());
        // The ask is still recorded; nothing was generated.
        assert_eq!(history.len(), 1);
        assert!(history.last_by(Role::Assistant).is_none());
    }

    #[tokio::test]
    async fn successful_generation_extends_history() {
        let pipeline = GenerationPipeline::new(Arc::new(ScriptedBackend::text("# CLI Tool")));
        let mut history = ChatHistory::new();
        pipeline
            .generate(&mut history, "build a CLI", "pm.readme", INSTRUCTION, "waf")
            .await;

        assert_eq!(history.len(), 2);
        assert_eq!(history.last_by(Role::Assistant).map(|e| e.content.as_str()), Some("# CLI Tool"));
    }

    #[tokio::test]
    async fn memory_config_applies_limits() {
        let store = Arc::new(StaticStore::new(vec!["a", "b", "c"]));
        let config = MemoryConfig {
            retrieval_limit: 1,
            ..Default::default()
        };
        let pipeline = GenerationPipeline::new(Arc::new(ScriptedBackend::text("x")))
            .with_memory(store.clone())
            .with_memory_config(&config);

        let found = pipeline.retrieve("waf", "anything").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(store.last_query().map(|q| q.limit), Some(1));
    }
}
