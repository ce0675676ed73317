//! Wiring shared by the commands: backend, knowledge store, pipeline and
//! worker runtime built from configuration.

use async_trait::async_trait;
use std::sync::Arc;
use switchyard_agent::devteam::{self, ProductManager};
use switchyard_agent::GenerationPipeline;
use switchyard_config::{AppConfig, ConfigError};
use switchyard_core::error::GenerationError;
use switchyard_core::memory::KnowledgeStore;
use switchyard_core::provider::{Embedder, GenerationBackend};
use switchyard_core::skill::SkillArguments;
use switchyard_memory::{InMemoryStore, NoopStore, QdrantStore};
use switchyard_providers::OpenAiBackend;
use switchyard_runtime::{AgentDefinition, AgentWorkerRuntime};

pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// The configuration loaded at startup, for commands that cannot run
/// without it.
pub fn require(loaded: Result<AppConfig, ConfigError>) -> CliResult<AppConfig> {
    Ok(loaded.map_err(|e| format!("Failed to load config: {e}"))?)
}

/// The OpenAI-compatible backend, or a setup hint when no key is available.
pub fn backend(config: &AppConfig) -> CliResult<Arc<OpenAiBackend>> {
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    SWITCHYARD_API_KEY=sk-...   (generic)");
        eprintln!("    OPENAI_API_KEY=sk-...       (OpenAI direct)");
        eprintln!();
        eprintln!("  Or add it to the [openai] section of:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let backend = OpenAiBackend::from_config(&config.openai, devteam::skills::library())?;
    Ok(Arc::new(backend))
}

/// The knowledge store selected by `memory.backend`.
pub fn knowledge_store(
    config: &AppConfig,
    embedder: Arc<dyn Embedder>,
) -> CliResult<Arc<dyn KnowledgeStore>> {
    let store: Arc<dyn KnowledgeStore> = match config.memory.backend.as_str() {
        "qdrant" => {
            let qdrant = config
                .qdrant
                .as_ref()
                .ok_or("memory.backend = \"qdrant\" requires a [qdrant] section")?;
            Arc::new(QdrantStore::new(qdrant, embedder)?)
        }
        "in_memory" => Arc::new(InMemoryStore::new()),
        _ => Arc::new(NoopStore),
    };
    Ok(store)
}

pub fn pipeline(config: &AppConfig, backend: Arc<OpenAiBackend>) -> CliResult<GenerationPipeline> {
    let store = knowledge_store(config, backend.clone())?;
    Ok(GenerationPipeline::new(backend)
        .with_memory(store)
        .with_memory_config(&config.memory))
}

/// A runtime hosting the dev team plus any `extra` agents.
pub fn devteam_runtime(
    config: &AppConfig,
    pipeline: GenerationPipeline,
    extra: Vec<AgentDefinition>,
) -> CliResult<AgentWorkerRuntime> {
    let builder = extra.into_iter().fold(
        AgentWorkerRuntime::builder()
            .with_config(&config.runtime)
            .agent(ProductManager::definition(pipeline)),
        |builder, def| builder.agent(def),
    );
    Ok(builder.build()?)
}

/// Stands in for the real backend when only the agent declarations are
/// needed.
pub struct UnconfiguredBackend;

#[async_trait]
impl GenerationBackend for UnconfiguredBackend {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn invoke(&self, skill: &str, _args: &SkillArguments) -> Result<String, GenerationError> {
        Err(GenerationError::NotConfigured(format!(
            "no backend configured to run {skill}"
        )))
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        Ok(false)
    }
}
