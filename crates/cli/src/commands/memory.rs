//! `switchyard memory`: seed and inspect knowledge collections.

use switchyard_config::AppConfig;
use switchyard_core::memory::{MemoryEntry, MemoryQuery};

use super::setup::{self, CliResult};

pub async fn add(
    config: &AppConfig,
    collection: &str,
    text: &str,
    source: Option<String>,
) -> CliResult<()> {
    if config.memory.backend != "qdrant" {
        println!(
            "⚠️  memory.backend = \"{}\" does not persist passages; configure qdrant to keep them",
            config.memory.backend
        );
        return Ok(());
    }

    let store = setup::knowledge_store(config, setup::backend(config)?)?;
    let mut entry = MemoryEntry::new(text);
    if let Some(source) = source {
        entry = entry.with_source(source);
    }

    let id = store.store(collection, entry).await?;
    println!("🧠 Stored passage {id} in '{collection}'");
    Ok(())
}

pub async fn search(config: &AppConfig, collection: &str, query: &str, limit: usize) -> CliResult<()> {
    let store = setup::knowledge_store(config, setup::backend(config)?)?;

    println!("🔍 Searching '{collection}' ({}) for: \"{query}\"", store.name());
    println!();

    let results = store
        .retrieve(MemoryQuery::new(collection, query).with_limit(limit))
        .await?;

    if results.is_empty() {
        println!("  No passages found.");
    }
    for (i, entry) in results.iter().enumerate() {
        let source = entry.source.as_deref().unwrap_or("-");
        println!("  {}. [{:.2}] {} ({source})", i + 1, entry.score, entry.content);
    }

    Ok(())
}
