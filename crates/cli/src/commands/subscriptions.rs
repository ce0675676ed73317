//! `switchyard subscriptions`: show the routing table.

use std::sync::Arc;
use switchyard_agent::GenerationPipeline;
use switchyard_config::AppConfig;

use super::setup::{self, CliResult, UnconfiguredBackend};

pub async fn run(config: &AppConfig) -> CliResult<()> {
    // Declarations don't depend on the backend, so no API key is needed.
    let pipeline = GenerationPipeline::new(Arc::new(UnconfiguredBackend));
    let runtime = setup::devteam_runtime(config, pipeline, Vec::new())?;
    let registry = runtime.registry();

    println!("📡 Subscriptions");
    println!("================");
    for sub in registry.subscriptions() {
        println!("  {:<16} → {}", sub.topic, sub.agent_type);
        for event_type in registry.handled_types(&sub.agent_type) {
            println!("  {:<16}   handles {event_type}", "");
        }
    }

    Ok(())
}
