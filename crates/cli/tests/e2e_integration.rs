//! End-to-end integration tests for the Switchyard dev-team flow.
//!
//! These tests run the whole path from a published `ReadmeRequested` to the
//! product manager's reply: worker runtime dispatch, chat history, knowledge
//! retrieval, skill invocation and the outbound event or response.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use switchyard_agent::devteam::{
    product_manager, skills, ProductManager, ReadmeChainClosed, ReadmeCreated, ReadmeGenerated,
    ReadmeRequested, TOPIC,
};
use switchyard_agent::GenerationPipeline;
use switchyard_core::error::{GenerationError, RetrievalError};
use switchyard_core::event::Envelope;
use switchyard_core::identity::AgentId;
use switchyard_core::memory::{KnowledgeStore, MemoryEntry, MemoryQuery};
use switchyard_core::provider::GenerationBackend;
use switchyard_core::skill::SkillArguments;
use switchyard_memory::InMemoryStore;
use switchyard_runtime::{Agent, AgentContext, AgentDefinition, AgentWorkerRuntime};

// ── Mock Backend ─────────────────────────────────────────────────────────

/// A backend that answers every call with the same outcome and records the
/// arguments it was given.
struct ScriptedBackend {
    outcome: Result<String, GenerationError>,
    calls: Mutex<Vec<(String, SkillArguments)>>,
}

impl ScriptedBackend {
    fn text(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing(err: GenerationError) -> Self {
        Self {
            outcome: Err(err),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, SkillArguments)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn invoke(&self, skill: &str, args: &SkillArguments) -> Result<String, GenerationError> {
        self.calls.lock().unwrap().push((skill.to_string(), args.clone()));
        self.outcome.clone()
    }
}

/// A store with no `waf` collection at all.
struct MissingCollectionStore;

#[async_trait::async_trait]
impl KnowledgeStore for MissingCollectionStore {
    fn name(&self) -> &str {
        "missing"
    }

    async fn retrieve(&self, query: MemoryQuery) -> Result<Vec<MemoryEntry>, RetrievalError> {
        Err(RetrievalError::CollectionNotFound(query.collection))
    }

    async fn store(&self, collection: &str, _entry: MemoryEntry) -> Result<String, RetrievalError> {
        Err(RetrievalError::CollectionNotFound(collection.to_string()))
    }
}

// ── Observer ─────────────────────────────────────────────────────────────

/// Collects every dev-team outcome event.
struct Observer {
    seen: Arc<Mutex<Vec<Envelope>>>,
}

#[async_trait::async_trait]
impl Agent for Observer {
    async fn handle(&mut self, envelope: Envelope, _ctx: &AgentContext) -> switchyard_core::Result<()> {
        self.seen.lock().unwrap().push(envelope);
        Ok(())
    }
}

fn observer(seen: &Arc<Mutex<Vec<Envelope>>>) -> AgentDefinition {
    let seen = Arc::clone(seen);
    AgentDefinition::new("Observer", move |_| Box::new(Observer { seen: Arc::clone(&seen) }))
        .subscribe(TOPIC)
        .handles::<ReadmeGenerated>()
        .handles::<ReadmeCreated>()
}

// ── Helpers ──────────────────────────────────────────────────────────────

async fn devteam(pipeline: GenerationPipeline, seen: &Arc<Mutex<Vec<Envelope>>>) -> AgentWorkerRuntime {
    let runtime = AgentWorkerRuntime::builder()
        .agent(ProductManager::definition(pipeline))
        .agent(observer(seen))
        .request_timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    runtime.start().await.unwrap();
    runtime
}

fn request(ask: &str) -> ReadmeRequested {
    ReadmeRequested {
        org: "contoso".into(),
        repo: "cli-tool".into(),
        issue_number: 42,
        ask: ask.into(),
    }
}

fn client(runtime: &AgentWorkerRuntime) -> AgentContext {
    runtime.client(AgentId::new("Requester", "a").unwrap())
}

async fn wait_for_events(seen: &Arc<Mutex<Vec<Envelope>>>, count: usize) -> Vec<Envelope> {
    for _ in 0..300 {
        {
            let seen = seen.lock().unwrap();
            if seen.len() >= count {
                return seen.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} events, saw {}", seen.lock().unwrap().len());
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn readme_request_publishes_exactly_one_generated_readme() {
    let backend = Arc::new(ScriptedBackend::text("# CLI Tool\n..."));
    let store = Arc::new(InMemoryStore::new());
    let pipeline = GenerationPipeline::new(backend.clone()).with_memory(store);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let runtime = devteam(pipeline, &seen).await;

    client(&runtime)
        .publish(&request("build a CLI tool"), TOPIC)
        .await
        .unwrap();

    let events = wait_for_events(&seen, 1).await;
    // Give any stray duplicate time to show up.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(seen.lock().unwrap().len(), 1);

    let generated: ReadmeGenerated = events[0].decode().unwrap();
    assert_eq!(
        generated,
        ReadmeGenerated {
            org: "contoso".into(),
            repo: "cli-tool".into(),
            issue_number: 42,
            readme: "# CLI Tool\n...".into(),
        }
    );
    assert_eq!(events[0].source(), &AgentId::new(product_manager::AGENT_TYPE, TOPIC).unwrap());

    // Nothing matched `waf`, so the instruction lost its placeholder.
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, skills::README);
    assert_eq!(calls[0].1.get("input"), Some("user: build a CLI tool"));
    assert_eq!(calls[0].1.get("waf"), Some("Consider the following architectural guidelines:"));

    runtime.shutdown();
}

#[tokio::test]
async fn retrieved_guidelines_reach_the_skill() {
    let backend = Arc::new(ScriptedBackend::text("# Service"));
    let store = Arc::new(InMemoryStore::new());
    store
        .store("waf", MemoryEntry::new("Every CLI tool should log in structured form"))
        .await
        .unwrap();
    store
        .store("waf", MemoryEntry::new("Databases need backups"))
        .await
        .unwrap();
    let pipeline = GenerationPipeline::new(backend.clone()).with_memory(store);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let runtime = devteam(pipeline, &seen).await;

    client(&runtime)
        .publish(&request("build a CLI tool"), TOPIC)
        .await
        .unwrap();
    wait_for_events(&seen, 1).await;

    let calls = backend.calls();
    assert_eq!(
        calls[0].1.get("waf"),
        Some("Consider the following architectural guidelines:Every CLI tool should log in structured form")
    );

    runtime.shutdown();
}

#[tokio::test]
async fn generation_failure_yields_empty_readme() {
    let backend = Arc::new(ScriptedBackend::failing(GenerationError::ApiError {
        status_code: 500,
        message: "upstream exploded".into(),
    }));
    let pipeline = GenerationPipeline::new(backend).with_memory(Arc::new(MissingCollectionStore));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let runtime = devteam(pipeline, &seen).await;

    client(&runtime)
        .publish(&request("build a CLI tool"), TOPIC)
        .await
        .unwrap();

    let events = wait_for_events(&seen, 1).await;
    let generated: ReadmeGenerated = events[0].decode().unwrap();
    assert!(generated.readme.is_empty());

    runtime.shutdown();
}

#[tokio::test]
async fn direct_request_gets_correlated_response() {
    let backend = Arc::new(ScriptedBackend::text("# Direct"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let runtime = devteam(GenerationPipeline::new(backend), &seen).await;

    let target = AgentId::new(product_manager::AGENT_TYPE, TOPIC).unwrap();
    let response = client(&runtime)
        .send_request(target, &request("build a CLI tool"))
        .await
        .unwrap();

    assert!(response.is_response());
    let generated: ReadmeGenerated = response.decode().unwrap();
    assert_eq!(generated.readme, "# Direct");
    // Answered point-to-point, not broadcast.
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(runtime.pending_requests(), 0);

    runtime.shutdown();
}

#[tokio::test]
async fn closing_the_chain_publishes_the_last_readme() {
    let backend = Arc::new(ScriptedBackend::text("# Final"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let runtime = devteam(GenerationPipeline::new(backend), &seen).await;
    let client = client(&runtime);

    client.publish(&request("build a CLI tool"), TOPIC).await.unwrap();
    wait_for_events(&seen, 1).await;

    client
        .publish(
            &ReadmeChainClosed {
                org: "contoso".into(),
                repo: "cli-tool".into(),
                issue_number: 42,
            },
            TOPIC,
        )
        .await
        .unwrap();

    let events = wait_for_events(&seen, 2).await;
    let created: ReadmeCreated = events[1].decode().unwrap();
    assert_eq!(created.readme, "# Final");

    runtime.shutdown();
}

#[tokio::test]
async fn closing_an_empty_chain_publishes_empty_readme() {
    let backend = Arc::new(ScriptedBackend::text("unused"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let runtime = devteam(GenerationPipeline::new(backend.clone()), &seen).await;

    client(&runtime)
        .publish(
            &ReadmeChainClosed {
                org: "contoso".into(),
                repo: "cli-tool".into(),
                issue_number: 7,
            },
            TOPIC,
        )
        .await
        .unwrap();

    let events = wait_for_events(&seen, 1).await;
    let created: ReadmeCreated = events[0].decode().unwrap();
    assert!(created.readme.is_empty());
    assert!(backend.calls().is_empty());

    runtime.shutdown();
}
