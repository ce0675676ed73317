//! Shared test helpers for pipeline and agent tests.

use async_trait::async_trait;
use std::sync::Mutex;
use switchyard_core::error::{GenerationError, RetrievalError};
use switchyard_core::memory::{KnowledgeStore, MemoryEntry, MemoryQuery};
use switchyard_core::provider::GenerationBackend;
use switchyard_core::skill::SkillArguments;

/// A backend that returns a sequence of scripted outcomes and records every
/// invocation.
///
/// The last outcome repeats once the script runs out.
pub struct ScriptedBackend {
    outcomes: Mutex<Vec<Result<String, GenerationError>>>,
    calls: Mutex<Vec<(String, SkillArguments)>>,
}

impl ScriptedBackend {
    pub fn new(outcomes: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `text`.
    pub fn text(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    /// Always fails with `err`.
    pub fn failing(err: GenerationError) -> Self {
        Self::new(vec![Err(err)])
    }

    /// Every `(skill, args)` pair seen so far.
    pub fn calls(&self) -> Vec<(String, SkillArguments)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, skill: &str, args: &SkillArguments) -> Result<String, GenerationError> {
        self.calls
            .lock()
            .unwrap()
            .push((skill.to_string(), args.clone()));

        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.len() > 1 {
            outcomes.remove(0)
        } else {
            outcomes
                .first()
                .cloned()
                .expect("ScriptedBackend needs at least one outcome")
        }
    }
}

/// A store that returns fixed passages, honouring the query limit.
pub struct StaticStore {
    passages: Vec<String>,
    last_query: Mutex<Option<MemoryQuery>>,
}

impl StaticStore {
    pub fn new(passages: Vec<&str>) -> Self {
        Self {
            passages: passages.into_iter().map(String::from).collect(),
            last_query: Mutex::new(None),
        }
    }

    pub fn last_query(&self) -> Option<MemoryQuery> {
        self.last_query.lock().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeStore for StaticStore {
    fn name(&self) -> &str {
        "static"
    }

    async fn retrieve(&self, query: MemoryQuery) -> Result<Vec<MemoryEntry>, RetrievalError> {
        let entries = self
            .passages
            .iter()
            .take(query.limit)
            .map(|p| MemoryEntry::new(p.as_str()))
            .collect();
        *self.last_query.lock().unwrap() = Some(query);
        Ok(entries)
    }

    async fn store(&self, _collection: &str, _entry: MemoryEntry) -> Result<String, RetrievalError> {
        Ok("static".into())
    }
}

/// A store whose every call fails.
pub struct FailingStore;

#[async_trait]
impl KnowledgeStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn retrieve(&self, query: MemoryQuery) -> Result<Vec<MemoryEntry>, RetrievalError> {
        Err(RetrievalError::CollectionNotFound(query.collection))
    }

    async fn store(&self, _collection: &str, _entry: MemoryEntry) -> Result<String, RetrievalError> {
        Err(RetrievalError::Storage("read-only".into()))
    }
}
