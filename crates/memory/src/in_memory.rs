//! In-memory knowledge store, useful for testing and ephemeral sessions.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use switchyard_core::error::RetrievalError;
use switchyard_core::memory::{KnowledgeStore, MemoryEntry, MemoryQuery};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Stores passages per collection in a Vec and ranks them by term overlap.
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<MemoryEntry>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of passages in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn retrieve(&self, query: MemoryQuery) -> Result<Vec<MemoryEntry>, RetrievalError> {
        let collections = self.collections.read().await;
        let Some(entries) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let query_terms = terms(&query.text);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<MemoryEntry> = entries
            .iter()
            .map(|e| {
                let content_terms = terms(&e.content);
                let hits = query_terms.intersection(&content_terms).count();
                let mut e = e.clone();
                e.score = hits as f32 / query_terms.len() as f32;
                e
            })
            .filter(|e| e.score > 0.0 && e.score >= query.min_score)
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(query.limit);

        Ok(results)
    }

    async fn store(&self, collection: &str, mut entry: MemoryEntry) -> Result<String, RetrievalError> {
        if entry.id.is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        let id = entry.id.clone();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(entry);
        Ok(id)
    }
}
