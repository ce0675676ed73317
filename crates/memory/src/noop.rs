//! No-op knowledge store. Disables retrieval entirely.

use async_trait::async_trait;
use switchyard_core::error::RetrievalError;
use switchyard_core::memory::{KnowledgeStore, MemoryEntry, MemoryQuery};

/// A store that holds nothing and never finds anything.
pub struct NoopStore;

#[async_trait]
impl KnowledgeStore for NoopStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn retrieve(&self, _query: MemoryQuery) -> Result<Vec<MemoryEntry>, RetrievalError> {
        Ok(Vec::new())
    }

    async fn store(&self, _collection: &str, _entry: MemoryEntry) -> Result<String, RetrievalError> {
        Ok(String::new())
    }
}
