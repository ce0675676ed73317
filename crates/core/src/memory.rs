//! Knowledge store trait for similarity search over tagged passages.
//!
//! The generation pipeline retrieves passages for a collection tag (e.g.
//! `waf` for architectural guidelines) and splices them into the
//! instruction context. Stores may be vector-backed, keyword-backed or
//! absent altogether.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::RetrievalError;

/// A single stored passage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique ID for this passage
    pub id: String,

    /// The passage text
    pub content: String,

    /// Where the passage came from (document name, URL, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// When this passage was stored
    pub created_at: DateTime<Utc>,

    /// Relevance score (set by retrieval)
    #[serde(default)]
    pub score: f32,
}

impl MemoryEntry {
    /// A fresh entry with an id to be assigned by the store.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            content: content.into(),
            source: None,
            created_at: Utc::now(),
            score: 0.0,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A retrieval request against one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    /// The collection tag to search
    pub collection: String,

    /// The search text
    pub text: String,

    /// Maximum number of results
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Minimum relevance score threshold
    #[serde(default)]
    pub min_score: f32,
}

fn default_limit() -> usize {
    2
}

impl MemoryQuery {
    pub fn new(collection: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            text: text.into(),
            limit: default_limit(),
            min_score: 0.0,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

/// The core KnowledgeStore trait.
///
/// Implementations: Qdrant, in-memory (for testing), none (no-op).
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// The store name (e.g., "qdrant", "in_memory", "none").
    fn name(&self) -> &str;

    /// Retrieve passages relevant to the query, most relevant first.
    /// An empty result is not an error.
    async fn retrieve(&self, query: MemoryQuery) -> std::result::Result<Vec<MemoryEntry>, RetrievalError>;

    /// Store a passage in a collection, returning its id.
    async fn store(
        &self,
        collection: &str,
        entry: MemoryEntry,
    ) -> std::result::Result<String, RetrievalError>;
}
