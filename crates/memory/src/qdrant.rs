//! Qdrant knowledge store over the REST API.
//!
//! Passages are embedded with the configured [`Embedder`] and stored as
//! points whose payload carries the text. Retrieval embeds the query and
//! runs a cosine similarity search in the collection named by the tag.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use switchyard_config::QdrantConfig;
use switchyard_core::error::RetrievalError;
use switchyard_core::memory::{KnowledgeStore, MemoryEntry, MemoryQuery};
use switchyard_core::provider::Embedder;
use tracing::{debug, info};
use uuid::Uuid;

pub struct QdrantStore {
    endpoint: String,
    vector_size: usize,
    api_key: Option<String>,
    embedder: Arc<dyn Embedder>,
    client: reqwest::Client,
}

impl QdrantStore {
    pub fn new(config: &QdrantConfig, embedder: Arc<dyn Embedder>) -> Result<Self, RetrievalError> {
        if config.vector_size == 0 {
            return Err(RetrievalError::Storage("qdrant vector_size must be > 0".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| RetrievalError::Storage(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            vector_size: config.vector_size,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            embedder,
            client,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.endpoint, path));
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut vectors = self
            .embedder
            .embed(&[text.to_string()])
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;

        let vector = vectors
            .pop()
            .ok_or_else(|| RetrievalError::EmbeddingFailed("embedder returned no vector".into()))?;

        if vector.len() != self.vector_size {
            return Err(RetrievalError::EmbeddingFailed(format!(
                "embedding has {} dimensions, collection expects {}",
                vector.len(),
                self.vector_size
            )));
        }
        Ok(vector)
    }

    async fn ensure_collection(&self, collection: &str) -> Result<(), RetrievalError> {
        let path = format!("/collections/{collection}");
        let existing = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .map_err(|e| RetrievalError::Storage(e.to_string()))?;

        if existing.status().is_success() {
            return Ok(());
        }
        if existing.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(RetrievalError::Storage(format!(
                "checking collection {collection} returned {}",
                existing.status()
            )));
        }

        info!(collection, size = self.vector_size, "Creating Qdrant collection");
        let created = self
            .request(reqwest::Method::PUT, &path)
            .json(&serde_json::json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" }
            }))
            .send()
            .await
            .map_err(|e| RetrievalError::Storage(e.to_string()))?;

        if !created.status().is_success() {
            return Err(RetrievalError::Storage(format!(
                "creating collection {collection} returned {}",
                created.status()
            )));
        }
        Ok(())
    }
}

fn search_body(vector: Vec<f32>, query: &MemoryQuery) -> serde_json::Value {
    let mut body = serde_json::json!({
        "vector": vector,
        "limit": query.limit,
        "with_payload": true,
    });
    if query.min_score > 0.0 {
        body["score_threshold"] = serde_json::json!(query.min_score);
    }
    body
}

fn into_entries(response: SearchResponse) -> Vec<MemoryEntry> {
    response
        .result
        .into_iter()
        .filter_map(|point| {
            let text = point.payload.text?;
            Some(MemoryEntry {
                id: match point.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
                content: text,
                source: point.payload.source,
                created_at: point.payload.created_at.unwrap_or_else(Utc::now),
                score: point.score,
            })
        })
        .collect()
}

#[async_trait]
impl KnowledgeStore for QdrantStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn retrieve(&self, query: MemoryQuery) -> Result<Vec<MemoryEntry>, RetrievalError> {
        let vector = self.embed_one(&query.text).await?;
        let path = format!("/collections/{}/points/search", query.collection);

        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&search_body(vector, &query))
            .send()
            .await
            .map_err(|e| RetrievalError::QueryFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(collection = %query.collection, "Collection missing, nothing to retrieve");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::QueryFailed(format!("search returned {status}: {body}")));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::QueryFailed(format!("Failed to parse search response: {e}")))?;

        let entries = into_entries(parsed);
        debug!(collection = %query.collection, hits = entries.len(), "Qdrant search complete");
        Ok(entries)
    }

    async fn store(&self, collection: &str, entry: MemoryEntry) -> Result<String, RetrievalError> {
        let vector = self.embed_one(&entry.content).await?;
        self.ensure_collection(collection).await?;

        let id = if entry.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            entry.id.clone()
        };

        let body = serde_json::json!({
            "points": [{
                "id": id,
                "vector": vector,
                "payload": {
                    "text": entry.content,
                    "source": entry.source,
                    "created_at": entry.created_at,
                }
            }]
        });

        let response = self
            .request(reqwest::Method::PUT, &format!("/collections/{collection}/points?wait=true"))
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Storage(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Storage(format!("upsert returned {status}: {body}")));
        }

        Ok(id)
    }
}

// --- API types ---

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: serde_json::Value,
    score: f32,
    #[serde(default)]
    payload: PointPayload,
}

#[derive(Debug, Default, Deserialize)]
struct PointPayload {
    text: Option<String>,
    source: Option<String>,
    created_at: Option<DateTime<Utc>>,
}
