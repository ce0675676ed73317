//! Error types for the Switchyard domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::identity::AgentId;

/// The top-level error type for all Switchyard operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Collaborator errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Messaging errors ---
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Correlation error: {0}")]
    Correlation(#[from] CorrelationError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Addressing ---
    #[error("Invalid agent id: {0}")]
    InvalidAgentId(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failure reported by a generation backend.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Unknown skill: {0}")]
    UnknownSkill(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failure reported by a memory collaborator.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Transport already started")]
    AlreadyStarted,

    #[error("Publish failed on {topic}: {reason}")]
    PublishFailed { topic: String, reason: String },
}

/// A handler failed while processing one delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Handler for {agent} failed on {event_type}: {reason}")]
    HandlerFailed {
        agent: AgentId,
        event_type: String,
        reason: String,
    },

    #[error("Handler for {agent} panicked on {event_type}")]
    HandlerPanicked { agent: AgentId, event_type: String },

    #[error("No agent type {agent_type} registered for {event_type}")]
    UnknownAgentType {
        agent_type: String,
        event_type: String,
    },

    #[error("Payload of {event_type} could not be decoded: {reason}")]
    Decode { event_type: String, reason: String },

    #[error("Mailbox for {0} is closed")]
    MailboxClosed(AgentId),
}

/// Request/response correlation outcomes other than a normal resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    #[error("No pending request matches {request_id}")]
    Unmatched { request_id: Uuid },

    #[error("Request {request_id} timed out after {after:?}")]
    Timeout { request_id: Uuid, after: Duration },

    #[error("Request {request_id} was cancelled")]
    Cancelled { request_id: Uuid },

    #[error("Request {request_id} was already registered")]
    Duplicate { request_id: Uuid },
}

/// Malformed subscription declarations. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Invalid agent type {0:?}")]
    InvalidAgentType(String),

    #[error("Invalid topic {topic:?} declared by {agent_type}")]
    InvalidTopic { agent_type: String, topic: String },

    #[error("Invalid event type {event_type:?} declared by {agent_type}")]
    InvalidEventType {
        agent_type: String,
        event_type: String,
    },

    #[error("Agent type {0} defined twice")]
    DuplicateAgentType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_displays_correctly() {
        let err = Error::Generation(GenerationError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn delivery_error_names_the_agent() {
        let err = Error::Delivery(DeliveryError::HandlerFailed {
            agent: AgentId::new("ProductManager", "devteam").unwrap(),
            event_type: "ReadmeRequested".into(),
            reason: "boom".into(),
        });
        assert!(err.to_string().contains("ProductManager/devteam"));
        assert!(err.to_string().contains("ReadmeRequested"));
    }

    #[test]
    fn timeout_reports_duration() {
        let err = CorrelationError::Timeout {
            request_id: Uuid::nil(),
            after: Duration::from_millis(250),
        };
        assert!(err.to_string().contains("250ms"));
    }
}
