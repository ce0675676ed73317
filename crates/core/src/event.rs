//! Event envelopes, the canonical unit of inter-agent communication.
//!
//! An [`Envelope`] wraps a typed payload the way a cloud-event does:
//! an id, a type name, the sending [`AgentId`], a routing key (the topic
//! for fan-out) and the JSON payload. Requests and responses are envelopes
//! too; their [`EnvelopeKind`] carries the correlation id and the address
//! of the instance they are meant for.
//!
//! Envelopes caused by handling another envelope carry the `trace_id` of
//! the causal chain they belong to, so logs from every hop can be joined.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DeliveryError, Error, Result};
use crate::identity::AgentId;

/// How an envelope is routed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    /// Topic fan-out on the routing key.
    Event,
    /// Point-to-point request awaiting a correlated response.
    Request { request_id: Uuid, target: AgentId },
    /// Reply to a request, addressed back to the requester.
    Response { request_id: Uuid, target: AgentId },
}

/// An immutable, transport-agnostic message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    id: Uuid,
    #[serde(rename = "type")]
    event_type: String,
    source: AgentId,
    routing_key: String,
    kind: EnvelopeKind,
    #[serde(default)]
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trace_id: Option<Uuid>,
}

impl Envelope {
    /// A topic event published on `routing_key`.
    pub fn event(
        event_type: impl Into<String>,
        source: AgentId,
        routing_key: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::build(event_type.into(), source, routing_key.into(), EnvelopeKind::Event, payload)
    }

    /// A request addressed at `target` with a fresh request id.
    pub fn request(
        event_type: impl Into<String>,
        source: AgentId,
        target: AgentId,
        payload: serde_json::Value,
    ) -> Self {
        let routing_key = target.key().to_string();
        let kind = EnvelopeKind::Request {
            request_id: Uuid::new_v4(),
            target,
        };
        Self::build(event_type.into(), source, routing_key, kind, payload)
    }

    /// A response to `request`, copying its request id and addressed back at
    /// the requester. Fails if `request` is not a request envelope.
    pub fn response_to(
        request: &Envelope,
        event_type: impl Into<String>,
        source: AgentId,
        payload: serde_json::Value,
    ) -> Result<Self> {
        let EnvelopeKind::Request { request_id, .. } = request.kind else {
            return Err(Error::Internal(format!(
                "envelope {} ({}) is not a request",
                request.id, request.event_type
            )));
        };

        let target = request.source.clone();
        let routing_key = target.key().to_string();
        let kind = EnvelopeKind::Response { request_id, target };
        Ok(Self::build(event_type.into(), source, routing_key, kind, payload)
            .with_trace_id(request.trace_root()))
    }

    fn build(
        event_type: String,
        source: AgentId,
        routing_key: String,
        kind: EnvelopeKind,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            source,
            routing_key,
            kind,
            payload,
            created_at: Utc::now(),
            trace_id: None,
        }
    }

    /// Attach this envelope to an existing causal chain.
    pub fn with_trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn source(&self) -> &AgentId {
        &self.source
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn kind(&self) -> &EnvelopeKind {
        &self.kind
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn trace_id(&self) -> Option<Uuid> {
        self.trace_id
    }

    /// The chain this envelope belongs to. An envelope without a trace
    /// starts its own chain, named by its id.
    pub fn trace_root(&self) -> Uuid {
        self.trace_id.unwrap_or(self.id)
    }

    /// The correlation id for requests and responses.
    pub fn request_id(&self) -> Option<Uuid> {
        match &self.kind {
            EnvelopeKind::Event => None,
            EnvelopeKind::Request { request_id, .. } | EnvelopeKind::Response { request_id, .. } => {
                Some(*request_id)
            }
        }
    }

    /// The addressed instance for requests and responses.
    pub fn target(&self) -> Option<&AgentId> {
        match &self.kind {
            EnvelopeKind::Event => None,
            EnvelopeKind::Request { target, .. } | EnvelopeKind::Response { target, .. } => {
                Some(target)
            }
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self.kind, EnvelopeKind::Request { .. })
    }

    pub fn is_response(&self) -> bool {
        matches!(self.kind, EnvelopeKind::Response { .. })
    }

    /// Whether the payload carries the typed event `E`.
    pub fn is<E: Event>(&self) -> bool {
        self.event_type == E::EVENT_TYPE
    }

    /// Decode the payload as `E`, checking the type name first.
    pub fn decode<E: Event>(&self) -> Result<E> {
        if !self.is::<E>() {
            return Err(Error::Delivery(DeliveryError::Decode {
                event_type: self.event_type.clone(),
                reason: format!("expected {}", E::EVENT_TYPE),
            }));
        }
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            Error::Delivery(DeliveryError::Decode {
                event_type: self.event_type.clone(),
                reason: e.to_string(),
            })
        })
    }
}

/// A typed event payload with a stable type name.
pub trait Event: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The envelope `type` this payload travels under.
    const EVENT_TYPE: &'static str;

    /// Wrap as a topic event from `source`.
    fn to_envelope(&self, source: AgentId, routing_key: impl Into<String>) -> Result<Envelope> {
        let payload = serde_json::to_value(self)?;
        Ok(Envelope::event(Self::EVENT_TYPE, source, routing_key, payload))
    }

    /// Wrap as a request from `source` to `target`.
    fn to_request(&self, source: AgentId, target: AgentId) -> Result<Envelope> {
        let payload = serde_json::to_value(self)?;
        Ok(Envelope::request(Self::EVENT_TYPE, source, target, payload))
    }
}
