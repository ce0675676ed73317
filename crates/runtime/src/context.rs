//! Per-instance facade over the worker runtime.
//!
//! Agent logic only ever sees an [`AgentContext`]. It can publish events,
//! issue correlated requests and answer requests it received; the
//! transport and the correlator stay behind the runtime.

use std::time::Duration;
use switchyard_core::error::{Error, Result, TransportError};
use switchyard_core::event::{Envelope, Event};
use switchyard_core::identity::AgentId;
use tracing::debug;
use uuid::Uuid;

use crate::worker::{AgentWorkerRuntime, WeakRuntime};

/// Handle given to an agent instance (or an external client) for talking
/// to the rest of the system under its own [`AgentId`].
#[derive(Clone)]
pub struct AgentContext {
    agent_id: AgentId,
    runtime: WeakRuntime,
    trace_id: Option<Uuid>,
}

impl AgentContext {
    pub(crate) fn new(agent_id: AgentId, runtime: WeakRuntime) -> Self {
        Self {
            agent_id,
            runtime,
            trace_id: None,
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// The causal chain of the delivery being handled, if any.
    pub fn trace_id(&self) -> Option<Uuid> {
        self.trace_id
    }

    pub(crate) fn set_trace(&mut self, trace_id: Uuid) {
        self.trace_id = Some(trace_id);
    }

    /// Put an outbound envelope on the current chain unless it already
    /// belongs to one.
    fn stamp(&self, envelope: Envelope) -> Envelope {
        match self.trace_id {
            Some(trace_id) if envelope.trace_id().is_none() => envelope.with_trace_id(trace_id),
            _ => envelope,
        }
    }

    fn runtime(&self) -> Result<AgentWorkerRuntime> {
        self.runtime
            .upgrade()
            .ok_or(Error::Transport(TransportError::Closed))
    }

    /// Publish a pre-built envelope.
    pub async fn publish_event(&self, envelope: Envelope) -> Result<()> {
        self.runtime()?.publish(self.stamp(envelope)).await
    }

    /// Publish a typed event on `topic` with this instance as source.
    pub async fn publish<E: Event>(&self, event: &E, topic: &str) -> Result<()> {
        let envelope = event.to_envelope(self.agent_id.clone(), topic)?;
        debug!(
            agent = %self.agent_id,
            event_type = E::EVENT_TYPE,
            topic,
            "Publishing event"
        );
        self.publish_event(envelope).await
    }

    /// Send `request` to `target` and wait for the correlated response,
    /// using the runtime's default deadline.
    pub async fn send_request<E: Event>(&self, target: AgentId, request: &E) -> Result<Envelope> {
        let timeout = self.runtime()?.request_timeout();
        self.send_request_with_timeout(target, request, timeout).await
    }

    pub async fn send_request_with_timeout<E: Event>(
        &self,
        target: AgentId,
        request: &E,
        timeout: Duration,
    ) -> Result<Envelope> {
        let envelope = self.stamp(request.to_request(self.agent_id.clone(), target)?);
        let pending = self.runtime()?.send_request(envelope).await?;
        Ok(pending.wait(timeout).await?)
    }

    /// Answer a request this instance received.
    pub async fn send_response<E: Event>(&self, request: &Envelope, response: &E) -> Result<()> {
        let payload = serde_json::to_value(response)?;
        self.runtime()?
            .send_response(request, E::EVENT_TYPE, self.agent_id.clone(), payload)
            .await
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("agent_id", &self.agent_id)
            .field("trace_id", &self.trace_id)
            .finish_non_exhaustive()
    }
}
