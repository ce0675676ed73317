//! The agent abstraction hosted by the worker runtime.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use switchyard_core::event::{Envelope, Event};
use switchyard_core::identity::AgentId;

use crate::context::AgentContext;

/// A stateful message handler.
///
/// One instance exists per [`AgentId`]. The runtime calls `handle` for one
/// envelope at a time per instance, so `&mut self` state needs no locking.
#[async_trait]
pub trait Agent: Send + 'static {
    /// Process one delivery. Errors are logged by the runtime and do not
    /// affect other deliveries or other instances.
    async fn handle(&mut self, envelope: Envelope, ctx: &AgentContext) -> switchyard_core::Result<()>;
}

type Factory = dyn Fn(&AgentId) -> Box<dyn Agent> + Send + Sync;

/// Everything the runtime needs to host one agent type: its name, the
/// topics it subscribes to, the envelope types it handles, and how to
/// build a fresh instance for a key.
#[derive(Clone)]
pub struct AgentDefinition {
    agent_type: String,
    topics: Vec<String>,
    handled_types: Vec<String>,
    factory: Arc<Factory>,
}

impl AgentDefinition {
    pub fn new<F>(agent_type: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&AgentId) -> Box<dyn Agent> + Send + Sync + 'static,
    {
        Self {
            agent_type: agent_type.into(),
            topics: Vec::new(),
            handled_types: Vec::new(),
            factory: Arc::new(factory),
        }
    }

    /// Subscribe to a topic.
    pub fn subscribe(mut self, topic: impl Into<String>) -> Self {
        self.topics.push(topic.into());
        self
    }

    /// Declare a handler for the typed event `E`.
    pub fn handles<E: Event>(self) -> Self {
        self.handles_type(E::EVENT_TYPE)
    }

    /// Declare a handler for an envelope type by name.
    pub fn handles_type(mut self, event_type: impl Into<String>) -> Self {
        self.handled_types.push(event_type.into());
        self
    }

    pub fn agent_type(&self) -> &str {
        &self.agent_type
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn handled_types(&self) -> &[String] {
        &self.handled_types
    }

    pub(crate) fn instantiate(&self, id: &AgentId) -> Box<dyn Agent> {
        (self.factory)(id)
    }
}

impl fmt::Debug for AgentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDefinition")
            .field("agent_type", &self.agent_type)
            .field("topics", &self.topics)
            .field("handled_types", &self.handled_types)
            .finish_non_exhaustive()
    }
}
