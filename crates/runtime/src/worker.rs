//! The agent worker runtime.
//!
//! The only component that talks to the transport. Inbound envelopes are
//! routed three ways:
//!
//! - responses resolve a pending request in the [`Correlator`];
//! - requests go to the addressed instance;
//! - events fan out to one instance per subscribed agent type, keyed by
//!   the routing key.
//!
//! Each resident instance owns a FIFO mailbox drained by its own task, so
//! deliveries to one instance run one at a time while different instances
//! make progress independently.

use dashmap::DashMap;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use switchyard_config::RuntimeConfig;
use switchyard_core::error::{CorrelationError, DeliveryError, Error, RegistryError, Result};
use switchyard_core::event::{Envelope, EnvelopeKind};
use switchyard_core::identity::AgentId;
use switchyard_core::transport::{InProcessTransport, Transport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use crate::agent::{Agent, AgentDefinition};
use crate::context::AgentContext;
use crate::correlator::{Correlator, DEFAULT_REQUEST_TIMEOUT, PendingResponse};
use crate::registry::SubscriptionRegistry;

struct Mailbox {
    sender: mpsc::UnboundedSender<Envelope>,
    /// Deliveries queued or running. Only bumped under the arena entry lock.
    backlog: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

struct RuntimeInner {
    transport: Arc<dyn Transport>,
    registry: SubscriptionRegistry,
    definitions: HashMap<String, AgentDefinition>,
    instances: DashMap<AgentId, Mailbox>,
    correlator: Arc<Correlator>,
    request_timeout: Duration,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

/// Cheaply cloneable handle to a running worker.
#[derive(Clone)]
pub struct AgentWorkerRuntime {
    inner: Arc<RuntimeInner>,
}

/// Non-owning handle held by contexts and spawned tasks, so instances never
/// keep the runtime alive on their own.
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<AgentWorkerRuntime> {
        self.0.upgrade().map(|inner| AgentWorkerRuntime { inner })
    }
}

/// Collects agent definitions and settings for an [`AgentWorkerRuntime`].
pub struct AgentWorkerRuntimeBuilder {
    transport: Option<Arc<dyn Transport>>,
    definitions: Vec<AgentDefinition>,
    request_timeout: Duration,
}

impl Default for AgentWorkerRuntimeBuilder {
    fn default() -> Self {
        Self {
            transport: None,
            definitions: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl AgentWorkerRuntimeBuilder {
    /// Apply the `[runtime]` configuration section. Uses an in-process
    /// transport of the configured capacity unless one was already set.
    pub fn with_config(mut self, config: &RuntimeConfig) -> Self {
        self.request_timeout = config.request_timeout();
        if self.transport.is_none() {
            self.transport = Some(Arc::new(InProcessTransport::new(config.transport_capacity)));
        }
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn agent(mut self, definition: AgentDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build the registry from the agent declarations. Fails on malformed
    /// or duplicate declarations.
    pub fn build(self) -> std::result::Result<AgentWorkerRuntime, RegistryError> {
        let mut registry = SubscriptionRegistry::builder();
        let mut definitions = HashMap::new();

        for def in self.definitions {
            registry.register_agent(def.agent_type());
            for topic in def.topics() {
                registry.register(def.agent_type(), topic.as_str());
            }
            for event_type in def.handled_types() {
                registry.register_handler(def.agent_type(), event_type.as_str());
            }
            let agent_type = def.agent_type().to_string();
            if definitions.insert(agent_type.clone(), def).is_some() {
                return Err(RegistryError::DuplicateAgentType(agent_type));
            }
        }

        let registry = registry.build()?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(InProcessTransport::default()));

        info!(
            transport = transport.name(),
            agent_types = definitions.len(),
            subscriptions = registry.subscriptions().len(),
            "Agent worker runtime built"
        );

        Ok(AgentWorkerRuntime {
            inner: Arc::new(RuntimeInner {
                transport,
                registry,
                definitions,
                instances: DashMap::new(),
                correlator: Correlator::new(),
                request_timeout: self.request_timeout,
                dispatch: Mutex::new(None),
            }),
        })
    }
}

impl AgentWorkerRuntime {
    pub fn builder() -> AgentWorkerRuntimeBuilder {
        AgentWorkerRuntimeBuilder::default()
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.inner.registry
    }

    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// A context for code outside any hosted agent (a CLI, a test) to act
    /// as `agent_id`. Responses to its requests are still correlated.
    pub fn client(&self, agent_id: AgentId) -> AgentContext {
        AgentContext::new(agent_id, self.downgrade())
    }

    fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Arc::downgrade(&self.inner))
    }

    /// Begin consuming the transport's delivery stream.
    pub async fn start(&self) -> Result<()> {
        let mut deliveries = self.inner.transport.start().await?;
        let runtime = self.downgrade();

        let handle = tokio::spawn(async move {
            while let Some(envelope) = deliveries.recv().await {
                let Some(runtime) = runtime.upgrade() else {
                    break;
                };
                runtime.on_envelope_received(envelope);
            }
            debug!("Dispatch loop finished");
        });

        let mut dispatch = self
            .inner
            .dispatch
            .lock()
            .map_err(|_| Error::Internal("dispatch handle lock poisoned".into()))?;
        if let Some(previous) = dispatch.replace(handle) {
            previous.abort();
        }

        info!(transport = self.inner.transport.name(), "Agent worker runtime started");
        Ok(())
    }

    /// Stop dispatching, cancel every pending request and close all
    /// mailboxes. Queued deliveries that have not started are discarded.
    pub fn shutdown(&self) {
        if let Ok(mut dispatch) = self.inner.dispatch.lock() {
            if let Some(handle) = dispatch.take() {
                handle.abort();
            }
        }

        let cancelled = self.inner.correlator.cancel_all();
        let instances = self.inner.instances.len();
        self.inner.instances.retain(|_, mailbox| {
            mailbox.task.abort();
            false
        });

        info!(cancelled, instances, "Agent worker runtime shut down");
    }

    /// Route one inbound envelope. Never fails; problems are logged and
    /// confined to the affected delivery.
    pub fn on_envelope_received(&self, envelope: Envelope) {
        trace!(
            envelope = %envelope.id(),
            event_type = envelope.event_type(),
            routing_key = envelope.routing_key(),
            "Envelope received"
        );

        match envelope.kind().clone() {
            EnvelopeKind::Response { request_id, .. } => {
                if !self.inner.correlator.resolve(request_id, envelope) {
                    let err = CorrelationError::Unmatched { request_id };
                    warn!(error = %err, "Dropping response");
                }
            }
            EnvelopeKind::Request { request_id, target } => {
                if !self
                    .inner
                    .registry
                    .handles(target.agent_type(), envelope.event_type())
                {
                    warn!(
                        %request_id,
                        target = %target,
                        event_type = envelope.event_type(),
                        "No handler for request, dropping"
                    );
                    return;
                }
                self.deliver(target, envelope);
            }
            EnvelopeKind::Event => self.fan_out(envelope),
        }
    }

    fn fan_out(&self, envelope: Envelope) {
        let topic = envelope.routing_key();
        let subscribers = self.inner.registry.resolve(topic);
        if subscribers.is_empty() {
            trace!(topic, event_type = envelope.event_type(), "No subscribers");
            return;
        }

        for agent_type in subscribers {
            if !self.inner.registry.handles(agent_type, envelope.event_type()) {
                trace!(agent_type, event_type = envelope.event_type(), "Not handled, skipping");
                continue;
            }
            match AgentId::new(agent_type, topic) {
                Ok(id) => self.deliver(id, envelope.clone()),
                Err(e) => warn!(agent_type, topic, error = %e, "Cannot address instance"),
            }
        }
    }

    fn deliver(&self, id: AgentId, envelope: Envelope) {
        let Some(definition) = self.inner.definitions.get(id.agent_type()) else {
            let err = DeliveryError::UnknownAgentType {
                agent_type: id.agent_type().to_string(),
                event_type: envelope.event_type().to_string(),
            };
            warn!(error = %err, "Dropping delivery");
            return;
        };

        let (sender, backlog) = {
            let mailbox = self
                .inner
                .instances
                .entry(id.clone())
                .or_insert_with(|| self.activate(definition, &id));
            // Counted before the entry lock is released, so `evict` never
            // sees an idle mailbox with a delivery on its way in.
            mailbox.backlog.fetch_add(1, Ordering::SeqCst);
            (mailbox.sender.clone(), Arc::clone(&mailbox.backlog))
        };

        if sender.send(envelope).is_err() {
            backlog.fetch_sub(1, Ordering::SeqCst);
            let err = DeliveryError::MailboxClosed(id);
            warn!(error = %err, "Dropping delivery");
        }
    }

    fn activate(&self, definition: &AgentDefinition, id: &AgentId) -> Mailbox {
        let agent = definition.instantiate(id);
        let ctx = AgentContext::new(id.clone(), self.downgrade());
        let (sender, receiver) = mpsc::unbounded_channel();
        let backlog = Arc::new(AtomicUsize::new(0));
        let task = tokio::spawn(run_mailbox(agent, ctx, receiver, Arc::clone(&backlog)));
        debug!(agent = %id, "Activated agent instance");
        Mailbox {
            sender,
            backlog,
            task,
        }
    }

    /// Hand an envelope to the transport. Returns once the transport
    /// accepted it.
    pub async fn publish(&self, envelope: Envelope) -> Result<()> {
        self.inner.transport.publish(envelope).await?;
        Ok(())
    }

    /// Register `request` with the correlator and send it. The returned
    /// handle resolves with the first matching response.
    pub async fn send_request(&self, request: Envelope) -> Result<PendingResponse> {
        let Some(request_id) = request.request_id().filter(|_| request.is_request()) else {
            return Err(Error::Internal(format!(
                "envelope {} ({}) is not a request",
                request.id(),
                request.event_type()
            )));
        };

        let pending = self.inner.correlator.register(request_id)?;
        debug!(
            %request_id,
            source = %request.source(),
            target = ?request.target().map(ToString::to_string),
            event_type = request.event_type(),
            "Sending request"
        );
        // On failure `pending` is dropped here, withdrawing the request.
        self.publish(request).await?;
        Ok(pending)
    }

    /// Reply to `request` on behalf of `source`.
    pub async fn send_response(
        &self,
        request: &Envelope,
        event_type: &str,
        source: AgentId,
        payload: serde_json::Value,
    ) -> Result<()> {
        let response = Envelope::response_to(request, event_type, source, payload)?;
        self.publish(response).await
    }

    /// Drop an idle instance; the next delivery for the same id starts a
    /// fresh one. Returns `false` if there is no such instance or it still
    /// has deliveries queued or running.
    pub fn evict(&self, id: &AgentId) -> bool {
        let evicted = self
            .inner
            .instances
            .remove_if(id, |_, mailbox| mailbox.backlog.load(Ordering::SeqCst) == 0)
            .is_some();
        if evicted {
            debug!(agent = %id, "Evicted agent instance");
        } else if self.inner.instances.contains_key(id) {
            debug!(agent = %id, "Instance busy, not evicted");
        }
        evicted
    }

    /// Ids of every resident instance, sorted.
    pub fn resident_instances(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.inner.instances.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

async fn run_mailbox(
    mut agent: Box<dyn Agent>,
    mut ctx: AgentContext,
    mut receiver: mpsc::UnboundedReceiver<Envelope>,
    backlog: Arc<AtomicUsize>,
) {
    while let Some(envelope) = receiver.recv().await {
        let event_type = envelope.event_type().to_string();
        let envelope_id = envelope.id();
        let trace_id = envelope.trace_root();
        ctx.set_trace(trace_id);

        let span = info_span!("delivery", agent = %ctx.agent_id(), event_type, %trace_id);
        let outcome = AssertUnwindSafe(agent.handle(envelope, &ctx).instrument(span))
            .catch_unwind()
            .await;
        backlog.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Ok(Ok(())) => {
                trace!(agent = %ctx.agent_id(), envelope = %envelope_id, event_type, "Delivery handled");
            }
            Ok(Err(e)) => {
                let err = DeliveryError::HandlerFailed {
                    agent: ctx.agent_id().clone(),
                    event_type,
                    reason: e.to_string(),
                };
                warn!(envelope = %envelope_id, error = %err, "Delivery failed");
            }
            Err(_) => {
                let err = DeliveryError::HandlerPanicked {
                    agent: ctx.agent_id().clone(),
                    event_type,
                };
                error!(envelope = %envelope_id, error = %err, "Delivery failed");
            }
        }
    }
    trace!(agent = %ctx.agent_id(), "Mailbox closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use switchyard_core::event::Event;

    #[derive(Serialize, Deserialize)]
    struct Ping;

    impl Event for Ping {
        const EVENT_TYPE: &'static str = "Ping";
    }

    struct Silent;

    #[async_trait]
    impl Agent for Silent {
        async fn handle(&mut self, _envelope: Envelope, _ctx: &AgentContext) -> Result<()> {
            Ok(())
        }
    }

    fn silent(agent_type: &str) -> AgentDefinition {
        AgentDefinition::new(agent_type, |_| Box::new(Silent))
    }

    #[test]
    fn duplicate_agent_type_rejected() {
        let result = AgentWorkerRuntime::builder()
            .agent(silent("Echo"))
            .agent(silent("Echo"))
            .build();
        assert!(matches!(result, Err(RegistryError::DuplicateAgentType(t)) if t == "Echo"));
    }

    #[test]
    fn malformed_subscription_halts_build() {
        let result = AgentWorkerRuntime::builder()
            .agent(silent("Echo").subscribe("dev team"))
            .build();
        assert!(matches!(result, Err(RegistryError::InvalidTopic { .. })));
    }

    #[test]
    fn config_sets_timeout() {
        let config = RuntimeConfig {
            request_timeout_ms: 250,
            ..Default::default()
        };
        let runtime = AgentWorkerRuntime::builder().with_config(&config).build().unwrap();
        assert_eq!(runtime.request_timeout(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn event_activates_one_instance_per_subscriber() {
        let runtime = AgentWorkerRuntime::builder()
            .agent(silent("A").subscribe("devteam").handles::<Ping>())
            .agent(silent("B").subscribe("devteam").handles::<Ping>())
            .agent(silent("C").subscribe("devteam"))
            .build()
            .unwrap();

        let source = AgentId::new("Client", "cli").unwrap();
        runtime.on_envelope_received(Ping.to_envelope(source.clone(), "devteam").unwrap());
        runtime.on_envelope_received(Ping.to_envelope(source, "devteam").unwrap());

        let ids: Vec<String> = runtime.resident_instances().iter().map(ToString::to_string).collect();
        assert_eq!(ids, vec!["A/devteam", "B/devteam"]);
    }

    #[tokio::test]
    async fn request_without_handler_is_dropped() {
        let runtime = AgentWorkerRuntime::builder()
            .agent(silent("A"))
            .build()
            .unwrap();
        let request = Ping
            .to_request(AgentId::new("Client", "c").unwrap(), AgentId::new("A", "k").unwrap())
            .unwrap();
        runtime.on_envelope_received(request);
        assert!(runtime.resident_instances().is_empty());
    }

    #[tokio::test]
    async fn evict_removes_instance() {
        let runtime = AgentWorkerRuntime::builder()
            .agent(silent("A").subscribe("t").handles::<Ping>())
            .build()
            .unwrap();
        runtime.on_envelope_received(Ping.to_envelope(AgentId::new("C", "c").unwrap(), "t").unwrap());

        let id = AgentId::new("A", "t").unwrap();
        // Busy until the mailbox task has run the delivery.
        let mut evicted = runtime.evict(&id);
        for _ in 0..100 {
            if evicted {
                break;
            }
            tokio::task::yield_now().await;
            evicted = runtime.evict(&id);
        }
        assert!(evicted);
        assert!(!runtime.evict(&id));
        assert!(runtime.resident_instances().is_empty());
    }

    #[tokio::test]
    async fn send_request_rejects_events() {
        let runtime = AgentWorkerRuntime::builder().build().unwrap();
        let event = Ping.to_envelope(AgentId::new("C", "c").unwrap(), "t").unwrap();
        assert!(matches!(runtime.send_request(event).await, Err(Error::Internal(_))));
        assert_eq!(runtime.pending_requests(), 0);
    }
}
