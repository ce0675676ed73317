//! Transport trait: the abstraction over the underlying event bus.
//!
//! The worker runtime is the only component that talks to a transport. A
//! transport fans published envelopes out and hands every delivery back
//! through the receiver returned by [`Transport::start`]. Delivery
//! guarantees (durability, exactly-once) belong to the transport, not to
//! the runtime.

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::TransportError;
use crate::event::Envelope;

#[async_trait]
pub trait Transport: Send + Sync {
    /// A human-readable name (e.g. "in_process").
    fn name(&self) -> &str;

    /// Hand an envelope to the bus. Returns once accepted, not once delivered.
    async fn publish(&self, envelope: Envelope) -> std::result::Result<(), TransportError>;

    /// Begin delivery. Every envelope the bus routes to this process arrives
    /// on the returned receiver.
    async fn start(&self) -> std::result::Result<mpsc::Receiver<Envelope>, TransportError>;
}

/// Loopback transport for single-process deployments and tests.
///
/// Everything published is delivered back to the one consumer that called
/// `start`. Publishing before `start` buffers up to `capacity` envelopes.
pub struct InProcessTransport {
    sender: mpsc::Sender<Envelope>,
    receiver: Mutex<Option<mpsc::Receiver<Envelope>>>,
}

impl InProcessTransport {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }
}

impl Default for InProcessTransport {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    fn name(&self) -> &str {
        "in_process"
    }

    async fn publish(&self, envelope: Envelope) -> std::result::Result<(), TransportError> {
        trace!(
            envelope = %envelope.id(),
            event_type = envelope.event_type(),
            topic = envelope.routing_key(),
            "Publishing envelope"
        );
        self.sender
            .send(envelope)
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn start(&self) -> std::result::Result<mpsc::Receiver<Envelope>, TransportError> {
        self.receiver
            .lock()
            .map_err(|_| TransportError::Closed)?
            .take()
            .ok_or(TransportError::AlreadyStarted)
    }
}
