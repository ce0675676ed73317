//! Request/response correlation.
//!
//! Every outbound request registers its id here before it reaches the
//! transport. The first matching response resolves the waiter; anything
//! after that, or any response nobody is waiting for, is dropped.
//! Timeouts, explicit cancellation and dropping the waiter all remove the
//! pending entry, so no waiter outlives its request.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::error::CorrelationError;
use switchyard_core::event::Envelope;
use tokio::sync::oneshot;
use tracing::{debug, trace};
use uuid::Uuid;

type Outcome = Result<Envelope, CorrelationError>;

/// Default deadline for a correlated response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Table of in-flight requests keyed by request id.
#[derive(Default)]
pub struct Correlator {
    pending: DashMap<Uuid, oneshot::Sender<Outcome>>,
}

impl Correlator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start tracking `request_id`. Fails if it is already pending.
    pub fn register(self: &Arc<Self>, request_id: Uuid) -> Result<PendingResponse, CorrelationError> {
        let (tx, rx) = oneshot::channel();
        match self.pending.entry(request_id) {
            Entry::Occupied(_) => return Err(CorrelationError::Duplicate { request_id }),
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }
        trace!(%request_id, "Registered pending request");

        Ok(PendingResponse {
            request_id,
            rx,
            correlator: Arc::clone(self),
        })
    }

    /// Resolve a pending request with its response.
    ///
    /// Returns `false` (and drops the response) if no request with this id
    /// is pending, including when it was already resolved.
    pub fn resolve(&self, request_id: Uuid, response: Envelope) -> bool {
        self.complete(request_id, Ok(response))
    }

    /// Resolve a pending request with a cancellation. Idempotent.
    pub fn cancel(&self, request_id: Uuid) -> bool {
        self.complete(request_id, Err(CorrelationError::Cancelled { request_id }))
    }

    /// Cancel everything in flight. Returns how many waiters were cancelled.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<Uuid> = self.pending.iter().map(|e| *e.key()).collect();
        let cancelled = ids.into_iter().filter(|id| self.cancel(*id)).count();
        if cancelled > 0 {
            debug!(cancelled, "Cancelled pending requests");
        }
        cancelled
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, request_id: Uuid) -> bool {
        self.pending.contains_key(&request_id)
    }

    fn complete(&self, request_id: Uuid, outcome: Outcome) -> bool {
        match self.pending.remove(&request_id) {
            // The waiter may be gone already; the entry still counts as resolved.
            Some((_, tx)) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}

/// The caller's half of a pending request.
///
/// Dropping it withdraws the request; a late response is then unmatched.
pub struct PendingResponse {
    request_id: Uuid,
    rx: oneshot::Receiver<Outcome>,
    correlator: Arc<Correlator>,
}

impl PendingResponse {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Wait for the response, a cancellation, or the deadline.
    pub async fn wait(mut self, timeout: Duration) -> Result<Envelope, CorrelationError> {
        let request_id = self.request_id;
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(CorrelationError::Cancelled { request_id }),
            Err(_) => {
                // A resolver already took the sender, so its outcome is
                // on the way and wins over the deadline.
                if self.correlator.pending.remove(&request_id).is_none() {
                    return match (&mut self.rx).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(CorrelationError::Cancelled { request_id }),
                    };
                }
                debug!(%request_id, ?timeout, "Request timed out");
                Err(CorrelationError::Timeout {
                    request_id,
                    after: timeout,
                })
            }
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.correlator.pending.remove(&self.request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::identity::AgentId;

    fn response(request_id_source: &Envelope) -> Envelope {
        Envelope::response_to(
            request_id_source,
            "Pong",
            AgentId::new("Server", "s").unwrap(),
            serde_json::json!({}),
        )
        .unwrap()
    }

    fn request() -> Envelope {
        Envelope::request(
            "Ping",
            AgentId::new("Client", "c").unwrap(),
            AgentId::new("Server", "s").unwrap(),
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn first_response_wins() {
        let correlator = Correlator::new();
        let req = request();
        let id = req.request_id().unwrap();
        let pending = correlator.register(id).unwrap();

        let first = response(&req);
        let first_id = first.id();
        assert!(correlator.resolve(id, first));
        assert!(!correlator.resolve(id, response(&req)));

        let got = pending.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(got.id(), first_id);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn unmatched_response_is_dropped() {
        let correlator = Correlator::new();
        assert!(!correlator.resolve(Uuid::new_v4(), response(&request())));
    }

    #[tokio::test]
    async fn timeout_resolves_waiter_and_clears_entry() {
        let correlator = Correlator::new();
        let id = Uuid::new_v4();
        let pending = correlator.register(id).unwrap();

        let err = pending.wait(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, CorrelationError::Timeout { request_id, .. } if request_id == id));
        assert!(!correlator.is_pending(id));
        // A late response is now unmatched.
        assert!(!correlator.resolve(id, response(&request())));
    }

    #[tokio::test]
    async fn cancel_then_resolve_is_noop() {
        let correlator = Correlator::new();
        let id = Uuid::new_v4();
        let pending = correlator.register(id).unwrap();

        assert!(correlator.cancel(id));
        assert!(!correlator.cancel(id));
        assert!(!correlator.resolve(id, response(&request())));

        let err = pending.wait(Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err, CorrelationError::Cancelled { request_id: id });
    }

    #[tokio::test]
    async fn dropping_waiter_withdraws_request() {
        let correlator = Correlator::new();
        let id = Uuid::new_v4();
        drop(correlator.register(id).unwrap());
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_registration_rejected() {
        let correlator = Correlator::new();
        let id = Uuid::new_v4();
        let _pending = correlator.register(id).unwrap();
        assert!(matches!(
            correlator.register(id),
            Err(CorrelationError::Duplicate { .. })
        ));
    }

    #[tokio::test]
    async fn cancel_all_releases_every_waiter() {
        let correlator = Correlator::new();
        let a = correlator.register(Uuid::new_v4()).unwrap();
        let b = correlator.register(Uuid::new_v4()).unwrap();

        assert_eq!(correlator.cancel_all(), 2);
        assert!(matches!(a.wait(Duration::from_secs(1)).await, Err(CorrelationError::Cancelled { .. })));
        assert!(matches!(b.wait(Duration::from_secs(1)).await, Err(CorrelationError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn concurrent_resolvers_resolve_once() {
        let correlator = Correlator::new();
        let req = request();
        let id = req.request_id().unwrap();
        let pending = correlator.register(id).unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let c = Arc::clone(&correlator);
            let r = response(&req);
            handles.push(tokio::spawn(async move { c.resolve(id, r) }));
        }

        let mut wins = 0;
        for h in handles {
            if h.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert!(pending.wait(Duration::from_secs(1)).await.is_ok());
    }

    #[tokio::test]
    async fn resolution_in_flight_at_deadline_wins() {
        let correlator = Correlator::new();
        let req = request();
        let id = req.request_id().unwrap();
        let pending = correlator.register(id).unwrap();

        // A resolver has claimed the entry but has not sent yet.
        let (_, tx) = correlator.pending.remove(&id).unwrap();
        let reply = response(&req);
        let reply_id = reply.id();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(Ok(reply));
        });

        let got = pending.wait(Duration::from_millis(10)).await.unwrap();
        assert_eq!(got.id(), reply_id);
    }
}
