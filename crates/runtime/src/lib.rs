//! # Switchyard Runtime
//!
//! Hosts agent instances on top of a [`Transport`](switchyard_core::Transport):
//! the subscription registry, the worker runtime that dispatches inbound
//! envelopes, the per-instance [`AgentContext`], and the correlator that
//! pairs requests with responses.

pub mod agent;
pub mod context;
pub mod correlator;
pub mod registry;
pub mod worker;

pub use agent::{Agent, AgentDefinition};
pub use context::AgentContext;
pub use correlator::{Correlator, PendingResponse, DEFAULT_REQUEST_TIMEOUT};
pub use registry::{Subscription, SubscriptionRegistry, SubscriptionRegistryBuilder};
pub use worker::{AgentWorkerRuntime, AgentWorkerRuntimeBuilder};
