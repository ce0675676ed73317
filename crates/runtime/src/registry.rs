//! Subscription registry: which agent types receive which topics.
//!
//! Built once at startup from the agents' declarations, then immutable.
//! Besides topic membership it records which envelope types each agent
//! type handles, so dispatch never has to ask an agent whether it cares.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use switchyard_core::error::RegistryError;

/// Declares that instances of `agent_type` receive envelopes on `topic`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Subscription {
    pub topic: String,
    pub agent_type: String,
}

/// Collects declarations before the registry is frozen.
#[derive(Debug, Default)]
pub struct SubscriptionRegistryBuilder {
    topics: BTreeMap<String, BTreeSet<String>>,
    handled: BTreeMap<String, BTreeSet<String>>,
}

impl SubscriptionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `agent_type` known even if it subscribes to nothing.
    pub fn register_agent(&mut self, agent_type: impl Into<String>) -> &mut Self {
        self.handled.entry(agent_type.into()).or_default();
        self
    }

    /// Subscribe `agent_type` to `topic`. Registering a pair twice is a no-op.
    pub fn register(&mut self, agent_type: impl Into<String>, topic: impl Into<String>) -> &mut Self {
        let agent_type = agent_type.into();
        self.handled.entry(agent_type.clone()).or_default();
        self.topics.entry(topic.into()).or_default().insert(agent_type);
        self
    }

    /// Record that `agent_type` has a handler for `event_type`.
    pub fn register_handler(
        &mut self,
        agent_type: impl Into<String>,
        event_type: impl Into<String>,
    ) -> &mut Self {
        self.handled
            .entry(agent_type.into())
            .or_default()
            .insert(event_type.into());
        self
    }

    /// Validate every declaration and freeze the registry.
    pub fn build(self) -> Result<SubscriptionRegistry, RegistryError> {
        for (agent_type, event_types) in &self.handled {
            if !valid_name(agent_type) {
                return Err(RegistryError::InvalidAgentType(agent_type.clone()));
            }
            if let Some(bad) = event_types.iter().find(|t| !valid_name(t)) {
                return Err(RegistryError::InvalidEventType {
                    agent_type: agent_type.clone(),
                    event_type: bad.clone(),
                });
            }
        }

        for (topic, agent_types) in &self.topics {
            if !valid_name(topic) {
                let agent_type = agent_types.iter().next().cloned().unwrap_or_default();
                return Err(RegistryError::InvalidTopic {
                    agent_type,
                    topic: topic.clone(),
                });
            }
        }

        Ok(SubscriptionRegistry {
            topics: self.topics.into_iter().collect(),
            handled: self
                .handled
                .into_iter()
                .map(|(agent_type, types)| (agent_type, types.into_iter().collect()))
                .collect(),
        })
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(char::is_whitespace)
}

/// Immutable topic → agent type map, safe to read from any task.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    topics: HashMap<String, BTreeSet<String>>,
    handled: HashMap<String, HashSet<String>>,
}

impl SubscriptionRegistry {
    pub fn builder() -> SubscriptionRegistryBuilder {
        SubscriptionRegistryBuilder::new()
    }

    /// All agent types subscribed to `topic`; empty if none.
    pub fn resolve(&self, topic: &str) -> BTreeSet<&str> {
        self.topics
            .get(topic)
            .map(|types| types.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether `agent_type` declared a handler for `event_type`.
    pub fn handles(&self, agent_type: &str, event_type: &str) -> bool {
        self.handled
            .get(agent_type)
            .is_some_and(|types| types.contains(event_type))
    }

    /// Whether `agent_type` is known at all.
    pub fn knows(&self, agent_type: &str) -> bool {
        self.handled.contains_key(agent_type)
    }

    /// Every subscription, sorted by topic then agent type.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        let mut subs: Vec<Subscription> = self
            .topics
            .iter()
            .flat_map(|(topic, types)| {
                types.iter().map(move |agent_type| Subscription {
                    topic: topic.clone(),
                    agent_type: agent_type.clone(),
                })
            })
            .collect();
        subs.sort();
        subs
    }

    /// Envelope types handled by `agent_type`, sorted.
    pub fn handled_types(&self, agent_type: &str) -> Vec<&str> {
        let mut types: Vec<&str> = self
            .handled
            .get(agent_type)
            .map(|t| t.iter().map(String::as_str).collect())
            .unwrap_or_default();
        types.sort_unstable();
        types
    }
}
