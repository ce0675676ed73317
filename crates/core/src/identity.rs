//! Agent identity and addressing.
//!
//! Every agent instance is addressed by an [`AgentId`]: the `agent_type`
//! selects behavior (which handler set runs), the `key` selects the
//! partition or conversation the instance owns. Ids are immutable once
//! created and double as event provenance.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Unique address of one agent instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawAgentId")]
pub struct AgentId {
    #[serde(rename = "type")]
    agent_type: String,
    key: String,
}

impl AgentId {
    /// Create an id, rejecting empty or whitespace-only parts.
    pub fn new(agent_type: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        let agent_type = agent_type.into();
        let key = key.into();

        if agent_type.trim().is_empty() {
            return Err(Error::InvalidAgentId("agent type must not be empty".into()));
        }
        if key.trim().is_empty() {
            return Err(Error::InvalidAgentId(format!(
                "key for agent type '{agent_type}' must not be empty"
            )));
        }

        Ok(Self { agent_type, key })
    }

    pub fn agent_type(&self) -> &str {
        &self.agent_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Wire form of an [`AgentId`], validated on the way in.
#[derive(Deserialize)]
struct RawAgentId {
    #[serde(rename = "type")]
    agent_type: String,
    key: String,
}

impl TryFrom<RawAgentId> for AgentId {
    type Error = Error;

    fn try_from(raw: RawAgentId) -> Result<Self> {
        AgentId::new(raw.agent_type, raw.key)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.agent_type, self.key)
    }
}
