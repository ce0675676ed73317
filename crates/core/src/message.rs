//! Chat history: the running conversation an agent instance accumulates.
//!
//! History is per-instance state: each entry is numbered in arrival order,
//! and the whole history renders into the `input` prompt argument as
//! `"<role>: <content>"` lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a history entry's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The asker
    User,
    /// Content the agent produced
    Assistant,
    /// Instructions injected by the runtime
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        f.write_str(s)
    }
}

/// A single history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// 1-based position in the history
    pub order: usize,

    pub role: Role,

    pub content: String,

    pub timestamp: DateTime<Utc>,
}

/// Ordered conversation history owned by one agent instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatHistory {
    entries: Vec<HistoryEntry>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its order number.
    pub fn push(&mut self, role: Role, content: impl Into<String>) -> usize {
        let order = self.entries.len() + 1;
        self.entries.push(HistoryEntry {
            order,
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        order
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent entry, if any.
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// The most recent entry with the given role.
    pub fn last_by(&self, role: Role) -> Option<&HistoryEntry> {
        self.entries.iter().rev().find(|e| e.role == role)
    }

    /// Render as prompt text, one `role: content` line per entry.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}: {}", e.role, e.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
