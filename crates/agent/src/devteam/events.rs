//! Events exchanged on the `devteam` topic. Payload fields travel in
//! camelCase (`issueNumber`).

use serde::{Deserialize, Serialize};
use switchyard_core::event::Event;

/// Someone asked for a README for an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadmeRequested {
    pub org: String,
    pub repo: String,
    pub issue_number: i64,
    pub ask: String,
}

impl Event for ReadmeRequested {
    const EVENT_TYPE: &'static str = "ReadmeRequested";
}

/// A README draft was generated. `readme` is empty when generation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadmeGenerated {
    pub org: String,
    pub repo: String,
    pub issue_number: i64,
    pub readme: String,
}

impl Event for ReadmeGenerated {
    const EVENT_TYPE: &'static str = "ReadmeGenerated";
}

/// The README conversation for an issue is finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadmeChainClosed {
    pub org: String,
    pub repo: String,
    pub issue_number: i64,
}

impl Event for ReadmeChainClosed {
    const EVENT_TYPE: &'static str = "ReadmeChainClosed";
}

/// The final README, ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadmeCreated {
    pub readme: String,
}

impl Event for ReadmeCreated {
    const EVENT_TYPE: &'static str = "ReadmeCreated";
}
