//! The product manager: turns an ask into a README draft.

use async_trait::async_trait;
use switchyard_core::Result;
use switchyard_core::event::Envelope;
use switchyard_core::message::{ChatHistory, Role};
use switchyard_runtime::{Agent, AgentContext, AgentDefinition};
use tracing::{debug, info};

use super::events::{ReadmeChainClosed, ReadmeCreated, ReadmeGenerated, ReadmeRequested};
use super::skills;
use super::TOPIC;
use crate::pipeline::GenerationPipeline;

pub const AGENT_TYPE: &str = "ProductManager";

const WAF_TAG: &str = "waf";
const WAF_INSTRUCTION: &str = "Consider the following architectural guidelines:!waf!";

pub struct ProductManager {
    pipeline: GenerationPipeline,
    history: ChatHistory,
}

impl ProductManager {
    pub fn new(pipeline: GenerationPipeline) -> Self {
        Self {
            pipeline,
            history: ChatHistory::new(),
        }
    }

    /// Subscribed to `devteam`; one instance per routing key, each with its
    /// own history.
    pub fn definition(pipeline: GenerationPipeline) -> AgentDefinition {
        AgentDefinition::new(AGENT_TYPE, move |_| Box::new(ProductManager::new(pipeline.clone())))
            .subscribe(TOPIC)
            .handles::<ReadmeRequested>()
            .handles::<ReadmeChainClosed>()
    }

    /// Draft a README for `ask`. Empty when generation failed.
    pub async fn create_readme(&mut self, ask: &str) -> String {
        self.pipeline
            .generate(&mut self.history, ask, skills::README, WAF_INSTRUCTION, WAF_TAG)
            .await
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// The most recent draft in the history, or empty if none was produced.
    pub fn last_readme(&self) -> String {
        self.history
            .last_by(Role::Assistant)
            .map(|entry| entry.content.clone())
            .unwrap_or_default()
    }

    async fn on_readme_requested(&mut self, envelope: &Envelope, ctx: &AgentContext) -> Result<()> {
        let request: ReadmeRequested = envelope.decode()?;
        info!(
            agent = %ctx.agent_id(),
            org = %request.org,
            repo = %request.repo,
            issue = request.issue_number,
            "README requested"
        );

        let readme = self.create_readme(&request.ask).await;
        let generated = ReadmeGenerated {
            org: request.org,
            repo: request.repo,
            issue_number: request.issue_number,
            readme,
        };

        if envelope.is_request() {
            ctx.send_response(envelope, &generated).await
        } else {
            ctx.publish(&generated, ctx.agent_id().key()).await
        }
    }

    async fn on_chain_closed(&mut self, envelope: &Envelope, ctx: &AgentContext) -> Result<()> {
        let closed: ReadmeChainClosed = envelope.decode()?;
        let readme = self.last_readme();
        info!(
            agent = %ctx.agent_id(),
            issue = closed.issue_number,
            chars = readme.len(),
            "README chain closed"
        );
        ctx.publish(&ReadmeCreated { readme }, ctx.agent_id().key()).await
    }
}

#[async_trait]
impl Agent for ProductManager {
    async fn handle(&mut self, envelope: Envelope, ctx: &AgentContext) -> Result<()> {
        if envelope.is::<ReadmeRequested>() {
            self.on_readme_requested(&envelope, ctx).await
        } else if envelope.is::<ReadmeChainClosed>() {
            self.on_chain_closed(&envelope, ctx).await
        } else {
            debug!(event_type = envelope.event_type(), "Ignoring unhandled envelope");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedBackend;
    use std::sync::Arc;
    use switchyard_core::error::GenerationError;

    #[tokio::test]
    async fn create_readme_returns_backend_text() {
        let backend = Arc::new(ScriptedBackend::text("# CLI Tool\n..."));
        let mut pm = ProductManager::new(GenerationPipeline::new(backend.clone()));

        assert_eq!(pm.create_readme("build a CLI tool").await, "# CLI Tool\n...");
        assert_eq!(pm.last_readme(), "# CLI Tool\n...");

        let calls = backend.calls();
        assert_eq!(calls[0].0, skills::README);
        assert_eq!(calls[0].1.get("input"), Some("user: build a CLI tool"));
        assert_eq!(
            calls[0].1.get(WAF_TAG),
            Some("Consider the following architectural guidelines:")
        );
    }

    #[tokio::test]
    async fn create_readme_swallows_generation_errors() {
        let backend = Arc::new(ScriptedBackend::failing(GenerationError::Timeout("300s".into())));
        let mut pm = ProductManager::new(GenerationPipeline::new(backend));

        assert_eq!(pm.create_readme("build a CLI tool").await, "");
        assert_eq!(pm.last_readme(), "");
    }

    #[tokio::test]
    async fn history_accumulates_across_asks() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok("draft one".into()),
            Ok("draft two".into()),
        ]));
        let mut pm = ProductManager::new(GenerationPipeline::new(backend.clone()));

        pm.create_readme("build a CLI tool").await;
        pm.create_readme("add a --json flag").await;

        assert_eq!(pm.history().len(), 4);
        assert_eq!(pm.last_readme(), "draft two");
        assert_eq!(
            backend.calls()[1].1.get("input"),
            Some("user: build a CLI tool\nassistant: draft one\nuser: add a --json flag")
        );
    }

    #[test]
    fn definition_declares_devteam_handlers() {
        let pipeline = GenerationPipeline::new(Arc::new(ScriptedBackend::text("x")));
        let def = ProductManager::definition(pipeline);
        assert_eq!(def.agent_type(), AGENT_TYPE);
        assert_eq!(def.topics(), [TOPIC.to_string()]);
        assert_eq!(def.handled_types().len(), 2);
    }
}
