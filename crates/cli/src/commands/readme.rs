//! `switchyard readme`: ask the product manager for a README.

use async_trait::async_trait;
use std::time::Duration;
use switchyard_agent::devteam::{
    product_manager, ReadmeChainClosed, ReadmeCreated, ReadmeGenerated, ReadmeRequested, TOPIC,
};
use switchyard_config::AppConfig;
use switchyard_core::event::{Envelope, Event};
use switchyard_core::identity::AgentId;
use switchyard_runtime::{Agent, AgentContext, AgentDefinition};
use tokio::sync::mpsc;
use tracing::info;

use super::setup::{self, CliResult};

const OBSERVER: &str = "CliObserver";

pub struct ReadmeArgs {
    pub ask: String,
    pub org: String,
    pub repo: String,
    pub issue: i64,
    pub direct: bool,
    pub close: bool,
}

/// Forwards everything it receives to the command.
struct Observer {
    tx: mpsc::UnboundedSender<Envelope>,
}

#[async_trait]
impl Agent for Observer {
    async fn handle(&mut self, envelope: Envelope, _ctx: &AgentContext) -> switchyard_core::Result<()> {
        // The command may already have stopped listening.
        let _ = self.tx.send(envelope);
        Ok(())
    }
}

pub async fn run(config: &AppConfig, args: ReadmeArgs) -> CliResult<()> {
    let backend = setup::backend(config)?;
    let pipeline = setup::pipeline(config, backend)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let observer = AgentDefinition::new(OBSERVER, move |_| Box::new(Observer { tx: tx.clone() }))
        .subscribe(TOPIC)
        .handles::<ReadmeGenerated>()
        .handles::<ReadmeCreated>();

    let runtime = setup::devteam_runtime(config, pipeline, vec![observer])?;
    runtime.start().await?;

    // Generation may take as long as the backend's own HTTP timeout.
    let deadline = Duration::from_secs(config.openai.timeout_secs).max(runtime.request_timeout());
    let client = runtime.client(AgentId::new("Cli", format!("{}-{}-{}", args.org, args.repo, args.issue))?);

    let request = ReadmeRequested {
        org: args.org.clone(),
        repo: args.repo.clone(),
        issue_number: args.issue,
        ask: args.ask,
    };

    println!("📝 Requesting README for {}/{}#{}...", args.org, args.repo, args.issue);

    let generated: ReadmeGenerated = if args.direct {
        let target = AgentId::new(product_manager::AGENT_TYPE, TOPIC)?;
        client
            .send_request_with_timeout(target, &request, deadline)
            .await?
            .decode()?
    } else {
        client.publish(&request, TOPIC).await?;
        next_event(&mut rx, deadline).await?
    };

    if generated.readme.is_empty() {
        println!("⚠️  No content produced (see logs for the generation error)");
    } else {
        println!();
        println!("{}", generated.readme);
    }

    if args.close {
        client
            .publish(
                &ReadmeChainClosed {
                    org: args.org,
                    repo: args.repo,
                    issue_number: args.issue,
                },
                TOPIC,
            )
            .await?;
        let created: ReadmeCreated = next_event(&mut rx, runtime.request_timeout()).await?;
        println!();
        println!("✅ README chain closed ({} chars)", created.readme.len());
    }

    runtime.shutdown();
    Ok(())
}

/// Wait for the next envelope of type `E`, skipping anything else.
async fn next_event<E: Event>(
    rx: &mut mpsc::UnboundedReceiver<Envelope>,
    timeout: Duration,
) -> CliResult<E> {
    tokio::time::timeout(timeout, recv_event(rx))
        .await
        .map_err(|_| format!("no {} within {timeout:?}", E::EVENT_TYPE))?
}

async fn recv_event<E: Event>(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> CliResult<E> {
    while let Some(envelope) = rx.recv().await {
        if envelope.is::<E>() {
            return Ok(envelope.decode::<E>()?);
        }
        info!(event_type = envelope.event_type(), "Skipping envelope");
    }
    Err("observer closed before a reply arrived".into())
}
