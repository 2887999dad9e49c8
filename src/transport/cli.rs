//! One-shot commands that talk to the agents directly and print JSON

use crate::config::Config;
use crate::orchestration::{
    discover, send_to_agent, test_communication, AgentStatus, PipelineOptions, WorkflowKind,
    WorkflowPipeline, WorkflowRequest,
};
use crate::registry::AgentRegistry;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

fn registry_from(config: &Config) -> Result<Arc<AgentRegistry>> {
    let registry = AgentRegistry::from_config(&config.agents, &config.client)
        .context("Failed to build agent registry")?;
    Ok(Arc::new(registry))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print discovery results for every configured agent
pub async fn run_discover(config: &Config) -> Result<()> {
    let registry = registry_from(config)?;
    let results = discover(&registry).await;
    let online = results
        .iter()
        .filter(|r| r.status == AgentStatus::Online)
        .count();
    tracing::info!("{}/{} agents online", online, results.len());
    print_json(&results)
}

/// Probe every agent and print the report
pub async fn run_communication_test(config: &Config) -> Result<()> {
    let registry = registry_from(config)?;
    let report = test_communication(&registry).await;
    print_json(&report)?;
    if !report.all_succeeded() {
        anyhow::bail!("One or more agents failed the communication test");
    }
    Ok(())
}

/// Send one message to the agent registered as `agent_id`
pub async fn run_send(config: &Config, agent_id: &str, message: &str) -> Result<()> {
    let registry = registry_from(config)?;
    let result = send_to_agent(&registry, agent_id, message).await?;
    print_json(&result)
}

/// Run the pipeline once and print the collected responses
///
/// The full workflow then waits for its live-update streams, each bounded by
/// `pipeline.live_update_timeout_secs`, before returning.
pub async fn run_workflow(
    config: &Config,
    topic: String,
    target_audience: String,
    simple: bool,
    feed_forward: bool,
) -> Result<()> {
    let registry = registry_from(config)?;
    let mut options = PipelineOptions::from_config(&config.pipeline);
    options.feed_forward |= feed_forward;
    let kind = if simple {
        WorkflowKind::Simple
    } else {
        WorkflowKind::ResearchAnalysisWrite
    };

    let pipeline = WorkflowPipeline::new(registry).with_options(options);
    let (result, live_updates) = pipeline
        .run_with_updates(kind, &WorkflowRequest::new(topic, target_audience))
        .await?;
    print_json(&result)?;

    if !live_updates.is_empty() {
        tracing::info!("Waiting for {} live update streams", live_updates.len());
        futures::future::join_all(live_updates).await;
    }
    Ok(())
}
