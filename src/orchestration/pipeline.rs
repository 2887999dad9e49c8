//! Research -> analysis -> writing pipeline
//!
//! Stages run strictly in order and each one waits for its predecessor's
//! downstream call. The first failing stage aborts the run; results gathered
//! so far are dropped and the error names the stage that failed. Nothing is
//! retried.

use crate::agent::{
    payload_text, AgentError, AgentPayload, AgentRole, Message, PROTOCOL_LABEL,
};
use crate::config::PipelineConfig;
use crate::registry::AgentRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Which flavor of the pipeline to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    /// Full pipeline; opens detached live-update streams once all stages finish
    ResearchAnalysisWrite,
    /// Same stages, no live updates
    Simple,
}

impl WorkflowKind {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowKind::ResearchAnalysisWrite => "research-analysis-write",
            WorkflowKind::Simple => "simple-research-analysis-write",
        }
    }

    fn note(&self) -> &'static str {
        match self {
            WorkflowKind::ResearchAnalysisWrite => "Using Mastra Cloud API for agent communication",
            WorkflowKind::Simple => "Simple workflow using Mastra Cloud API",
        }
    }

    pub fn live_updates(&self) -> bool {
        matches!(self, WorkflowKind::ResearchAnalysisWrite)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    pub topic: String,
    pub target_audience: String,
}

impl WorkflowRequest {
    pub fn new(topic: impl Into<String>, target_audience: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            target_audience: target_audience.into(),
        }
    }

    fn validate(&self) -> Result<(), WorkflowError> {
        if self.topic.trim().is_empty() {
            return Err(WorkflowError::InvalidRequest("topic is required".to_string()));
        }
        if self.target_audience.trim().is_empty() {
            return Err(WorkflowError::InvalidRequest(
                "targetAudience is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid workflow request: {0}")]
    InvalidRequest(String),

    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: AgentRole,
        #[source]
        source: AgentError,
    },
}

impl WorkflowError {
    /// Stage that aborted the run, if it got that far
    pub fn stage(&self) -> Option<AgentRole> {
        match self {
            WorkflowError::StageFailed { stage, .. } => Some(*stage),
            WorkflowError::InvalidRequest(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageResponses {
    pub research: AgentPayload,
    pub analysis: AgentPayload,
    pub writing: AgentPayload,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub workflow: &'static str,
    pub topic: String,
    pub target_audience: String,
    pub responses: StageResponses,
    pub timestamp: DateTime<Utc>,
    pub protocol: &'static str,
    pub note: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Include the research stage's text in the analysis prompt
    pub feed_forward: bool,
    /// How long one live-update stream may stay open before it is dropped
    pub live_update_timeout: Duration,
    /// Live-update streams open at once across all runs (0 = unbounded)
    pub max_live_updates: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl PipelineOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            feed_forward: config.feed_forward,
            live_update_timeout: Duration::from_secs(config.live_update_timeout_secs),
            max_live_updates: config.max_live_updates,
        }
    }
}

pub fn research_prompt(topic: &str) -> String {
    format!(
        "Please research the topic: {}. Provide comprehensive findings with sources and insights.",
        topic
    )
}

pub fn analysis_prompt(topic: &str, target_audience: &str, findings: Option<&str>) -> String {
    let mut prompt = format!(
        "Please analyze the research findings for topic: {}. Target audience: {}.",
        topic, target_audience
    );
    if let Some(findings) = findings {
        prompt.push_str("\n\nResearch findings:\n");
        prompt.push_str(findings);
    }
    prompt
}

pub fn writing_prompt(topic: &str, target_audience: &str) -> String {
    format!(
        "Please create content for topic: {}. Target audience: {}. Content type: report.",
        topic, target_audience
    )
}

fn live_update_slots(options: &PipelineOptions) -> Option<Arc<Semaphore>> {
    let max = options.max_live_updates;
    (max > 0).then(|| Arc::new(Semaphore::new(max)))
}

pub struct WorkflowPipeline {
    registry: Arc<AgentRegistry>,
    options: PipelineOptions,
    /// Shared by every run; `None` means unbounded
    live_update_slots: Option<Arc<Semaphore>>,
}

impl WorkflowPipeline {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        let options = PipelineOptions::default();
        Self {
            registry,
            live_update_slots: live_update_slots(&options),
            options,
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.live_update_slots = live_update_slots(&options);
        self.options = options;
        self
    }

    /// Run all three stages for `request`
    ///
    /// Live-update streams opened by the full workflow keep running on their
    /// own tasks after this returns.
    pub async fn run(
        &self,
        kind: WorkflowKind,
        request: &WorkflowRequest,
    ) -> Result<WorkflowResult, WorkflowError> {
        let (result, _live_updates) = self.run_with_updates(kind, request).await?;
        Ok(result)
    }

    /// Like [`run`](Self::run), but hands back the live-update tasks so the
    /// caller can wait for them
    pub async fn run_with_updates(
        &self,
        kind: WorkflowKind,
        request: &WorkflowRequest,
    ) -> Result<(WorkflowResult, Vec<JoinHandle<()>>), WorkflowError> {
        request.validate()?;
        let topic = request.topic.as_str();
        let audience = request.target_audience.as_str();

        tracing::info!(
            "Starting {} workflow: {} for {}",
            kind.name(),
            topic,
            audience
        );

        let research_text = research_prompt(topic);
        tracing::info!("Step 1: sending research message");
        let research = self.run_stage(AgentRole::Research, &research_text).await?;

        let findings = self
            .options
            .feed_forward
            .then(|| payload_text(&research));
        let analysis_text = analysis_prompt(topic, audience, findings.as_deref());
        tracing::info!("Step 2: sending analysis message");
        let analysis = self.run_stage(AgentRole::Analysis, &analysis_text).await?;

        let writing_text = writing_prompt(topic, audience);
        tracing::info!("Step 3: sending writing message");
        let writing = self.run_stage(AgentRole::Writing, &writing_text).await?;

        tracing::info!("{} workflow completed", kind.name());

        let live_updates = if kind.live_updates() {
            self.spawn_live_updates(vec![
                (AgentRole::Research, research_text),
                (AgentRole::Analysis, analysis_text),
                (AgentRole::Writing, writing_text),
            ])
        } else {
            Vec::new()
        };

        let result = WorkflowResult {
            workflow: kind.name(),
            topic: request.topic.clone(),
            target_audience: request.target_audience.clone(),
            responses: StageResponses {
                research,
                analysis,
                writing,
            },
            timestamp: Utc::now(),
            protocol: PROTOCOL_LABEL,
            note: kind.note(),
        };
        Ok((result, live_updates))
    }

    async fn run_stage(
        &self,
        stage: AgentRole,
        prompt: &str,
    ) -> Result<AgentPayload, WorkflowError> {
        let message = Message::user(prompt);
        self.registry
            .client(stage)
            .generate(std::slice::from_ref(&message))
            .await
            .map_err(|source| {
                tracing::error!("Workflow {} stage failed: {}", stage, source);
                WorkflowError::StageFailed { stage, source }
            })
    }

    /// Open one best-effort streaming channel per stage on background tasks
    ///
    /// Each stream holds a live-update slot for as long as it is open and is
    /// dropped once `live_update_timeout` elapses. A stage is skipped when no
    /// slot is free. Outcomes are only logged.
    pub fn spawn_live_updates(&self, stages: Vec<(AgentRole, String)>) -> Vec<JoinHandle<()>> {
        let budget = self.options.live_update_timeout;
        stages
            .into_iter()
            .filter_map(|(role, text)| {
                let permit = match &self.live_update_slots {
                    Some(slots) => match Arc::clone(slots).try_acquire_owned() {
                        Ok(permit) => Some(permit),
                        Err(_) => {
                            tracing::debug!("No free slot, skipping live update for {}", role);
                            return None;
                        }
                    },
                    None => None,
                };
                let client = self.registry.client(role);
                Some(tokio::spawn(async move {
                    let _permit = permit;
                    let stream = client.send_streaming_message(Message::user(text));
                    match tokio::time::timeout(budget, stream).await {
                        Ok(Ok(_)) => tracing::debug!("Live update stream for {} finished", role),
                        Ok(Err(e)) => {
                            tracing::debug!("Live update stream for {} failed: {}", role, e)
                        }
                        Err(_) => tracing::debug!(
                            "Live update stream for {} closed after {:?}",
                            role,
                            budget
                        ),
                    }
                }))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::{registry_with, FakeAgent};
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn echo_registry() -> (Arc<FakeAgent>, Arc<FakeAgent>, Arc<FakeAgent>, Arc<AgentRegistry>) {
        let research = FakeAgent::replying(json!({"text": "research-echo"}));
        let writing = FakeAgent::replying(json!({"text": "writing-echo"}));
        let analysis = FakeAgent::replying(json!({"text": "analysis-echo"}));
        let registry = Arc::new(registry_with(
            research.clone(),
            writing.clone(),
            analysis.clone(),
        ));
        (research, writing, analysis, registry)
    }

    #[tokio::test]
    async fn test_pipeline_collects_each_stage() {
        let (research, writing, analysis, registry) = echo_registry();
        let pipeline = WorkflowPipeline::new(registry);

        let result = pipeline
            .run(
                WorkflowKind::Simple,
                &WorkflowRequest::new("AI trends", "executives"),
            )
            .await
            .unwrap();

        assert_eq!(result.workflow, "simple-research-analysis-write");
        assert_eq!(result.topic, "AI trends");
        assert_eq!(result.target_audience, "executives");
        assert_eq!(result.responses.research["text"], "research-echo");
        assert_eq!(result.responses.analysis["text"], "analysis-echo");
        assert_eq!(result.responses.writing["text"], "writing-echo");

        assert_eq!(
            research.prompts.lock().unwrap().as_slice(),
            [research_prompt("AI trends")]
        );
        assert_eq!(
            analysis.prompts.lock().unwrap().as_slice(),
            [analysis_prompt("AI trends", "executives", None)]
        );
        assert_eq!(
            writing.prompts.lock().unwrap().as_slice(),
            [writing_prompt("AI trends", "executives")]
        );
    }

    #[tokio::test]
    async fn test_writing_failure_aborts_pipeline() {
        let research = FakeAgent::replying(json!("r"));
        let analysis = FakeAgent::replying(json!("a"));
        let writing = FakeAgent::failing();
        let registry = Arc::new(registry_with(
            research.clone(),
            writing.clone(),
            analysis.clone(),
        ));

        let err = WorkflowPipeline::new(registry)
            .run(
                WorkflowKind::ResearchAnalysisWrite,
                &WorkflowRequest::new("AI trends", "executives"),
            )
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(AgentRole::Writing));
        assert_eq!(research.calls(), 1);
        assert_eq!(analysis.calls(), 1);
        assert_eq!(writing.calls(), 1);
        // No live updates after a failed run
        assert_eq!(research.streams.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_research_failure_skips_later_stages() {
        let analysis = FakeAgent::replying(json!("a"));
        let writing = FakeAgent::replying(json!("w"));
        let registry = Arc::new(registry_with(
            FakeAgent::failing(),
            writing.clone(),
            analysis.clone(),
        ));

        let err = WorkflowPipeline::new(registry)
            .run(WorkflowKind::Simple, &WorkflowRequest::new("t", "a"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(AgentRole::Research));
        assert_eq!(analysis.calls(), 0);
        assert_eq!(writing.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_fields_rejected_before_any_call() {
        let (research, _, _, registry) = echo_registry();
        let pipeline = WorkflowPipeline::new(registry);

        let err = pipeline
            .run(WorkflowKind::Simple, &WorkflowRequest::new("  ", "execs"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidRequest(_)));
        assert_eq!(err.stage(), None);

        let err = pipeline
            .run(WorkflowKind::Simple, &WorkflowRequest::new("AI", ""))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("targetAudience"));
        assert_eq!(research.calls(), 0);
    }

    #[tokio::test]
    async fn test_feed_forward_passes_findings() {
        let (_, _, analysis, registry) = echo_registry();
        let pipeline =
            WorkflowPipeline::new(registry).with_options(PipelineOptions {
                feed_forward: true,
                ..PipelineOptions::default()
            });

        pipeline
            .run(WorkflowKind::Simple, &WorkflowRequest::new("AI", "execs"))
            .await
            .unwrap();

        let prompts = analysis.prompts.lock().unwrap();
        assert!(prompts[0].ends_with("Research findings:\nresearch-echo"));
    }

    #[tokio::test]
    async fn test_live_updates_only_for_full_workflow() {
        let (research, writing, analysis, registry) = echo_registry();
        let pipeline = WorkflowPipeline::new(registry);

        pipeline
            .run(WorkflowKind::Simple, &WorkflowRequest::new("AI", "execs"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(research.streams.load(Ordering::SeqCst), 0);

        pipeline
            .run(
                WorkflowKind::ResearchAnalysisWrite,
                &WorkflowRequest::new("AI", "execs"),
            )
            .await
            .unwrap();

        let opened = || {
            [&research, &writing, &analysis]
                .iter()
                .map(|a| a.streams.load(Ordering::SeqCst))
                .sum::<usize>()
        };
        for _ in 0..50 {
            if opened() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(opened(), 3);
    }

    #[tokio::test]
    async fn test_run_with_updates_hands_back_stream_tasks() {
        let (research, writing, analysis, registry) = echo_registry();
        let pipeline = WorkflowPipeline::new(registry);
        let request = WorkflowRequest::new("AI", "execs");

        let (_, handles) = pipeline
            .run_with_updates(WorkflowKind::Simple, &request)
            .await
            .unwrap();
        assert!(handles.is_empty());

        let (result, handles) = pipeline
            .run_with_updates(WorkflowKind::ResearchAnalysisWrite, &request)
            .await
            .unwrap();
        assert_eq!(result.workflow, "research-analysis-write");
        assert_eq!(handles.len(), 3);
        for handle in handles {
            handle.await.unwrap();
        }
        for agent in [&research, &writing, &analysis] {
            assert_eq!(agent.streams.load(Ordering::SeqCst), 1);
        }
    }

    fn hanging_stream_registry() -> (Vec<Arc<FakeAgent>>, Arc<AgentRegistry>) {
        let agents: Vec<_> = (0..3)
            .map(|_| FakeAgent::with_hanging_streams(json!({"text": "ok"})))
            .collect();
        let registry = Arc::new(registry_with(
            agents[0].clone(),
            agents[1].clone(),
            agents[2].clone(),
        ));
        (agents, registry)
    }

    fn count(agents: &[Arc<FakeAgent>], counter: fn(&FakeAgent) -> usize) -> usize {
        agents.iter().map(|a| counter(a)).sum()
    }

    #[tokio::test]
    async fn test_open_live_updates_are_capped_across_runs() {
        let (agents, registry) = hanging_stream_registry();
        let pipeline = WorkflowPipeline::new(registry).with_options(PipelineOptions {
            live_update_timeout: Duration::from_secs(60),
            max_live_updates: 3,
            ..PipelineOptions::default()
        });

        for _ in 0..5 {
            pipeline
                .run(
                    WorkflowKind::ResearchAnalysisWrite,
                    &WorkflowRequest::new("AI", "execs"),
                )
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(count(&agents, |a| a.open_streams.load(Ordering::SeqCst)), 3);
        assert_eq!(count(&agents, |a| a.streams.load(Ordering::SeqCst)), 3);
    }

    #[tokio::test]
    async fn test_stuck_live_updates_are_closed_and_free_their_slots() {
        let (agents, registry) = hanging_stream_registry();
        let pipeline = WorkflowPipeline::new(registry).with_options(PipelineOptions {
            live_update_timeout: Duration::from_millis(20),
            max_live_updates: 3,
            ..PipelineOptions::default()
        });
        let request = WorkflowRequest::new("AI", "execs");

        for round in 1..=2 {
            let (_, handles) = pipeline
                .run_with_updates(WorkflowKind::ResearchAnalysisWrite, &request)
                .await
                .unwrap();
            assert_eq!(handles.len(), 3);
            for handle in handles {
                handle.await.unwrap();
            }
            assert_eq!(count(&agents, |a| a.open_streams.load(Ordering::SeqCst)), 0);
            assert_eq!(count(&agents, |a| a.streams.load(Ordering::SeqCst)), 3 * round);
        }
    }

    #[tokio::test]
    async fn test_live_update_failures_are_swallowed() {
        let registry = Arc::new(registry_with(
            FakeAgent::failing(),
            FakeAgent::failing(),
            FakeAgent::failing(),
        ));
        let pipeline = WorkflowPipeline::new(registry);

        let handles = pipeline.spawn_live_updates(vec![(AgentRole::Research, "x".to_string())]);
        for handle in handles {
            assert!(handle.await.is_ok());
        }
    }

    #[test]
    fn test_workflow_result_json_shape() {
        let result = WorkflowResult {
            workflow: WorkflowKind::ResearchAnalysisWrite.name(),
            topic: "AI".to_string(),
            target_audience: "execs".to_string(),
            responses: StageResponses {
                research: json!(1),
                analysis: json!(2),
                writing: json!(3),
            },
            timestamp: Utc::now(),
            protocol: PROTOCOL_LABEL,
            note: WorkflowKind::ResearchAnalysisWrite.note(),
        };
        let value = serde_json::to_value(result).unwrap();
        assert_eq!(value["workflow"], "research-analysis-write");
        assert_eq!(value["targetAudience"], "execs");
        assert_eq!(value["responses"]["writing"], 3);
    }
}
