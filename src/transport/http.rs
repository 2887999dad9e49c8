//! HTTP relay: health probes, agent discovery, message dispatch and workflows

use crate::agent::{AgentRole, A2A_PROTOCOL_VERSION};
use crate::config::Config;
use crate::orchestration::{
    discover, send_to_agent, test_communication, DispatchError, PipelineOptions, WorkflowError,
    WorkflowKind, WorkflowPipeline, WorkflowRequest,
};
use crate::registry::AgentRegistry;
use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

const SERVICE_NAME: &str = "Gateway Agent";

/// Shared application state
pub struct AppState {
    registry: Arc<AgentRegistry>,
    pipeline: WorkflowPipeline,
    /// Admission control for pipeline runs; `None` means unbounded
    workflow_slots: Option<Arc<Semaphore>>,
}

impl AppState {
    pub fn new(
        registry: Arc<AgentRegistry>,
        options: PipelineOptions,
        max_concurrent_workflows: usize,
    ) -> Self {
        let pipeline = WorkflowPipeline::new(Arc::clone(&registry)).with_options(options);
        let workflow_slots = (max_concurrent_workflows > 0)
            .then(|| Arc::new(Semaphore::new(max_concurrent_workflows)));
        Self {
            registry,
            pipeline,
            workflow_slots,
        }
    }

    /// Build state from configuration with one HTTP client per agent
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = AgentRegistry::from_config(&config.agents, &config.client)?;
        Ok(Self::new(
            Arc::new(registry),
            PipelineOptions::from_config(&config.pipeline),
            config.server.max_concurrent_workflows,
        ))
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }
}

/// Client-visible error; causes stay in the server log
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Internal {
        message: &'static str,
        stage: Option<AgentRole>,
    },
}

impl ApiError {
    fn internal(message: &'static str) -> Self {
        ApiError::Internal {
            message,
            stage: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(error) => (StatusCode::BAD_REQUEST, json!({ "error": error })),
            ApiError::NotFound(error) => (StatusCode::NOT_FOUND, json!({ "error": error })),
            ApiError::Unavailable(error) => {
                (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": error }))
            }
            ApiError::Internal {
                message,
                stage: Some(stage),
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message, "stage": stage }),
            ),
            ApiError::Internal {
                message,
                stage: None,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

/// Request for single-message dispatch
#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    #[serde(default)]
    message: Option<String>,
}

/// Request body for both workflow endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowBody {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    target_audience: Option<String>,
}

fn required(field: Option<String>, name: &str) -> Result<String, ApiError> {
    field
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{} is required", name)))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        // Credentials rule out a literal wildcard, so echo the caller's origin
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the relay router
pub fn create_router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .route("/api/agents", get(list_agents))
        .route("/api/agents/:agent_id/message", post(send_message))
        .route(
            "/api/workflow/research-analysis-write",
            post(research_analysis_write),
        )
        .route("/api/workflow/simple", post(simple_workflow))
        .route("/api/test/a2a-communication", post(communication_test))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

/// Bind `addr` and serve until the process exits
pub async fn serve(
    state: Arc<AppState>,
    addr: SocketAddr,
    allowed_origins: &[String],
) -> Result<()> {
    let app = create_router(state, allowed_origins);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;

    tracing::info!("Gateway relay listening on {}", local);
    tracing::info!("Health check: GET http://{}/health", local);
    tracing::info!("Agent discovery: GET http://{}/api/agents", local);
    tracing::info!("Send message: POST http://{}/api/agents/{{agentId}}/message", local);
    tracing::info!("Workflow: POST http://{}/api/workflow/research-analysis-write", local);
    tracing::info!("Simple workflow: POST http://{}/api/workflow/simple", local);
    tracing::info!("Communication test: POST http://{}/api/test/a2a-communication", local);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Run the relay with settings from `config`
pub async fn run_http_server(config: &Config) -> Result<()> {
    let state = Arc::new(AppState::from_config(config)?);
    for endpoint in state.registry().endpoints() {
        tracing::info!(
            "{} agent '{}' at {}",
            endpoint.role,
            endpoint.agent_id,
            endpoint.base_url
        );
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    serve(state, addr, &config.server.allowed_origins).await
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn readiness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let agents: Vec<&'static str> = state.registry.roles().map(|r| r.as_str()).collect();
    Json(json!({
        "status": "ready",
        "service": SERVICE_NAME,
        "timestamp": chrono::Utc::now(),
        "agents": agents,
        "a2aProtocol": A2A_PROTOCOL_VERSION,
    }))
}

async fn list_agents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(discover(&state.registry).await)
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let message = required(req.message, "message")?;

    match send_to_agent(&state.registry, &agent_id, &message).await {
        Ok(result) => Ok(Json(result).into_response()),
        Err(e @ DispatchError::NotFound(_)) => Err(ApiError::NotFound(e.to_string())),
        Err(e) => {
            tracing::error!("{}", e);
            Err(ApiError::internal("Failed to send message"))
        }
    }
}

async fn research_analysis_write(
    State(state): State<Arc<AppState>>,
    body: Result<Json<WorkflowBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    execute_workflow(state, WorkflowKind::ResearchAnalysisWrite, body).await
}

async fn simple_workflow(
    State(state): State<Arc<AppState>>,
    body: Result<Json<WorkflowBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    execute_workflow(state, WorkflowKind::Simple, body).await
}

async fn execute_workflow(
    state: Arc<AppState>,
    kind: WorkflowKind,
    body: Result<Json<WorkflowBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let request = WorkflowRequest::new(
        required(body.topic, "topic")?,
        required(body.target_audience, "targetAudience")?,
    );

    let permit = match &state.workflow_slots {
        Some(slots) => Some(Arc::clone(slots).try_acquire_owned().map_err(|_| {
            tracing::warn!("Rejecting {} workflow: too many in flight", kind.name());
            ApiError::Unavailable("Too many workflows in flight".to_string())
        })?),
        None => None,
    };

    let failure_message = match kind {
        WorkflowKind::ResearchAnalysisWrite => "Workflow execution failed",
        WorkflowKind::Simple => "Simple workflow execution failed",
    };

    // An accepted run finishes even if the client goes away
    let task_state = Arc::clone(&state);
    let run = tokio::spawn(async move {
        let _permit = permit;
        task_state.pipeline.run(kind, &request).await
    });

    match run.await {
        Ok(Ok(result)) => Ok(Json(result).into_response()),
        Ok(Err(WorkflowError::InvalidRequest(reason))) => Err(ApiError::BadRequest(reason)),
        Ok(Err(e)) => {
            tracing::error!("{} workflow failed: {}", kind.name(), e);
            Err(ApiError::Internal {
                message: failure_message,
                stage: e.stage(),
            })
        }
        Err(e) => {
            tracing::error!("{} workflow task aborted: {}", kind.name(), e);
            Err(ApiError::internal(failure_message))
        }
    }
}

async fn communication_test(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(test_communication(&state.registry).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_api_error_shapes() {
        let response = ApiError::NotFound("Agent x not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError::Internal {
            message: "Workflow execution failed",
            stage: Some(AgentRole::Writing),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = ApiError::Unavailable("busy".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_required_rejects_blank() {
        assert!(required(Some("  ".to_string()), "topic").is_err());
        assert!(required(None, "topic").is_err());
        assert_eq!(required(Some("AI".to_string()), "topic").unwrap(), "AI");
    }
}
