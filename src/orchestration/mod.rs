//! Agent orchestration: discovery, single-message dispatch and the pipeline

pub mod discovery;
pub mod dispatch;
pub mod pipeline;

pub use discovery::{
    discover, test_communication, AgentStatus, CommunicationReport, DiscoveryResult, ProbeResult,
    ProbeStatus,
};
pub use dispatch::{send_to_agent, DispatchError, DispatchResult};
pub use pipeline::{
    PipelineOptions, WorkflowError, WorkflowKind, WorkflowPipeline, WorkflowRequest,
    WorkflowResult,
};
