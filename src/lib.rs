//! # Multi-Agent Research
//!
//! A research pipeline built on the Rig framework: generate search queries,
//! gather and dedupe web sources, extract findings, critique them (looping
//! back once or twice when quality is low), synthesize a structured report
//! and score it with deterministic heuristics.
//!
//! ```text
//! Config ─▶ LlmGateway + SearchGateway ─▶ ResearchPipeline ─▶ JobStore ─▶ export
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// Configuration management
pub mod config;

/// Error taxonomy
pub mod error;

/// Lenient JSON extraction from model replies
pub mod extract;

/// Research state and stage outputs
pub mod state;

/// LLM gateway
pub mod llm;

/// Web search gateway and backends
pub mod search;

/// Researcher, critic and synthesizer stages
pub mod agents;

/// Stage sequencing and the revision loop
pub mod workflow;

/// Heuristic quality scoring
pub mod evaluation;

/// In-process background jobs
pub mod jobs;

/// Citations and Markdown rendering
pub mod export;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// RE-EXPORTS
// =============================================================================
pub use config::{Config, PipelineSettings};
pub use error::{ConfigError, JobError, LlmError, ResearchError, SearchError};
pub use evaluation::{EvaluationPreset, Evaluator};
pub use export::{render_markdown, CitationStyle};
pub use jobs::{JobEvent, JobId, JobSnapshot, JobStatus, JobStore, ResearchRequest};
pub use llm::{CompletionRequest, LlmGateway, LlmProvider, RigLlmGateway};
pub use search::{SearchGateway, SearchProvider};
pub use state::{
    AgentStatus, Critique, Finding, Grade, Report, ResearchState, Scores, Section, Source, Stage,
};
pub use workflow::{NoopObserver, ResearchPipeline, Route, StageObserver};
