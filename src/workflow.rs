//! # Workflow Controller
//!
//! Sequences the stages over one [`ResearchState`] with a single bounded
//! revision loop:
//!
//! ```text
//!   researcher ──▶ critic ──┬──▶ synthesizer ──▶ evaluator ──▶ end
//!       ▲                   │
//!       └──── revise ───────┤
//!                           └──▶ end (error)
//! ```
//!
//! The branch after the critic is decided by [`route_after_critique`], a
//! pure function, so the graph can be tested without any gateway.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::agents::{Critic, Researcher, Synthesizer};
use crate::config::PipelineSettings;
use crate::error::ResearchError;
use crate::evaluation::Evaluator;
use crate::llm::LlmGateway;
use crate::search::SearchGateway;
use crate::state::{AgentStatus, ResearchState, Stage};

/// Outcome of the post-critique decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Run the researcher again with the critique as feedback
    Revise,
    Synthesize,
    End,
}

/// Decide where the graph goes after the critic.
///
/// A recorded error ends the run. Otherwise the researcher runs again while
/// quality is below `threshold` and revisions remain. A missing score never
/// triggers a revision.
pub fn route_after_critique(
    error: Option<&str>,
    quality_score: Option<f64>,
    iteration: u32,
    max_iterations: u32,
    threshold: f64,
) -> Route {
    if error.is_some() {
        return Route::End;
    }
    let score = quality_score.unwrap_or(1.0);
    if score < threshold && iteration < max_iterations {
        Route::Revise
    } else {
        Route::Synthesize
    }
}

/// Receives stage transitions as they happen.
#[async_trait]
pub trait StageObserver: Send + Sync {
    async fn stage_started(&self, _stage: Stage) {}

    async fn stage_finished(&self, _stage: Stage) {}
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl StageObserver for NoopObserver {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Stage(Stage),
    End,
}

/// The four stages wired together with their shared gateways.
pub struct ResearchPipeline {
    researcher: Researcher,
    critic: Critic,
    synthesizer: Synthesizer,
    evaluator: Evaluator,
    settings: PipelineSettings,
}

impl ResearchPipeline {
    pub fn new(
        llm: Arc<dyn LlmGateway>,
        search: Arc<dyn SearchGateway>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            researcher: Researcher::new(llm.clone(), search, settings.clone()),
            critic: Critic::new(llm.clone(), settings.clone()),
            synthesizer: Synthesizer::new(llm, settings.clone()),
            evaluator: Evaluator::new(settings.evaluation_preset),
            settings,
        }
    }

    /// Fresh state bounded by the configured iteration limit.
    pub fn initial_state(&self, query: impl Into<String>) -> ResearchState {
        ResearchState::new(query, self.settings.max_iterations)
    }

    /// Run a query from scratch and return the finished state.
    pub async fn research(
        &self,
        query: &str,
        observer: &dyn StageObserver,
    ) -> Result<ResearchState, ResearchError> {
        let mut state = self.initial_state(query);
        self.run(&mut state, observer).await?;
        Ok(state)
    }

    /// Drive `state` through the graph until `end`.
    ///
    /// On a stage failure the stage is marked `error`, the message is
    /// recorded in `state.error` and the error is returned.
    pub async fn run(
        &self,
        state: &mut ResearchState,
        observer: &dyn StageObserver,
    ) -> Result<(), ResearchError> {
        let mut node = Node::Stage(Stage::Researcher);

        while let Node::Stage(stage) = node {
            state.set_status(stage, AgentStatus::Running);
            observer.stage_started(stage).await;

            let next = match self.step(stage, state).await {
                Ok(next) => next,
                Err(e) => {
                    error!(stage = %stage, error = %e, "Stage failed");
                    state.set_status(stage, AgentStatus::Error);
                    state.error = Some(e.to_string());
                    return Err(e);
                }
            };

            state.set_status(stage, AgentStatus::Completed);
            observer.stage_finished(stage).await;
            node = next;
        }

        info!(
            iterations = state.iteration,
            grade = ?state.evaluation.as_ref().map(|s| s.grade),
            "Research workflow complete"
        );
        Ok(())
    }

    /// Execute one stage, write its output into `state`, return the next node.
    async fn step(&self, stage: Stage, state: &mut ResearchState) -> Result<Node, ResearchError> {
        match stage {
            Stage::Researcher => {
                let feedback = if state.iteration > 0 {
                    state.critique.as_ref()
                } else {
                    None
                };
                let output = self.researcher.run(state.query(), feedback).await?;
                state.search_queries = output.search_queries;
                state.sources = output.sources;
                state.findings = output.findings;
                Ok(Node::Stage(Stage::Critic))
            }
            Stage::Critic => {
                let critique = self
                    .critic
                    .run(state.query(), &state.findings, state.sources.len())
                    .await?;
                state.critique = Some(critique);

                let route = route_after_critique(
                    state.error.as_deref(),
                    state.critique.as_ref().map(|c| c.quality_score),
                    state.iteration,
                    state.max_iterations,
                    self.settings.revision_threshold,
                );
                info!(route = ?route, iteration = state.iteration, "Critic routing decision");

                Ok(match route {
                    Route::Revise => {
                        state.iteration += 1;
                        Node::Stage(Stage::Researcher)
                    }
                    Route::Synthesize => Node::Stage(Stage::Synthesizer),
                    Route::End => Node::End,
                })
            }
            Stage::Synthesizer => {
                let report = self.synthesizer.run(state.query(), &state.findings).await?;
                state.synthesis = Some(report);
                Ok(Node::Stage(Stage::Evaluator))
            }
            Stage::Evaluator => {
                let scores = self.evaluator.evaluate(
                    state.query(),
                    &state.findings,
                    state.synthesis.as_ref(),
                    &state.sources,
                );
                info!(overall = scores.overall, grade = %scores.grade, "Evaluator: complete");
                state.evaluation = Some(scores);
                Ok(Node::End)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Grade, Source};
    use crate::testing::{ScriptedLlm, ScriptedSearch};
    use std::sync::Mutex;

    const QUERIES: &str = "rag basics\nrag retrieval\nrag evaluation";
    const FINDINGS: &str = r#"{"findings": [{"finding": "RAG retrieves documents", "evidence": "paper"}]}"#;
    const SYNTHESIS: &str = r#"{"title": "RAG", "executive_summary": "RAG retrieves documents before answering.", "sections": [], "key_takeaways": ["one"]}"#;

    fn critique(score: f64) -> String {
        format!(r#"{{"quality_score": {score}, "strengths": [], "weaknesses": ["needs benchmarks"]}}"#)
    }

    fn search() -> Arc<ScriptedSearch> {
        Arc::new(
            ScriptedSearch::default()
                .with_results("rag basics", vec![Source::new("A", "https://a.example", "rag text")]),
        )
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl StageObserver for Recorder {
        async fn stage_started(&self, stage: Stage) {
            self.0.lock().unwrap().push(format!("start:{stage}"));
        }

        async fn stage_finished(&self, stage: Stage) {
            self.0.lock().unwrap().push(format!("done:{stage}"));
        }
    }

    #[test]
    fn test_route_revises_only_below_threshold_with_budget() {
        assert_eq!(route_after_critique(None, Some(0.69), 0, 2, 0.7), Route::Revise);
        assert_eq!(route_after_critique(None, Some(0.69), 1, 2, 0.7), Route::Revise);
        assert_eq!(route_after_critique(None, Some(0.69), 2, 2, 0.7), Route::Synthesize);
        assert_eq!(route_after_critique(None, Some(0.7), 0, 2, 0.7), Route::Synthesize);
        assert_eq!(route_after_critique(None, None, 0, 2, 0.7), Route::Synthesize);
    }

    #[test]
    fn test_route_ends_on_error() {
        assert_eq!(route_after_critique(Some("boom"), Some(0.1), 0, 2, 0.7), Route::End);
    }

    #[tokio::test]
    async fn test_high_quality_goes_straight_to_synthesis() {
        let llm = Arc::new(ScriptedLlm::new([QUERIES, FINDINGS, critique(0.9).as_str(), SYNTHESIS]));
        let pipeline = ResearchPipeline::new(llm.clone(), search(), PipelineSettings::default());
        let recorder = Recorder::default();

        let state = pipeline.research("What is RAG?", &recorder).await.unwrap();

        assert_eq!(state.iteration, 0);
        assert_eq!(llm.requests().len(), 4);
        assert_eq!(state.sources.len(), 1);
        assert_eq!(state.synthesis.as_ref().unwrap().title, "RAG");
        let scores = state.evaluation.unwrap();
        assert_eq!(scores.grade, Grade::from_score(scores.overall));
        for stage in Stage::ALL {
            assert_eq!(state.agent_status[&stage], AgentStatus::Completed);
        }
        assert_eq!(
            recorder.0.lock().unwrap().first().map(String::as_str),
            Some("start:researcher")
        );
        assert_eq!(recorder.0.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_low_quality_revises_until_budget_exhausted() {
        let low = critique(0.3);
        let llm = Arc::new(ScriptedLlm::new([
            QUERIES, FINDINGS, low.as_str(), QUERIES, FINDINGS, low.as_str(), QUERIES, FINDINGS,
            low.as_str(), SYNTHESIS,
        ]));
        let pipeline = ResearchPipeline::new(llm.clone(), search(), PipelineSettings::default());

        let state = pipeline.research("What is RAG?", &NoopObserver).await.unwrap();

        assert_eq!(state.iteration, 2);
        assert!(state.synthesis.is_some());
        let requests = llm.requests();
        assert_eq!(requests.len(), 10);
        // revision passes carry the critique's weaknesses
        assert!(!requests[0].prompt.contains("needs benchmarks"));
        assert!(requests[3].prompt.contains("needs benchmarks"));
    }

    #[tokio::test]
    async fn test_llm_failure_marks_stage_and_records_error() {
        let llm = Arc::new(ScriptedLlm::failing("503 Service Unavailable"));
        let pipeline = ResearchPipeline::new(llm, search(), PipelineSettings::default());
        let mut state = pipeline.initial_state("q");

        let err = pipeline.run(&mut state, &NoopObserver).await.unwrap_err();

        assert!(err.to_string().contains("503"));
        assert_eq!(state.status_of(Stage::Researcher), AgentStatus::Error);
        assert_eq!(state.status_of(Stage::Critic), AgentStatus::Pending);
        assert_eq!(state.error.as_deref(), Some(err.to_string().as_str()));
    }
}
