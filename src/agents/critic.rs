//! Critic stage: one LLM call producing the quality verdict that drives
//! the revision decision.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use super::prompts::ResearchPrompts;
use crate::config::PipelineSettings;
use crate::error::LlmError;
use crate::extract::{self, lenient};
use crate::llm::{CompletionRequest, LlmGateway};
use crate::state::{Critique, Finding};

/// Score assumed when the model omits one.
const DEFAULT_QUALITY_SCORE: f64 = 0.8;

pub struct Critic {
    llm: Arc<dyn LlmGateway>,
    settings: PipelineSettings,
}

impl Critic {
    pub fn new(llm: Arc<dyn LlmGateway>, settings: PipelineSettings) -> Self {
        Self { llm, settings }
    }

    pub async fn run(
        &self,
        query: &str,
        findings: &[Finding],
        source_count: usize,
    ) -> Result<Critique, LlmError> {
        info!(findings = findings.len(), sources = source_count, "Critic: evaluating quality");

        let request = CompletionRequest::new(ResearchPrompts::critique(query, findings, source_count))
            .with_max_tokens(self.settings.critique_tokens)
            .with_temperature(self.settings.temperature);
        let reply = self.llm.complete(&request).await?;

        let critique = critique_from_value(&extract::parse(&reply, fallback()));
        info!(quality_score = critique.quality_score, "Critic: complete");
        Ok(critique)
    }
}

fn fallback() -> Value {
    json!({
        "quality_score": DEFAULT_QUALITY_SCORE,
        "strengths": ["Good coverage"],
        "weaknesses": ["Could be deeper"],
    })
}

fn critique_from_value(value: &Value) -> Critique {
    let quality_score = value
        .get("quality_score")
        .and_then(lenient::number)
        .filter(|score| score.is_finite())
        .unwrap_or(DEFAULT_QUALITY_SCORE)
        .clamp(0.0, 1.0);

    Critique {
        quality_score,
        strengths: value.get("strengths").map(lenient::string_list).unwrap_or_default(),
        weaknesses: value.get("weaknesses").map(lenient::string_list).unwrap_or_default(),
    }
}
