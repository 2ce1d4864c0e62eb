//! Synthesizer stage: turns findings into the structured report.
//!
//! A reply without a usable title and summary is replaced by a report
//! assembled from the raw findings, so the stage always yields content.
//! The word count is computed last, over whatever is emitted.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::prompts::{ResearchPrompts, JSON_ONLY_SYSTEM};
use crate::config::PipelineSettings;
use crate::error::LlmError;
use crate::extract::{self, lenient};
use crate::llm::{CompletionRequest, LlmGateway};
use crate::state::{Finding, Report, Section};

/// Longest takeaway lifted verbatim from a finding in the fallback report
const FALLBACK_TAKEAWAY_CHARS: usize = 150;

pub struct Synthesizer {
    llm: Arc<dyn LlmGateway>,
    settings: PipelineSettings,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LlmGateway>, settings: PipelineSettings) -> Self {
        Self { llm, settings }
    }

    pub async fn run(&self, query: &str, findings: &[Finding]) -> Result<Report, LlmError> {
        info!(findings = findings.len(), "Synthesizer: writing report");

        let request = CompletionRequest::new(ResearchPrompts::synthesis(query, findings))
            .with_system(JSON_ONLY_SYSTEM)
            .with_max_tokens(self.settings.synthesis_tokens)
            .with_temperature(self.settings.temperature);
        let reply = self.llm.complete(&request).await?;

        let mut report = match extract::parse_object(&reply).as_ref().and_then(report_from_value) {
            Some(report) => report,
            None => {
                warn!("Synthesizer reply had no usable report, building one from findings");
                fallback_report(query, findings)
            }
        };
        report.refresh_word_count();

        info!(title = %report.title, words = report.word_count, "Synthesizer: complete");
        Ok(report)
    }
}

/// A report from model JSON, or `None` when title or summary is missing.
fn report_from_value(value: &Value) -> Option<Report> {
    let text = |key: &str| {
        value
            .get(key)
            .map(lenient::value_to_string)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };
    let list = |key: &str| value.get(key).map(lenient::string_list).unwrap_or_default();

    let title = text("title");
    let executive_summary = text("executive_summary");
    if title.is_empty() || executive_summary.is_empty() {
        return None;
    }

    let sections = value
        .get("sections")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<Section>(item.clone()).ok())
                .filter(|s| !s.title.is_empty() || !s.content.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Some(Report {
        title,
        executive_summary,
        sections,
        key_takeaways: list("key_takeaways"),
        limitations: list("limitations"),
        further_research: list("further_research"),
        word_count: 0,
    })
}

/// Deterministic report assembled straight from the findings.
pub fn fallback_report(query: &str, findings: &[Finding]) -> Report {
    let claims: Vec<&str> = findings
        .iter()
        .map(|f| f.finding.trim())
        .filter(|f| !f.is_empty())
        .collect();

    let executive_summary = if claims.is_empty() {
        format!("No findings could be extracted for \"{}\".", query)
    } else {
        claims
            .iter()
            .map(|c| {
                if c.ends_with(['.', '!', '?']) {
                    c.to_string()
                } else {
                    format!("{}.", c)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    };

    let sections = if findings.is_empty() {
        Vec::new()
    } else {
        let content = findings
            .iter()
            .map(|f| {
                if f.evidence.trim().is_empty() {
                    format!("- {}", f.finding)
                } else {
                    format!("- {}: {}", f.finding, f.evidence)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        vec![Section::new("Key Findings", content)]
    };

    let key_takeaways = claims
        .iter()
        .take(3)
        .map(|c| truncate_chars(c, FALLBACK_TAKEAWAY_CHARS))
        .collect();

    Report {
        title: format!("Research: {}", query),
        executive_summary,
        sections,
        key_takeaways,
        limitations: vec!["Auto-generated from raw findings".to_string()],
        further_research: vec!["Further research recommended".to_string()],
        word_count: 0,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
