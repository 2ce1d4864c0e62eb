//! # Evaluation Engine
//!
//! Deterministic quality heuristics over a finished research state. No LLM
//! calls: every metric is a pure function of the findings, the report and
//! the sources, bounded to [0, 1].
//!
//! Two presets share the grading thresholds:
//! - [`EvaluationPreset::Standard`]: five lexical/structural metrics with
//!   fixed weights.
//! - [`EvaluationPreset::Compact`]: four count-based metrics, equally
//!   weighted. Citation accuracy is still reported but carries no weight.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::state::{Finding, Grade, Report, Scores, Source};

/// Share of query terms a finding must mention to count as relevant
const RELEVANCY_TERM_SHARE: f64 = 0.3;
/// Summary fragments shorter than this are not treated as claims
const MIN_CLAIM_CHARS: usize = 20;
/// Leading words of a claim checked against the sources
const CLAIM_KEY_WORDS: usize = 5;
/// Shorter words are too common to count as support
const MIN_KEY_WORD_CHARS: usize = 5;
/// Characters of each source's content searched for support
const SOURCE_WINDOW_CHARS: usize = 500;
/// Sources needed for full citation credit
const CITATION_TARGET_SOURCES: f64 = 5.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationPreset {
    #[default]
    Standard,
    Compact,
}

impl EvaluationPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationPreset::Standard => "standard",
            EvaluationPreset::Compact => "compact",
        }
    }

    pub fn weights(&self) -> Weights {
        match self {
            EvaluationPreset::Standard => Weights {
                relevancy: 0.25,
                faithfulness: 0.25,
                coherence: 0.20,
                completeness: 0.15,
                citation_accuracy: 0.15,
            },
            EvaluationPreset::Compact => Weights {
                relevancy: 0.25,
                faithfulness: 0.25,
                coherence: 0.25,
                completeness: 0.25,
                citation_accuracy: 0.0,
            },
        }
    }
}

impl fmt::Display for EvaluationPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvaluationPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(EvaluationPreset::Standard),
            "compact" => Ok(EvaluationPreset::Compact),
            other => Err(ConfigError::InvalidValue {
                name: "EVALUATION_PRESET",
                reason: format!("unknown preset {:?} (expected standard or compact)", other),
            }),
        }
    }
}

/// Metric weights; they sum to 1 for every preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub relevancy: f64,
    pub faithfulness: f64,
    pub coherence: f64,
    pub completeness: f64,
    pub citation_accuracy: f64,
}

impl Weights {
    pub fn total(&self) -> f64 {
        self.relevancy + self.faithfulness + self.coherence + self.completeness + self.citation_accuracy
    }
}

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    preset: EvaluationPreset,
}

impl Evaluator {
    pub fn new(preset: EvaluationPreset) -> Self {
        Self { preset }
    }

    /// Score a finished run. A missing report scores as an empty one.
    pub fn evaluate(
        &self,
        query: &str,
        findings: &[Finding],
        synthesis: Option<&Report>,
        sources: &[Source],
    ) -> Scores {
        let empty = Report::default();
        let report = synthesis.unwrap_or(&empty);

        let (relevancy, faithfulness, coherence, completeness) = match self.preset {
            EvaluationPreset::Standard => (
                relevancy(query, findings),
                faithfulness(synthesis, sources),
                coherence(report),
                completeness(report, sources),
            ),
            EvaluationPreset::Compact => (
                ratio(findings.len() as f64, 4.0),
                ratio(sources.len() as f64, 5.0),
                ratio((report.sections.len() + 1) as f64, 3.0),
                ratio(report.word_count as f64, 400.0),
            ),
        };
        let citation_accuracy = citation_accuracy(sources);

        let w = self.preset.weights();
        let overall = relevancy * w.relevancy
            + faithfulness * w.faithfulness
            + coherence * w.coherence
            + completeness * w.completeness
            + citation_accuracy * w.citation_accuracy;

        Scores {
            relevancy,
            faithfulness,
            coherence,
            completeness,
            citation_accuracy,
            overall,
            grade: Grade::from_score(overall),
        }
    }
}

fn ratio(count: f64, target: f64) -> f64 {
    (count / target).min(1.0)
}

/// Fraction of findings mentioning at least 30% of the query's terms.
pub fn relevancy(query: &str, findings: &[Finding]) -> f64 {
    if findings.is_empty() {
        return 0.0;
    }

    let lowered = query.to_lowercase();
    let mut terms: Vec<&str> = lowered.split_whitespace().collect();
    terms.sort_unstable();
    terms.dedup();
    let needed = terms.len() as f64 * RELEVANCY_TERM_SHARE;

    let relevant = findings
        .iter()
        .filter(|f| {
            let combined = format!("{} {}", f.finding, f.evidence).to_lowercase();
            let matches = terms.iter().filter(|t| combined.contains(**t)).count();
            matches as f64 >= needed
        })
        .count();

    (relevant as f64 / findings.len() as f64).min(1.0)
}

/// Fraction of summary claims whose leading words appear in the sources.
pub fn faithfulness(synthesis: Option<&Report>, sources: &[Source]) -> f64 {
    let Some(report) = synthesis else {
        return 0.0;
    };
    if sources.is_empty() {
        return 0.0;
    }

    let source_text = sources
        .iter()
        .map(|s| s.content.chars().take(SOURCE_WINDOW_CHARS).collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let summary = report.executive_summary.to_lowercase();

    let claims: Vec<&str> = summary
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().count() >= MIN_CLAIM_CHARS)
        .collect();

    let supported = claims
        .iter()
        .filter(|claim| {
            claim
                .split_whitespace()
                .take(CLAIM_KEY_WORDS)
                .filter(|word| word.chars().count() >= MIN_KEY_WORD_CHARS)
                .any(|word| source_text.contains(word))
        })
        .count();

    supported as f64 / claims.len().max(1) as f64
}

/// Structural completeness of the report: title, summary, sections, lists.
pub fn coherence(report: &Report) -> f64 {
    let mut score = 0.0;

    if !report.title.is_empty() {
        score += 0.15;
    }

    let summary_chars = report.executive_summary.chars().count();
    if summary_chars > 100 {
        score += 0.25;
    } else if summary_chars > 50 {
        score += 0.15;
    }

    match report.sections.len() {
        n if n >= 3 => score += 0.25,
        n if n >= 1 => score += 0.15,
        _ => {}
    }

    match report.key_takeaways.len() {
        n if n >= 3 => score += 0.20,
        n if n >= 1 => score += 0.10,
        _ => {}
    }

    if !report.limitations.is_empty() {
        score += 0.075;
    }
    if !report.further_research.is_empty() {
        score += 0.075;
    }

    f64::min(score, 1.0)
}

/// Depth of the report: length, source coverage, section depth, takeaways.
pub fn completeness(report: &Report, sources: &[Source]) -> f64 {
    let mut score = 0.0;

    score += match report.word_count {
        n if n >= 500 => 0.3,
        n if n >= 200 => 0.2,
        n if n >= 100 => 0.1,
        _ => 0.0,
    };

    score += match sources.len() {
        n if n >= 5 => 0.3,
        n if n >= 3 => 0.2,
        n if n >= 1 => 0.1,
        _ => 0.0,
    };

    score += match report.section_word_count() {
        n if n >= 300 => 0.25,
        n if n >= 100 => 0.15,
        _ => 0.0,
    };

    if report.key_takeaways.len() >= 3 {
        score += 0.15;
    }

    f64::min(score, 1.0)
}

/// Source-count based citation credit.
pub fn citation_accuracy(sources: &[Source]) -> f64 {
    ratio(sources.len() as f64, CITATION_TARGET_SOURCES)
}
