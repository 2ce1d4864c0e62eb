//! # Research State
//!
//! The single record threaded through the pipeline, plus the typed outputs
//! each stage contributes to it. Stage outputs are validated at the
//! extractor boundary, so everything here is already well-typed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::extract::lenient;

/// A web page returned by the search gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

impl Source {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: content.into(),
        }
    }
}

/// One atomic claim extracted from the sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default, deserialize_with = "lenient::string")]
    pub finding: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub evidence: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub source: Option<String>,
}

impl Finding {
    pub fn new(finding: impl Into<String>, evidence: impl Into<String>) -> Self {
        Self {
            finding: finding.into(),
            evidence: evidence.into(),
            source: None,
        }
    }
}

/// The critic's verdict on a round of research.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    /// Clamped to [0, 1]
    pub quality_score: f64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub content: String,
}

impl Section {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// The synthesized research report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub executive_summary: String,
    pub sections: Vec<Section>,
    pub key_takeaways: Vec<String>,
    pub limitations: Vec<String>,
    pub further_research: Vec<String>,
    /// Whitespace tokens in the summary plus every section body
    pub word_count: usize,
}

impl Report {
    /// Recount words from the current summary and section bodies.
    pub fn count_words(&self) -> usize {
        self.executive_summary.split_whitespace().count()
            + self
                .sections
                .iter()
                .map(|s| s.content.split_whitespace().count())
                .sum::<usize>()
    }

    /// Store the recounted word total.
    pub fn refresh_word_count(&mut self) {
        self.word_count = self.count_words();
    }

    /// Whitespace tokens across section bodies only.
    pub fn section_word_count(&self) -> usize {
        self.sections
            .iter()
            .map(|s| s.content.split_whitespace().count())
            .sum()
    }
}

/// Letter grade derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn from_score(overall: f64) -> Self {
        if overall >= 0.85 {
            Grade::A
        } else if overall >= 0.70 {
            Grade::B
        } else if overall >= 0.55 {
            Grade::C
        } else {
            Grade::D
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        };
        f.write_str(s)
    }
}

/// Heuristic quality scores, each in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub relevancy: f64,
    pub faithfulness: f64,
    pub coherence: f64,
    pub completeness: f64,
    pub citation_accuracy: f64,
    pub overall: f64,
    pub grade: Grade,
}

impl Scores {
    /// Metric name/value pairs in display order, overall last.
    pub fn metrics(&self) -> [(&'static str, f64); 6] {
        [
            ("relevancy", self.relevancy),
            ("faithfulness", self.faithfulness),
            ("coherence", self.coherence),
            ("completeness", self.completeness),
            ("citation_accuracy", self.citation_accuracy),
            ("overall", self.overall),
        ]
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Researcher,
    Critic,
    Synthesizer,
    Evaluator,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Researcher,
        Stage::Critic,
        Stage::Synthesizer,
        Stage::Evaluator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Researcher => "researcher",
            Stage::Critic => "critic",
            Stage::Synthesizer => "synthesizer",
            Stage::Evaluator => "evaluator",
        }
    }

    /// Job progress reported while this stage runs.
    pub fn progress(&self) -> f32 {
        match self {
            Stage::Researcher => 0.25,
            Stage::Critic => 0.50,
            Stage::Synthesizer => 0.75,
            Stage::Evaluator => 0.90,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

/// The record every stage reads from and writes into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchState {
    query: String,
    pub search_queries: Vec<String>,
    pub sources: Vec<Source>,
    pub findings: Vec<Finding>,
    pub critique: Option<Critique>,
    pub synthesis: Option<Report>,
    pub evaluation: Option<Scores>,
    pub iteration: u32,
    pub max_iterations: u32,
    pub agent_status: BTreeMap<Stage, AgentStatus>,
    pub error: Option<String>,
}

impl ResearchState {
    /// Fresh state for one query: every stage pending, nothing produced yet.
    pub fn new(query: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            query: query.into(),
            search_queries: Vec::new(),
            sources: Vec::new(),
            findings: Vec::new(),
            critique: None,
            synthesis: None,
            evaluation: None,
            iteration: 0,
            max_iterations,
            agent_status: Stage::ALL
                .iter()
                .map(|stage| (*stage, AgentStatus::Pending))
                .collect(),
            error: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn status_of(&self, stage: Stage) -> AgentStatus {
        self.agent_status.get(&stage).copied().unwrap_or_default()
    }

    pub fn set_status(&mut self, stage: Stage, status: AgentStatus) {
        self.agent_status.insert(stage, status);
    }
}
