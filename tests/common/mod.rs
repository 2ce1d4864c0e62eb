//! Shared in-memory gateways for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use multi_agent_research::{
    CompletionRequest, LlmError, LlmGateway, SearchError, SearchGateway, Source,
};

/// Answers each stage's prompt with a canned reply, recognised by the
/// prompt's opening words.
pub struct StageAwareLlm {
    queries: String,
    findings: String,
    /// Critic scores, consumed in order; the last one repeats
    scores: Mutex<VecDeque<f64>>,
    synthesis: String,
    fail_with: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl StageAwareLlm {
    pub fn new(scores: &[f64]) -> Self {
        Self {
            queries: "RAG retrieval augmented generation\nRAG vs fine-tuning\nRAG architecture".into(),
            findings: r#"{"findings": [
                {"finding": "RAG in AI retrieves documents before generation", "evidence": "Lewis et al. introduced RAG in 2020", "source": "https://arxiv.org/abs/2005.11401"},
                {"finding": "RAG reduces hallucination", "evidence": "Grounding answers in retrieved text", "source": "https://example.com/rag"},
                {"finding": "What RAG needs is a vector index", "evidence": "Dense retrieval over embeddings"}
            ]}"#
            .into(),
            scores: Mutex::new(scores.iter().copied().collect()),
            synthesis: r#"```json
{"title": "Retrieval-Augmented Generation in AI",
 "executive_summary": "Retrieval augmented generation combines a retriever with a generator. Documents are fetched before the model answers, which grounds the output in evidence.",
 "sections": [
   {"title": "Architecture", "content": "A retriever selects passages from an index and a generator conditions on them."},
   {"title": "Benefits", "content": "Fewer hallucinations and fresher knowledge without retraining."}
 ],
 "key_takeaways": ["Retrieval grounds answers", "Cheaper than fine-tuning", "Index quality matters"],
 "limitations": ["Depends on retrieval quality"],
 "further_research": ["Evaluation of long-context alternatives"]}
```"#
                .into(),
            fail_with: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new(&[0.9])
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.prompts()
            .iter()
            .filter(|p| p.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl LlmGateway for StageAwareLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if let Some(message) = &self.fail_with {
            return Err(LlmError::RequestFailed(message.clone()));
        }

        let prompt = request.prompt.as_str();
        let reply = if prompt.starts_with("Generate") {
            self.queries.clone()
        } else if prompt.starts_with("Analyze sources") {
            self.findings.clone()
        } else if prompt.starts_with("Evaluate research") {
            let mut scores = self.scores.lock().unwrap();
            let score = if scores.len() > 1 {
                scores.pop_front().unwrap_or(0.9)
            } else {
                scores.front().copied().unwrap_or(0.9)
            };
            format!(
                r#"{{"quality_score": {}, "strengths": ["Relevant sources"], "weaknesses": ["Missing benchmarks"]}}"#,
                score
            )
        } else {
            self.synthesis.clone()
        };
        Ok(reply)
    }

    fn name(&self) -> &str {
        "stage-aware"
    }
}

/// Search backend with canned results per query and optional failures.
#[derive(Default)]
pub struct CannedSearch {
    results: HashMap<String, Vec<Source>>,
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl CannedSearch {
    pub fn with_results(mut self, query: &str, sources: Vec<Source>) -> Self {
        self.results.insert(query.to_string(), sources);
        self
    }

    pub fn with_failure(mut self, query: &str) -> Self {
        self.failing.push(query.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchGateway for CannedSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Source>, SearchError> {
        self.calls.lock().unwrap().push(query.to_string());
        if self.failing.iter().any(|q| q == query) {
            return Err(SearchError::ServerError(502, "bad gateway".into()));
        }
        Ok(self
            .results
            .get(query)
            .map(|sources| sources.iter().take(max_results).cloned().collect())
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "canned"
    }
}

pub fn source(host: &str, path: &str) -> Source {
    Source::new(
        format!("{} {}", host, path),
        format!("https://{}/{}", host, path),
        "Retrieval augmented generation retrieves documents before the generator answers, grounding the output in evidence.",
    )
}

/// Eight raw results over the three generated queries, two of them repeats.
pub fn rag_search() -> CannedSearch {
    CannedSearch::default()
        .with_results(
            "RAG retrieval augmented generation",
            vec![source("a.com", "1"), source("b.com", "2"), source("c.com", "3")],
        )
        .with_results(
            "RAG vs fine-tuning",
            vec![source("d.com", "4"), source("a.com", "1"), source("e.com", "5")],
        )
        .with_results(
            "RAG architecture",
            vec![source("b.com", "2"), source("f.com", "6")],
        )
}
