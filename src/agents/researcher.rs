//! Researcher stage: query variants, search fan-in, findings extraction.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::prompts::ResearchPrompts;
use crate::config::PipelineSettings;
use crate::error::ResearchError;
use crate::extract;
use crate::llm::{CompletionRequest, LlmGateway};
use crate::search::SearchGateway;
use crate::state::{Critique, Finding, Source};

/// Characters trimmed from both ends of a generated query line.
const QUERY_TRIM: &[char] = &['"', '\'', '`', '-', '*', '.', ')', '#'];

/// Everything the researcher contributes to the state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResearchOutput {
    pub search_queries: Vec<String>,
    pub sources: Vec<Source>,
    pub findings: Vec<Finding>,
}

pub struct Researcher {
    llm: Arc<dyn LlmGateway>,
    search: Arc<dyn SearchGateway>,
    settings: PipelineSettings,
}

impl Researcher {
    pub fn new(
        llm: Arc<dyn LlmGateway>,
        search: Arc<dyn SearchGateway>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            llm,
            search,
            settings,
        }
    }

    /// Run one research round.
    ///
    /// LLM failures propagate. A failing sub-query search only costs that
    /// sub-query's results.
    pub async fn run(
        &self,
        query: &str,
        feedback: Option<&Critique>,
    ) -> Result<ResearchOutput, ResearchError> {
        info!(query = %query, revision = feedback.is_some(), "Researcher: generating search queries");

        let request = CompletionRequest::new(ResearchPrompts::search_queries(
            query,
            self.settings.query_variants,
            feedback,
        ))
        .with_max_tokens(self.settings.query_tokens)
        .with_temperature(self.settings.temperature);
        let raw = self.llm.complete(&request).await?;
        let search_queries = parse_search_queries(&raw, query, self.settings.query_variants);
        debug!(queries = ?search_queries, "Generated search queries");

        let mut hits = Vec::new();
        for (i, sub_query) in search_queries.iter().enumerate() {
            info!(
                step = i + 1,
                total = search_queries.len(),
                query = %sub_query,
                "Researcher: searching"
            );
            match self
                .search
                .search(sub_query, self.settings.results_per_query)
                .await
            {
                Ok(results) => hits.extend(results),
                Err(e) => {
                    warn!(query = %sub_query, backend = self.search.name(), error = %e, "Search failed, skipping sub-query");
                }
            }
        }

        let raw_count = hits.len();
        let sources = dedupe_by_url(hits, self.settings.max_sources);
        info!(raw = raw_count, unique = sources.len(), "Researcher: analyzing sources");

        let request = CompletionRequest::new(ResearchPrompts::findings(
            query,
            &sources,
            self.settings.max_findings,
        ))
        .with_max_tokens(self.settings.findings_tokens)
        .with_temperature(self.settings.temperature);
        let reply = self.llm.complete(&request).await?;
        let findings = parse_findings(&reply);

        info!(findings = findings.len(), "Researcher: complete");
        Ok(ResearchOutput {
            search_queries,
            sources,
            findings,
        })
    }
}

/// Split the model's reply into at most `limit` cleaned query lines.
///
/// Numbering, bullets and quotes are trimmed from each line. When nothing
/// usable remains the original query is searched instead.
pub fn parse_search_queries(raw: &str, query: &str, limit: usize) -> Vec<String> {
    let queries: Vec<String> = raw
        .lines()
        .map(|line| {
            line.trim()
                .trim_matches(|c: char| c.is_ascii_digit() || c.is_whitespace() || QUERY_TRIM.contains(&c))
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(limit)
        .collect();

    if queries.is_empty() {
        vec![query.to_string()]
    } else {
        queries
    }
}

/// Keep the first source seen for each URL, in order, up to `cap`.
pub fn dedupe_by_url(sources: impl IntoIterator<Item = Source>, cap: usize) -> Vec<Source> {
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .filter(|s| seen.insert(s.url.clone()))
        .take(cap)
        .collect()
}

/// Findings from the model reply; unusable entries are dropped.
fn parse_findings(reply: &str) -> Vec<Finding> {
    let value = extract::parse(reply, json!({ "findings": [] }));
    let Some(items) = value.get("findings").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(Finding::new(text.clone(), "")),
            Value::Object(_) => serde_json::from_value::<Finding>(item.clone()).ok(),
            _ => None,
        })
        .filter(|f| !f.finding.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedLlm, ScriptedSearch};

    #[test]
    fn test_parse_search_queries_strips_numbering() {
        let raw = "1. \"RAG retrieval augmented generation\"\n2) RAG vs fine-tuning\n- 'RAG architecture patterns'\n4. extra query";
        let queries = parse_search_queries(raw, "What is RAG?", 3);

        assert_eq!(
            queries,
            vec![
                "RAG retrieval augmented generation",
                "RAG vs fine-tuning",
                "RAG architecture patterns",
            ]
        );
    }

    #[test]
    fn test_parse_search_queries_skips_blank_lines() {
        let raw = "\n\n  \n1.\nfirst\n\nsecond";
        assert_eq!(parse_search_queries(raw, "q", 3), vec!["first", "second"]);
    }

    #[test]
    fn test_parse_search_queries_falls_back_to_query() {
        assert_eq!(parse_search_queries("", "What is RAG?", 3), vec!["What is RAG?"]);
        assert_eq!(parse_search_queries("1.\n2.\n---", "q", 3), vec!["q"]);
    }

    #[test]
    fn test_dedupe_preserves_first_seen_order() {
        let sources = vec![
            Source::new("a1", "https://a", "first a"),
            Source::new("b", "https://b", ""),
            Source::new("a2", "https://a", "second a"),
            Source::new("c", "https://c", ""),
            Source::new("b2", "https://b", ""),
        ];

        let unique = dedupe_by_url(sources, 10);
        let urls: Vec<&str> = unique.iter().map(|s| s.url.as_str()).collect();

        assert_eq!(urls, vec!["https://a", "https://b", "https://c"]);
        assert_eq!(unique[0].title, "a1");
    }

    #[test]
    fn test_dedupe_applies_cap_after_dedup() {
        let sources = (0..10).map(|i| Source::new("t", format!("https://s{}", i % 7), ""));
        let unique = dedupe_by_url(sources, 6);
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn test_parse_findings_lenient() {
        let reply = r#"```json
{"findings": [
  {"finding": "RAG retrieves documents", "evidence": "Lewis et al. 2020", "source": "https://a"},
  "A bare string finding",
  {"evidence": "no claim"},
  42
]}
```"#;
        let findings = parse_findings(reply);

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].source.as_deref(), Some("https://a"));
        assert_eq!(findings[1].finding, "A bare string finding");
    }

    #[test]
    fn test_run_absorbs_sub_query_failure() {
        let llm = Arc::new(ScriptedLlm::new([
            "alpha\nbeta\ngamma",
            r#"{"findings": [{"finding": "claim", "evidence": "ev"}]}"#,
        ]));
        let search = Arc::new(
            ScriptedSearch::default()
                .with_results("alpha", vec![Source::new("A", "https://a", ""), Source::new("B", "https://b", "")])
                .with_failure("beta", 500)
                .with_results("gamma", vec![Source::new("A again", "https://a", "")]),
        );
        let researcher = Researcher::new(llm, search.clone(), PipelineSettings::default());

        let output = tokio_test::block_on(researcher.run("q", None)).unwrap();

        assert_eq!(search.calls(), vec!["alpha", "beta", "gamma"]);
        assert_eq!(output.sources.len(), 2);
        assert_eq!(output.findings.len(), 1);
    }

    #[test]
    fn test_parse_findings_garbage_is_empty() {
        assert!(parse_findings("I cannot help with that").is_empty());
        assert!(parse_findings(r#"{"findings": "none"}"#).is_empty());
    }
}
