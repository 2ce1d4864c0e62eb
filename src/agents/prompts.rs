//! Prompt templates for the pipeline stages
//!
//! Every template asks for plain lines or a JSON object; the stages pair
//! each with an extractor fallback so a malformed reply never aborts a run.

use crate::state::{Critique, Finding, Source};

/// Characters of page content shown to the model per source
const SOURCE_EXCERPT_CHARS: usize = 600;

/// Sources embedded in the findings prompt
pub const PROMPT_SOURCES: usize = 6;

/// System instruction for the synthesis call
pub const JSON_ONLY_SYSTEM: &str = "Return ONLY valid JSON. No markdown.";

/// Prompt templates for the research pipeline
pub struct ResearchPrompts;

impl ResearchPrompts {
    /// Ask for short search-query variants, one per line.
    ///
    /// On a revision pass the previous critique's weaknesses are included
    /// so the new queries target the gaps.
    pub fn search_queries(query: &str, variants: usize, feedback: Option<&Critique>) -> String {
        let mut prompt = format!(
            "Generate {variants} search queries for: \"{query}\"\nReturn only queries, one per line."
        );

        if let Some(critique) = feedback.filter(|c| !c.weaknesses.is_empty()) {
            prompt.push_str("\n\nThe previous research round had these gaps; target them:\n");
            for weakness in &critique.weaknesses {
                prompt.push_str(&format!("- {}\n", weakness));
            }
        }

        prompt
    }

    /// Ask for findings grounded in the fetched sources.
    pub fn findings(query: &str, sources: &[Source], max_findings: usize) -> String {
        let sources_text = sources
            .iter()
            .take(PROMPT_SOURCES)
            .map(|s| {
                let excerpt: String = s.content.chars().take(SOURCE_EXCERPT_CHARS).collect();
                format!("Title: {}\nURL: {}\nContent: {}", s.title, s.url, excerpt)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            r#"Analyze sources about: "{query}"

{sources_text}

Extract up to {max_findings} key findings. Return JSON: {{"findings": [{{"finding": "...", "evidence": "...", "source": "url"}}]}}"#
        )
    }

    /// Ask the critic for a quality verdict.
    pub fn critique(query: &str, findings: &[Finding], source_count: usize) -> String {
        let findings_text = findings
            .iter()
            .take(5)
            .map(|f| format!("- {}", f.finding))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Evaluate research on "{query}":

Findings:
{findings_text}

Sources: {source_count}

Score quality from 0.0 to 1.0. Return JSON: {{"quality_score": 0.85, "strengths": ["..."], "weaknesses": ["..."]}}"#
        )
    }

    /// Ask for the structured report.
    pub fn synthesis(query: &str, findings: &[Finding]) -> String {
        let findings_text = findings
            .iter()
            .take(6)
            .map(|f| format!("- {}: {}", f.finding, f.evidence))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Create a research report on: "{query}"

FINDINGS:
{findings_text}

Requirements:
- executive_summary: 3-4 detailed paragraphs, at least 200 words
- sections: 2-4 sections, each with a title and substantive content
- key_takeaways: at least 3
- limitations and further_research: at least 1 each

Return JSON:
{{"title": "Report Title", "executive_summary": "3-4 detailed paragraphs...", "sections": [{{"title": "Section", "content": "..."}}], "key_takeaways": ["1", "2", "3"], "limitations": ["1"], "further_research": ["1"]}}"#
        )
    }
}
