//! Markdown report rendering.

use chrono::NaiveDateTime;

use super::citations::CitationStyle;
use crate::state::{Report, ResearchState, Scores};

const BADGE_GREEN: f64 = 0.8;
const BADGE_YELLOW: f64 = 0.6;

/// Render a finished run as a Markdown document.
///
/// `generated_at` stamps the header and doubles as the citation access date.
pub fn render_markdown(
    state: &ResearchState,
    style: CitationStyle,
    generated_at: NaiveDateTime,
) -> String {
    let empty = Report::default();
    let report = state.synthesis.as_ref().unwrap_or(&empty);
    let mut lines: Vec<String> = Vec::new();

    let title = if report.title.is_empty() {
        "Research Report"
    } else {
        report.title.as_str()
    };
    lines.push(format!("# {}", title));
    lines.push(format!("*Generated: {}*", generated_at.format("%Y-%m-%d %H:%M")));
    lines.push(String::new());

    if let Some(scores) = &state.evaluation {
        lines.push(quality_badge(scores.overall));
        lines.push(String::new());
    }

    lines.push("## Executive Summary".to_string());
    lines.push(String::new());
    if report.executive_summary.is_empty() {
        lines.push("N/A".to_string());
    } else {
        lines.push(report.executive_summary.clone());
    }
    lines.push(String::new());

    lines.push("## Key Takeaways".to_string());
    lines.push(String::new());
    lines.extend(report.key_takeaways.iter().map(|t| format!("- {}", t)));
    lines.push(String::new());

    for section in &report.sections {
        let heading = if section.title.is_empty() {
            "Section"
        } else {
            section.title.as_str()
        };
        lines.push(format!("## {}", heading));
        lines.push(String::new());
        lines.push(section.content.clone());
        lines.push(String::new());
    }

    if let Some(scores) = &state.evaluation {
        lines.extend(metrics_table(scores));
        lines.push(String::new());
    }

    lines.push("## References".to_string());
    lines.push(String::new());
    let citations = style.format_all(&state.sources, generated_at.date());
    lines.extend(
        citations
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i + 1, c)),
    );
    lines.push(String::new());

    if !report.limitations.is_empty() {
        lines.push("## Limitations".to_string());
        lines.push(String::new());
        lines.extend(report.limitations.iter().map(|l| format!("- {}", l)));
        lines.push(String::new());
    }

    if !report.further_research.is_empty() {
        lines.push("## Further Research".to_string());
        lines.push(String::new());
        lines.extend(report.further_research.iter().map(|f| format!("- {}", f)));
    }

    lines.join("\n")
}

fn percent(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}

fn quality_badge(overall: f64) -> String {
    let color = if overall >= BADGE_GREEN {
        "green"
    } else if overall >= BADGE_YELLOW {
        "yellow"
    } else {
        "red"
    };
    format!(
        "![Quality Score](https://img.shields.io/badge/Quality-{}-{})",
        urlencoding::encode(&percent(overall)),
        color
    )
}

fn metrics_table(scores: &Scores) -> Vec<String> {
    let mut lines = vec![
        "## Quality Metrics".to_string(),
        String::new(),
        "| Metric | Score |".to_string(),
        "|--------|-------|".to_string(),
    ];
    for (name, value) in scores.metrics() {
        lines.push(format!("| {} | {} |", metric_label(name), percent(value)));
    }
    lines.push(format!("| Grade | {} |", scores.grade));
    lines
}

fn metric_label(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Grade, Section, Source};
    use chrono::NaiveDate;

    fn generated_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap()
    }

    fn finished_state(overall: f64) -> ResearchState {
        let mut state = ResearchState::new("What is RAG?", 2);
        state.sources = vec![Source::new("RAG paper", "https://arxiv.org/abs/2005.11401", "")];
        state.synthesis = Some(Report {
            title: "RAG Explained".into(),
            executive_summary: "RAG grounds answers in retrieved text.".into(),
            sections: vec![Section::new("Architecture", "Retriever plus generator.")],
            key_takeaways: vec!["Cheaper than fine-tuning".into()],
            limitations: vec!["English only".into()],
            further_research: vec![],
            word_count: 9,
        });
        state.evaluation = Some(Scores {
            relevancy: 1.0,
            faithfulness: 0.5,
            coherence: 0.8,
            completeness: 0.6,
            citation_accuracy: 0.2,
            overall,
            grade: Grade::from_score(overall),
        });
        state
    }

    #[test]
    fn test_render_full_report() {
        let md = render_markdown(&finished_state(0.65), CitationStyle::Apa, generated_at());

        assert!(md.starts_with("# RAG Explained\n*Generated: 2024-03-05 14:30*"));
        assert!(md.contains("Quality-65%25-yellow"));
        assert!(md.contains("## Architecture\n\nRetriever plus generator."));
        assert!(md.contains("| Citation Accuracy | 20% |"));
        assert!(md.contains("| Grade | C |"));
        assert!(md.contains("1. RAG paper. Retrieved 2024, March 05, from https://arxiv.org/abs/2005.11401"));
        assert!(md.contains("## Limitations\n\n- English only"));
        assert!(!md.contains("## Further Research"));
    }

    #[test]
    fn test_badge_colors() {
        assert!(quality_badge(0.8).ends_with("-green)"));
        assert!(quality_badge(0.6).ends_with("-yellow)"));
        assert!(quality_badge(0.59).ends_with("-red)"));
    }

    #[test]
    fn test_render_without_synthesis() {
        let state = ResearchState::new("q", 1);
        let md = render_markdown(&state, CitationStyle::Mla, generated_at());

        assert!(md.starts_with("# Research Report"));
        assert!(md.contains("N/A"));
        assert!(!md.contains("Quality Metrics"));
    }
}
