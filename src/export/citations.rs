//! Citation styles
//!
//! Each style is a pure function of a source and an access date.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::state::Source;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    #[default]
    Apa,
    Mla,
    Chicago,
}

impl CitationStyle {
    /// Style for a user-supplied name; anything unrecognised is APA.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "mla" => CitationStyle::Mla,
            "chicago" => CitationStyle::Chicago,
            _ => CitationStyle::Apa,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CitationStyle::Apa => "apa",
            CitationStyle::Mla => "mla",
            CitationStyle::Chicago => "chicago",
        }
    }

    pub fn format(&self, source: &Source, accessed: NaiveDate) -> String {
        let title = if source.title.trim().is_empty() {
            "Untitled"
        } else {
            source.title.as_str()
        };
        let url = &source.url;

        match self {
            CitationStyle::Apa => format!(
                "{}. Retrieved {}, from {}",
                title,
                accessed.format("%Y, %B %d"),
                url
            ),
            CitationStyle::Mla => format!(
                "\"{}.\" Web. {}. <{}>",
                title,
                accessed.format("%d %b. %Y"),
                url
            ),
            CitationStyle::Chicago => format!(
                "\"{}.\" Accessed {}. {}.",
                title,
                accessed.format("%B %d, %Y"),
                url
            ),
        }
    }

    pub fn format_all(&self, sources: &[Source], accessed: NaiveDate) -> Vec<String> {
        sources.iter().map(|s| self.format(s, accessed)).collect()
    }

    /// Numbered reference list under a `References (STYLE)` header.
    pub fn bibliography(&self, sources: &[Source], accessed: NaiveDate) -> String {
        let body = self
            .format_all(sources, accessed)
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[{}] {}", i + 1, c))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "References ({})\n{}\n\n{}",
            self.as_str().to_uppercase(),
            "=".repeat(40),
            body
        )
    }
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    fn source() -> Source {
        Source::new("Understanding RAG", "https://example.com/rag", "")
    }

    #[test]
    fn test_apa() {
        assert_eq!(
            CitationStyle::Apa.format(&source(), date()),
            "Understanding RAG. Retrieved 2024, March 05, from https://example.com/rag"
        );
    }

    #[test]
    fn test_mla() {
        assert_eq!(
            CitationStyle::Mla.format(&source(), date()),
            "\"Understanding RAG.\" Web. 05 Mar. 2024. <https://example.com/rag>"
        );
    }

    #[test]
    fn test_chicago_and_untitled() {
        let untitled = Source::new("", "https://x.org", "");
        assert_eq!(
            CitationStyle::Chicago.format(&untitled, date()),
            "\"Untitled.\" Accessed March 05, 2024. https://x.org."
        );
    }

    #[test]
    fn test_unknown_style_falls_back_to_apa() {
        assert_eq!(CitationStyle::from_name("MLA"), CitationStyle::Mla);
        assert_eq!(CitationStyle::from_name("harvard"), CitationStyle::Apa);
        assert_eq!(CitationStyle::from_name(""), CitationStyle::Apa);
    }

    #[test]
    fn test_bibliography_layout() {
        let sources = vec![source(), Source::new("Second", "https://b.example", "")];
        let bib = CitationStyle::Chicago.bibliography(&sources, date());

        assert!(bib.starts_with(&format!("References (CHICAGO)\n{}\n\n[1] ", "=".repeat(40))));
        assert!(bib.contains(".\n\n[2] \"Second.\""));
    }
}
