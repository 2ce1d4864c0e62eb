//! # Pipeline Stages
//!
//! Each stage issues its own LLM (and, for the researcher, search) calls and
//! returns a typed delta; the workflow controller writes it into the state.

mod critic;
pub mod prompts;
mod researcher;
mod synthesizer;

pub use critic::Critic;
pub use prompts::ResearchPrompts;
pub use researcher::{dedupe_by_url, parse_search_queries, ResearchOutput, Researcher};
pub use synthesizer::{fallback_report, Synthesizer};
