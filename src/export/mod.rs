//! # Export
//!
//! Citation styles and Markdown rendering for finished research runs.

mod citations;
mod markdown;

pub use citations::CitationStyle;
pub use markdown::render_markdown;
