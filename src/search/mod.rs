//! # Search Gateway
//!
//! Query in, `{title, url, content}` records out. Two backends:
//! Tavily (API key, full page content) and DuckDuckGo (keyless HTML scrape).

mod duckduckgo;
mod tavily;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{ConfigError, ResearchError, SearchError};
use crate::state::Source;

pub use duckduckgo::DuckDuckGoSearch;
pub use tavily::{SearchDepth, TavilySearch, Topic};

/// Web search backend contract.
///
/// Errors are raised per call; the researcher decides whether to absorb them.
#[async_trait]
pub trait SearchGateway: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Source>, SearchError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    Tavily,
    DuckDuckGo,
}

impl SearchProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchProvider::Tavily => "tavily",
            SearchProvider::DuckDuckGo => "duckduckgo",
        }
    }
}

impl fmt::Display for SearchProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tavily" => Ok(SearchProvider::Tavily),
            "duckduckgo" | "ddg" => Ok(SearchProvider::DuckDuckGo),
            other => Err(ConfigError::InvalidValue {
                name: "SEARCH_PROVIDER",
                reason: format!("unknown provider {:?} (expected tavily or duckduckgo)", other),
            }),
        }
    }
}

/// Build the configured search backend.
pub fn from_config(config: &Config) -> Result<Arc<dyn SearchGateway>, ResearchError> {
    match config.search_provider {
        SearchProvider::Tavily => {
            let key = config
                .tavily_api_key
                .clone()
                .ok_or(ConfigError::MissingCredential("TAVILY_API_KEY"))?;
            Ok(Arc::new(TavilySearch::new(key)))
        }
        SearchProvider::DuckDuckGo => Ok(Arc::new(DuckDuckGoSearch::new()?)),
    }
}
