//! # Error Types
//!
//! One `thiserror` enum per concern, folded into [`ResearchError`] at the
//! pipeline boundary. Malformed model output is deliberately absent: the
//! extractor resolves it to a fallback value instead of failing.

use thiserror::Error;

/// Failures talking to the hosted language model.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
}

/// Failures talking to the web-search API.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - check API key")]
    Unauthorized,

    #[error("Rate limited by search provider, please wait")]
    RateLimited,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("HTTP error ({0}): {1}")]
    HttpError(u16, String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl SearchError {
    /// Whether a retry could plausibly succeed.
    ///
    /// The pipeline itself never retries; callers wrapping a gateway may.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::Timeout
                | SearchError::Connection(_)
                | SearchError::RateLimited
                | SearchError::ServerError(_, _)
        )
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_connect() {
            SearchError::Connection(e.to_string())
        } else if e.is_decode() {
            SearchError::ParseError(e.to_string())
        } else {
            SearchError::Network(e.to_string())
        }
    }
}

/// Missing or out-of-range configuration, detected before any stage runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingCredential(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Errors surfaced by the job store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job not found or not completed: {0}")]
    NotCompleted(String),
}

/// Top-level error for a research run.
///
/// Its `Display` text is what a failed job records as its message.
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
