//! Tavily Search backend
//!
//! POSTs to the Tavily Search API and maps each result to a [`Source`].
//! Transient failures (timeouts, 429, 5xx) are retried with exponential
//! backoff; auth and request errors surface immediately.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::SearchGateway;
use crate::error::SearchError;
use crate::state::Source;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// Default timeout for Tavily API requests
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum retry attempts for transient failures
const MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Tavily caps results per request at 20
const MAX_RESULTS_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    /// Fast search with basic results
    #[default]
    Basic,
    /// More thorough search with detailed results
    Advanced,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    #[default]
    General,
    News,
}

pub struct TavilySearch {
    api_key: String,
    client: Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    search_depth: SearchDepth,
    topic: Topic,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            search_depth: SearchDepth::default(),
            topic: Topic::default(),
        }
    }

    /// Point at a different API host (used by tests against a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_search_depth(mut self, depth: SearchDepth) -> Self {
        self.search_depth = depth;
        self
    }

    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topic = topic;
        self
    }

    async fn execute_with_retry(
        &self,
        request: &TavilyRequest<'_>,
    ) -> Result<TavilyResponse, SearchError> {
        let mut attempt = 0;
        loop {
            match self.execute_single_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1));
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "Tavily request failed, will retry");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_single_request(
        &self,
        request: &TavilyRequest<'_>,
    ) -> Result<TavilyResponse, SearchError> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<TavilyResponse>()
                .await
                .map_err(|e| SearchError::ParseError(e.to_string()));
        }

        let error_text = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => Err(SearchError::Unauthorized),
            429 => Err(SearchError::RateLimited),
            400 => Err(SearchError::BadRequest(error_text)),
            code @ 500..=599 => Err(SearchError::ServerError(code, error_text)),
            code => Err(SearchError::HttpError(code, error_text)),
        }
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: SearchDepth,
    topic: Topic,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

impl From<TavilyResult> for Source {
    fn from(r: TavilyResult) -> Self {
        Source::new(r.title, r.url, r.content)
    }
}

#[async_trait]
impl SearchGateway for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Source>, SearchError> {
        let request = TavilyRequest {
            query,
            max_results: max_results.clamp(1, MAX_RESULTS_LIMIT),
            search_depth: self.search_depth,
            topic: self.topic,
            include_answer: false,
            include_raw_content: false,
        };

        debug!(query = %query, max_results = request.max_results, "Calling Tavily");
        let response = self.execute_with_retry(&request).await?;

        Ok(response.results.into_iter().map(Source::from).collect())
    }

    fn name(&self) -> &str {
        "tavily"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_enum_serialization() {
        assert_eq!(serde_json::to_string(&SearchDepth::Advanced).unwrap(), r#""advanced""#);
        assert_eq!(serde_json::to_string(&Topic::News).unwrap(), r#""news""#);
    }

    #[tokio::test]
    async fn test_search_maps_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("authorization", "Bearer tvly-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": "rag",
                "results": [
                    {"title": "RAG explained", "url": "https://a.example/rag", "content": "Retrieval augmented generation", "score": 0.9},
                    {"title": "More RAG", "url": "https://b.example/rag", "content": "Grounding LLMs", "score": 0.7}
                ]
            })))
            .mount(&server)
            .await;

        let tavily = TavilySearch::new("tvly-test").with_base_url(server.uri());
        let sources = tavily.search("rag", 3).await.unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].url, "https://a.example/rag");
        assert_eq!(sources[1].content, "Grounding LLMs");
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let tavily = TavilySearch::new("bad").with_base_url(server.uri());
        let err = tavily.search("rag", 3).await.unwrap_err();

        assert!(matches!(err, SearchError::Unauthorized));
    }

    #[tokio::test]
    async fn test_server_error_without_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let tavily = TavilySearch::new("k")
            .with_base_url(server.uri())
            .with_max_retries(0);
        let err = tavily.search("rag", 3).await.unwrap_err();

        assert!(matches!(err, SearchError::ServerError(503, _)));
    }
}
