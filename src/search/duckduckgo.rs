//! DuckDuckGo backend
//!
//! Scrapes the HTML endpoint, which needs no API key. Each result block
//! yields a title, the decoded target URL and the visible snippet.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::SearchGateway;
use crate::error::SearchError;
use crate::state::Source;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Wide enough that html2text never wraps a title or snippet
const TEXT_WIDTH: usize = 1000;

pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    /// Pause before each request; the HTML endpoint rate-limits bursts
    politeness_delay: Duration,
}

impl DuckDuckGoSearch {
    pub fn new() -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SearchError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            politeness_delay: Duration::from_millis(500),
        })
    }
}

#[async_trait]
impl SearchGateway for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Source>, SearchError> {
        tokio::time::sleep(self.politeness_delay).await;

        let url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(query)
        );
        debug!(url = %url, "Fetching search results");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(SearchError::RateLimited);
            }
            return Err(SearchError::HttpError(status.as_u16(), status.to_string()));
        }

        let body = response.text().await?;
        let results = parse_html(&body, max_results);

        if results.is_empty() {
            warn!(query = %query, "No search results found");
        } else {
            info!(query = %query, count = results.len(), "Search completed");
        }
        Ok(results)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

/// Extract result blocks from the DuckDuckGo HTML page.
fn parse_html(html: &str, max_results: usize) -> Vec<Source> {
    let mut results = Vec::new();
    let mut seen = HashSet::new();

    // Each organic hit starts with the `result__a` title anchor
    for block in html.split("class=\"result__a\"").skip(1) {
        if results.len() >= max_results {
            break;
        }
        let Some(url) = block_url(block) else {
            continue;
        };
        if url.contains("duckduckgo.com") || !seen.insert(url.clone()) {
            continue;
        }

        let title = anchor_text(block)
            .filter(|t| !t.is_empty())
            .or_else(|| extract_domain(&url))
            .unwrap_or_else(|| "Result".to_string());
        let snippet = block
            .find("result__snippet")
            .and_then(|idx| anchor_text(&block[idx..]))
            .unwrap_or_default();

        results.push(Source::new(title, url, snippet));
    }

    results
}

/// The real target of a result link: DuckDuckGo wraps it in `uddg=`.
fn block_url(block: &str) -> Option<String> {
    let href_start = block.find("href=\"")? + 6;
    let href = &block[href_start..];
    let href = &href[..href.find('"')?];

    if let Some(idx) = href.find("uddg=") {
        let encoded = &href[idx + 5..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        let decoded = urlencoding::decode(encoded).ok()?.into_owned();
        return decoded.starts_with("http").then_some(decoded);
    }

    if let Some(rest) = href.strip_prefix("//") {
        Some(format!("https://{}", rest))
    } else if href.starts_with("http") {
        Some(href.to_string())
    } else {
        None
    }
}

/// Text between the first `>` and the following closing tag.
fn anchor_text(fragment: &str) -> Option<String> {
    let open = fragment.find('>')? + 1;
    let close = fragment[open..].find("</a>")? + open;
    Some(html_to_text(&fragment[open..close]))
}

/// Visible text of an HTML fragment with entities decoded once.
///
/// Tags go first so html2text's emphasis markers (`**RAG**`) never reach
/// the text; html2text then decodes named and numeric entities. The bare
/// tag strip is the fallback.
fn html_to_text(fragment: &str) -> String {
    let bare = strip_tags(fragment);
    let text = match html2text::from_read(bare.as_bytes(), TEXT_WIDTH) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => bare,
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Extract the domain name from a URL.
fn extract_domain(url: &str) -> Option<String> {
    url.split("//")
        .nth(1)?
        .split('/')
        .next()
        .map(|s| s.to_string())
}
