//! In-memory gateways for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{LlmError, SearchError};
use crate::llm::{CompletionRequest, LlmGateway};
use crate::search::SearchGateway;
use crate::state::Source;

/// Replies with a fixed script, one entry per call, and records requests.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(message.to_string())])),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmGateway for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut replies = self.replies.lock().unwrap();
        let next = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(LlmError::RequestFailed(message)),
            None => Err(LlmError::RequestFailed("script exhausted".into())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Canned results per query; unknown queries return nothing.
#[derive(Default)]
pub struct ScriptedSearch {
    results: HashMap<String, Result<Vec<Source>, u16>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn with_results(mut self, query: &str, sources: Vec<Source>) -> Self {
        self.results.insert(query.to_string(), Ok(sources));
        self
    }

    /// `query` fails with an HTTP `status`.
    pub fn with_failure(mut self, query: &str, status: u16) -> Self {
        self.results.insert(query.to_string(), Err(status));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchGateway for ScriptedSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Source>, SearchError> {
        self.calls.lock().unwrap().push(query.to_string());
        match self.results.get(query) {
            Some(Ok(sources)) => Ok(sources.iter().take(max_results).cloned().collect()),
            Some(Err(status)) => Err(SearchError::HttpError(*status, "scripted".into())),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
