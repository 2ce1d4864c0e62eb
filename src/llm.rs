//! # LLM Gateway
//!
//! The pipeline talks to a hosted model through one narrow trait:
//! prompt in, free text out. [`RigLlmGateway`] implements it on top of
//! Rig's provider clients; tests substitute scripted gateways.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::{groq, ollama, openai};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::{ConfigError, LlmError};

/// Hosted model APIs the gateway can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Groq,
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Groq => "groq",
            LlmProvider::OpenAi => "openai",
            LlmProvider::Ollama => "ollama",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(LlmProvider::Groq),
            "openai" => Ok(LlmProvider::OpenAi),
            "ollama" => Ok(LlmProvider::Ollama),
            other => Err(ConfigError::InvalidValue {
                name: "LLM_PROVIDER",
                reason: format!("unknown provider {:?} (expected groq, openai or ollama)", other),
            }),
        }
    }
}

/// A single completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    /// System instruction, sent as the agent preamble
    pub system: Option<String>,
    pub max_tokens: u64,
    pub temperature: f64,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens: 4096,
            temperature: 0.7,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Prompt in, free text out.
///
/// Implementations raise on network or auth failure and never retry;
/// retry policy, if any, belongs to whoever wraps the gateway.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

enum Backend {
    Groq(groq::Client),
    OpenAi(openai::Client),
    Ollama(ollama::Client),
}

/// Builds a one-shot Rig agent per call so every stage can set its own
/// preamble, temperature and token budget.
macro_rules! prompt_agent {
    ($client:expr, $model:expr, $request:expr) => {{
        let mut builder = $client
            .agent($model)
            .temperature($request.temperature)
            .max_tokens($request.max_tokens);
        if let Some(system) = $request.system.as_deref() {
            builder = builder.preamble(system);
        }
        builder.build().prompt($request.prompt.as_str()).await
    }};
}

/// [`LlmGateway`] backed by Rig provider clients.
pub struct RigLlmGateway {
    backend: Backend,
    provider: LlmProvider,
    model: String,
}

impl RigLlmGateway {
    /// Build the client for the configured provider.
    ///
    /// Call after [`Config::validate`]: Rig reads the API key from the
    /// environment and the validated config guarantees it is present.
    pub fn from_config(config: &Config) -> Self {
        let backend = match config.llm_provider {
            LlmProvider::Groq => Backend::Groq(groq::Client::from_env()),
            LlmProvider::OpenAi => Backend::OpenAi(openai::Client::from_env()),
            LlmProvider::Ollama => {
                // Rig's Ollama client picks its host up from the environment
                std::env::set_var("OLLAMA_API_BASE_URL", &config.ollama_host);
                Backend::Ollama(ollama::Client::from_env())
            }
        };

        Self {
            backend,
            provider: config.llm_provider,
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl LlmGateway for RigLlmGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        debug!(
            provider = %self.provider,
            model = %self.model,
            max_tokens = request.max_tokens,
            prompt_chars = request.prompt.len(),
            "Sending completion request"
        );

        let model = self.model.as_str();
        let response = match &self.backend {
            Backend::Groq(client) => prompt_agent!(client, model, request),
            Backend::OpenAi(client) => prompt_agent!(client, model, request),
            Backend::Ollama(client) => prompt_agent!(client, model, request),
        };

        response.map_err(|e| LlmError::RequestFailed(e.to_string()))
    }

    fn name(&self) -> &str {
        self.provider.as_str()
    }
}
