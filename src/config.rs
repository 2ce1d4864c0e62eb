//! # Configuration Module
//!
//! Loads configuration from the environment (and an optional `.env` file),
//! then validates it once before any gateway is built. Missing credentials
//! fail here, never halfway through a research run.

use std::env;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::evaluation::EvaluationPreset;
use crate::llm::LlmProvider;
use crate::search::SearchProvider;

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Main configuration for the research pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Which hosted model API to call
    pub llm_provider: LlmProvider,

    /// Model identifier passed to the provider
    pub model: String,

    /// Groq API key (required when `llm_provider` is Groq)
    pub groq_api_key: Option<String>,

    /// OpenAI API key (required when `llm_provider` is OpenAI)
    pub openai_api_key: Option<String>,

    /// Ollama server URL (default: http://localhost:11434)
    pub ollama_host: String,

    /// Temperature for LLM responses (0.0 = deterministic, 2.0 = very creative)
    pub temperature: f64,

    /// Which web-search API to call
    pub search_provider: SearchProvider,

    /// Tavily API key (required when `search_provider` is Tavily)
    pub tavily_api_key: Option<String>,

    /// Maximum number of unique sources kept after dedup
    pub max_sources: usize,

    /// Upper bound on revision loops
    pub max_iterations: u32,

    /// Results requested from the search API per generated sub-query
    pub results_per_query: usize,

    /// Scoring configuration for the evaluator stage
    pub evaluation_preset: EvaluationPreset,

    /// Log level for the application
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_provider: LlmProvider::Groq,
            model: "llama-3.3-70b-versatile".to_string(),
            groq_api_key: None,
            openai_api_key: None,
            ollama_host: "http://localhost:11434".to_string(),
            temperature: 0.7,
            search_provider: SearchProvider::Tavily,
            tavily_api_key: None,
            max_sources: 6,
            max_iterations: 2,
            results_per_query: 3,
            evaluation_preset: EvaluationPreset::Standard,
            log_level: "info".to_string(),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(val) = get("LLM_PROVIDER") {
            config.llm_provider = val.parse()?;
        }
        if let Some(val) = get("LLM_MODEL") {
            config.model = val;
        }
        config.groq_api_key = get("GROQ_API_KEY").filter(|k| !k.is_empty());
        config.openai_api_key = get("OPENAI_API_KEY").filter(|k| !k.is_empty());
        if let Some(val) = get("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }
        if let Some(val) = get("TEMPERATURE") {
            config.temperature = parse_var("TEMPERATURE", &val)?;
        }

        if let Some(val) = get("SEARCH_PROVIDER") {
            config.search_provider = val.parse()?;
        }
        config.tavily_api_key = get("TAVILY_API_KEY").filter(|k| !k.is_empty());

        if let Some(val) = get("MAX_SOURCES") {
            config.max_sources = parse_var("MAX_SOURCES", &val)?;
        }
        if let Some(val) = get("MAX_ITERATIONS") {
            config.max_iterations = parse_var("MAX_ITERATIONS", &val)?;
        }
        if let Some(val) = get("RESULTS_PER_QUERY") {
            config.results_per_query = parse_var("RESULTS_PER_QUERY", &val)?;
        }
        if let Some(val) = get("EVALUATION_PRESET") {
            config.evaluation_preset = val.parse()?;
        }
        if let Some(val) = get("RUST_LOG") {
            config.log_level = val;
        }

        Ok(config)
    }

    /// Validate ranges and the credentials the selected backends need.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue {
                name: "TEMPERATURE",
                reason: format!("must be between 0.0 and 2.0, got {}", self.temperature),
            });
        }
        if self.max_sources == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_SOURCES",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.results_per_query == 0 {
            return Err(ConfigError::InvalidValue {
                name: "RESULTS_PER_QUERY",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.model.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "LLM_MODEL",
                reason: "cannot be empty".to_string(),
            });
        }

        match self.llm_provider {
            LlmProvider::Groq if self.groq_api_key.is_none() => {
                return Err(ConfigError::MissingCredential("GROQ_API_KEY"));
            }
            LlmProvider::OpenAi if self.openai_api_key.is_none() => {
                return Err(ConfigError::MissingCredential("OPENAI_API_KEY"));
            }
            _ => {}
        }
        if self.search_provider == SearchProvider::Tavily && self.tavily_api_key.is_none() {
            return Err(ConfigError::MissingCredential("TAVILY_API_KEY"));
        }

        Ok(())
    }

    /// Pipeline tunables derived from this configuration.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            max_sources: self.max_sources,
            results_per_query: self.results_per_query,
            max_iterations: self.max_iterations,
            temperature: self.temperature,
            evaluation_preset: self.evaluation_preset,
            ..PipelineSettings::default()
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        name,
        reason: format!("{:?}: {}", raw, e),
    })
}

// =============================================================================
// PIPELINE SETTINGS
// =============================================================================
/// Knobs the stages and the controller read while running.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Cap on unique sources kept by the researcher
    pub max_sources: usize,
    /// Results requested per generated sub-query
    pub results_per_query: usize,
    /// Number of search-query variants asked of the model
    pub query_variants: usize,
    /// Findings the extraction prompt asks for
    pub max_findings: usize,
    /// Revision loop bound
    pub max_iterations: u32,
    /// Critique score below which the researcher runs again
    pub revision_threshold: f64,
    pub temperature: f64,
    pub query_tokens: u64,
    pub findings_tokens: u64,
    pub critique_tokens: u64,
    pub synthesis_tokens: u64,
    pub evaluation_preset: EvaluationPreset,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_sources: 6,
            results_per_query: 3,
            query_variants: 3,
            max_findings: 5,
            max_iterations: 2,
            revision_threshold: 0.7,
            temperature: 0.7,
            query_tokens: 200,
            findings_tokens: 2000,
            critique_tokens: 800,
            synthesis_tokens: 4000,
            evaluation_preset: EvaluationPreset::Standard,
        }
    }
}
