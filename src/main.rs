//! # Multi-Agent Research CLI
//!
//! Runs one research job end to end and prints (or writes) the report.
//!
//! ## Quick Start
//! ```bash
//! export GROQ_API_KEY=... TAVILY_API_KEY=...
//! cargo run -- "What is RAG in AI?"
//!
//! # keyless search, local model
//! cargo run -- --provider ollama --model llama3.2 --search duckduckgo "Rust async runtimes"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use futures::StreamExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use multi_agent_research::jobs::{JobStore, ResearchRequest, DEFAULT_STREAM_INTERVAL};
use multi_agent_research::{
    search, CitationStyle, Config, EvaluationPreset, JobStatus, LlmProvider, ResearchPipeline,
    RigLlmGateway, SearchProvider,
};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "multi-agent-research",
    version,
    about = "Research a question with a researcher/critic/synthesizer pipeline and score the report",
    long_about = r#"
Multi-Agent Research - search, critique, synthesize, evaluate.

The pipeline:
  1. Generates search-query variants and gathers web sources
  2. Extracts findings and critiques them (revising when quality is low)
  3. Writes a structured report
  4. Scores it: relevancy, faithfulness, coherence, completeness, citations

CONFIGURATION (environment or .env):
  LLM_PROVIDER, LLM_MODEL, GROQ_API_KEY, OPENAI_API_KEY, OLLAMA_API_BASE_URL,
  SEARCH_PROVIDER, TAVILY_API_KEY, MAX_SOURCES, MAX_ITERATIONS, EVALUATION_PRESET

EXAMPLES:
  multi-agent-research "What is RAG in AI?"
  multi-agent-research --citation-style mla --output rag.md "What is RAG in AI?"
  multi-agent-research --format json --preset compact "Vector databases compared"
"#
)]
struct Args {
    /// The research question
    #[arg(value_name = "QUERY")]
    query: String,

    /// Revision loop bound
    #[arg(long = "max-iterations", env = "MAX_ITERATIONS")]
    max_iterations: Option<u32>,

    /// Model id
    #[arg(short = 'm', long = "model", env = "LLM_MODEL")]
    model: Option<String>,

    /// LLM provider: groq, openai or ollama
    #[arg(long = "provider", env = "LLM_PROVIDER")]
    provider: Option<LlmProvider>,

    /// Search backend: tavily or duckduckgo
    #[arg(long = "search", env = "SEARCH_PROVIDER")]
    search: Option<SearchProvider>,

    /// Reference style: apa, mla or chicago
    #[arg(long = "citation-style", default_value = "apa")]
    citation_style: String,

    /// Output format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,

    /// Scoring preset: standard or compact
    #[arg(long = "preset", env = "EVALUATION_PRESET")]
    preset: Option<EvaluationPreset>,

    /// Write the report to a file instead of stdout
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(max_iterations) = self.max_iterations {
            config.max_iterations = max_iterations;
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(provider) = self.provider {
            config.llm_provider = provider;
        }
        if let Some(search) = self.search {
            config.search_provider = search;
        }
        if let Some(preset) = self.preset {
            config.evaluation_preset = preset;
        }
    }
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap so env-backed flags see it
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    args.apply(&mut config);
    init_logging(&config.log_level, args.verbose)?;

    config.validate().context("Invalid configuration")?;
    info!(
        provider = %config.llm_provider,
        model = %config.model,
        search = %config.search_provider,
        max_iterations = config.max_iterations,
        preset = %config.evaluation_preset,
        "Configuration loaded"
    );

    let llm = Arc::new(RigLlmGateway::from_config(&config));
    let search = search::from_config(&config).context("Failed to build search backend")?;
    let pipeline = Arc::new(ResearchPipeline::new(llm, search, config.pipeline_settings()));

    let store = JobStore::new();
    let job_id = store
        .submit(pipeline, ResearchRequest::new(args.query.clone()))
        .await;

    let mut events = Box::pin(store.stream(job_id, DEFAULT_STREAM_INTERVAL));
    let mut last_stage = None;
    while let Some(event) = events.next().await {
        let snapshot = &event.0;
        if snapshot.current_agent.is_some() && snapshot.current_agent != last_stage {
            last_stage = snapshot.current_agent;
            if let Some(stage) = last_stage {
                info!(stage = %stage, progress = snapshot.progress, "Stage running");
            }
        }
        if event.is_terminal() {
            break;
        }
    }

    let snapshot = store
        .snapshot(job_id)
        .await
        .context("Job disappeared from the store")?;

    if snapshot.status == JobStatus::Error {
        let message = snapshot.error.unwrap_or_else(|| "unknown error".to_string());
        error!(error = %message, "Research failed");
        bail!("Research failed: {}", message);
    }

    let rendered = match args.format {
        OutputFormat::Markdown => store
            .export_markdown(job_id, CitationStyle::from_name(&args.citation_style))
            .await?,
        OutputFormat::Json => serde_json::to_string_pretty(&snapshot.result)
            .context("Failed to serialize research result")?,
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{}", rendered),
    }

    if let Some(scores) = snapshot.result.as_ref().and_then(|s| s.evaluation.as_ref()) {
        info!(overall = scores.overall, grade = %scores.grade, "Research completed");
    }
    Ok(())
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// `RUST_LOG` (or the config's level) unless `--verbose` forces debug.
fn init_logging(level: &str, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["test", "What is RAG?"]);
        assert_eq!(args.query, "What is RAG?");
        assert_eq!(args.format, OutputFormat::Markdown);
        assert_eq!(args.citation_style, "apa");
        assert!(args.provider.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "test",
            "--provider", "ollama",
            "--model", "llama3.2",
            "--search", "ddg",
            "--preset", "compact",
            "--max-iterations", "0",
            "--format", "json",
            "--verbose",
            "Test query",
        ]);
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.llm_provider, LlmProvider::Ollama);
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.search_provider, SearchProvider::DuckDuckGo);
        assert_eq!(config.evaluation_preset, EvaluationPreset::Compact);
        assert_eq!(config.max_iterations, 0);
        assert_eq!(args.format, OutputFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags_fall_back_to_env() {
        use clap::CommandFactory;

        let cmd = Args::command();
        let env_of = |id: &str| {
            cmd.get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .and_then(|env| env.to_str())
                .map(str::to_string)
        };

        assert_eq!(env_of("model").as_deref(), Some("LLM_MODEL"));
        assert_eq!(env_of("provider").as_deref(), Some("LLM_PROVIDER"));
        assert_eq!(env_of("search").as_deref(), Some("SEARCH_PROVIDER"));
        assert_eq!(env_of("preset").as_deref(), Some("EVALUATION_PRESET"));
        assert_eq!(env_of("max_iterations").as_deref(), Some("MAX_ITERATIONS"));
        assert_eq!(env_of("query"), None);
    }

    #[test]
    fn test_invalid_provider_rejected() {
        assert!(Args::try_parse_from(["test", "--provider", "claude", "q"]).is_err());
    }
}
