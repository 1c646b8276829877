//! Evaluation CLI for the trademark opinion pipeline.
//!
//! Usage:
//!     eval analyze --name AQUASHINE --classes 3 --goods-services "shampoo" --conflicts conflicts.json
//!     eval web --name COLORGRIP --citations citations.json
//!     eval health
//!
//! Register extraction and document export live upstream/downstream of this
//! tool; candidates and citations are read from JSON fixture files in their
//! place. `--offline` swaps the Azure backend for one that always fails,
//! which exercises the degraded path end to end: every stage falls back to
//! its empty default and a placeholder opinion is still produced.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use markcounsel_backend_azure::{
    AzureOpenAiBackend, AzureOpenAiConfig, BackendError, LlmBackend,
};
use markcounsel_model::{CandidateConflict, CitationRecord, CompletionRequest, ProposedMark};
use markcounsel_opinion::{run_analysis, run_web_common_law};

#[derive(Parser)]
#[command(name = "eval")]
#[command(about = "Generate and evaluate trademark conflict opinions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Azure OpenAI endpoint (falls back to AZURE_OPENAI_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// Azure OpenAI deployment name
    #[arg(long, default_value = "gpt-4o")]
    deployment: String,

    /// Run without a live backend; stages degrade to their empty defaults
    #[arg(long)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the register analysis for a proposed mark
    Analyze {
        /// Proposed mark name
        #[arg(long)]
        name: String,

        /// Nice classes (comma-separated)
        #[arg(long)]
        classes: String,

        /// Goods and services description
        #[arg(long)]
        goods_services: String,

        /// Path to a JSON file with the candidate conflict list
        #[arg(long)]
        conflicts: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run the web common-law analysis for a proposed mark
    Web {
        /// Proposed mark name
        #[arg(long)]
        name: String,

        /// Path to a JSON file with extracted citation records
        #[arg(long)]
        citations: String,
    },

    /// Check backend health
    Health,
}

/// Backend stand-in for offline runs: every call fails, so every stage
/// degrades to its typed default.
struct OfflineBackend;

impl LlmBackend for OfflineBackend {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, BackendError> {
        Err(BackendError::Unavailable)
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        Err(BackendError::Unavailable)
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

enum Backend {
    Azure(AzureOpenAiBackend),
    Offline(OfflineBackend),
}

impl LlmBackend for Backend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        match self {
            Self::Azure(backend) => backend.complete(request).await,
            Self::Offline(backend) => backend.complete(request).await,
        }
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        match self {
            Self::Azure(backend) => backend.health_check().await,
            Self::Offline(backend) => backend.health_check().await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Azure(backend) => backend.name(),
            Self::Offline(backend) => backend.name(),
        }
    }
}

fn build_backend(cli: &Cli) -> Result<Backend> {
    if cli.offline {
        return Ok(Backend::Offline(OfflineBackend));
    }

    let endpoint = cli
        .endpoint
        .clone()
        .or_else(|| std::env::var("AZURE_OPENAI_ENDPOINT").ok())
        .context("No endpoint: pass --endpoint or set AZURE_OPENAI_ENDPOINT")?;
    let api_key = std::env::var("AZURE_OPENAI_API_KEY")
        .context("AZURE_OPENAI_API_KEY is not set")?;

    let config = AzureOpenAiConfig {
        endpoint,
        deployment: cli.deployment.clone(),
        api_key,
        ..Default::default()
    };
    Ok(Backend::Azure(AzureOpenAiBackend::new(config)?))
}

fn parse_classes(classes: &str) -> Vec<u16> {
    classes
        .split(',')
        .filter_map(|c| c.trim().parse().ok())
        .collect()
}

fn load_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Reading {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("Parsing {path}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("markcounsel=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let backend = build_backend(&cli)?;

    match &cli.command {
        Commands::Analyze {
            name,
            classes,
            goods_services,
            conflicts,
            format,
        } => {
            let proposed = ProposedMark::new(name, parse_classes(classes), goods_services);
            let candidates: Vec<CandidateConflict> = load_json(conflicts)?;

            println!("Analyzing: {} (class {})", proposed.name, classes);
            println!("Candidates: {}", candidates.len());
            println!("---");

            let document = run_analysis(&backend, &proposed, &candidates).await?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&document)?);
            } else {
                println!("{}", document.text);
                println!("---");
                println!(
                    "Excluded by relevance filter: {} candidates",
                    document.excluded_count
                );
            }
        }

        Commands::Web { name, citations } => {
            let records: Vec<CitationRecord> = load_json(citations)?;

            println!("Web common law analysis: {name}");
            println!("Citations: {}", records.len());
            println!("---");

            let document = run_web_common_law(&backend, name, &records).await?;
            println!("{}", document.text);
        }

        Commands::Health => {
            print!("Checking {} backend... ", backend.name());
            match backend.health_check().await {
                Ok(()) => println!("OK"),
                Err(e) => {
                    println!("FAILED: {e}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
