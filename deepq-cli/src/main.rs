//! DeepQ CLI
//!
//! Iterative web research: query, search, scrape, summarize, repeat, then
//! write a cited report.

mod server;

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use deepq_agents::PromptSet;
use deepq_core::{
    CollectingSink, FailureEnvelope, ModelProvider, ResearchConfig, SearchProviderKind,
    SearchResponse, SharedSink, TeeSink, TracingSink,
};
use deepq_net::{create_provider, ScrapeConfig, SearchAdapter, WebSearcher};
use deepq_runtime::ResearchController;

#[derive(Parser)]
#[command(name = "deepq")]
#[command(author, version, about = "DeepQ: iterative web research with cited reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

/// Model and search provider selection shared by every subcommand
#[derive(Args, Clone)]
struct ProviderArgs {
    /// LLM model to use (default depends on the provider)
    #[arg(short, long, env = "DEEPQ_MODEL")]
    model: Option<String>,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Anthropic API key (or set ANTHROPIC_API_KEY env var)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_key: Option<String>,

    /// OpenRouter API key (or set OPENROUTER_API_KEY env var)
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    openrouter_key: Option<String>,

    /// Use Anthropic instead of OpenAI
    #[arg(long, conflicts_with = "openrouter")]
    anthropic: bool,

    /// Use OpenRouter instead of OpenAI
    #[arg(long)]
    openrouter: bool,

    /// Tavily API key (or set TAVILY_API_KEY env var)
    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true)]
    tavily_key: Option<String>,

    /// Brave Search API key (or set BRAVE_API_KEY env var)
    #[arg(long, env = "BRAVE_API_KEY", hide_env_values = true)]
    brave_key: Option<String>,

    /// Search with Brave instead of Tavily
    #[arg(long)]
    brave: bool,

    /// Directory of prompt TOML files overriding the built-in prompts
    #[arg(long)]
    prompts: Option<PathBuf>,
}

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_OPENROUTER_MODEL: &str = "openai/gpt-4o";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

impl ProviderArgs {
    fn model_id(&self) -> String {
        let default = if self.openrouter {
            DEFAULT_OPENROUTER_MODEL
        } else if self.anthropic {
            DEFAULT_ANTHROPIC_MODEL
        } else {
            DEFAULT_OPENAI_MODEL
        };
        self.model.clone().unwrap_or_else(|| default.to_string())
    }

    fn model_provider(&self) -> (ModelProvider, Option<String>) {
        if self.openrouter {
            (ModelProvider::OpenRouter, self.openrouter_key.clone())
        } else if self.anthropic {
            (ModelProvider::Anthropic, self.anthropic_key.clone())
        } else {
            (ModelProvider::OpenAI, self.api_key.clone())
        }
    }

    fn search_provider(&self) -> (SearchProviderKind, Option<String>) {
        if self.brave {
            (SearchProviderKind::Brave, self.brave_key.clone())
        } else {
            (SearchProviderKind::Tavily, self.tavily_key.clone())
        }
    }

    fn apply(&self, config: ResearchConfig) -> ResearchConfig {
        let (model_provider, model_key) = self.model_provider();
        let (search_provider, search_key) = self.search_provider();
        config
            .with_model(model_provider, &self.model_id())
            .with_model_key(model_key)
            .with_search(search_provider, search_key)
    }

    fn load_prompts(&self) -> Result<PromptSet> {
        let prompts = match &self.prompts {
            Some(dir) => PromptSet::load_with_overrides(dir)
                .with_context(|| format!("loading prompts from {}", dir.display()))?,
            None => PromptSet::load_embedded()?,
        };
        Ok(prompts)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Research a topic and write a cited report
    Research {
        /// The topic to research
        #[arg(short, long)]
        topic: String,

        /// Number of research iterations (1-5)
        #[arg(short, long, default_value = "3")]
        cycles: u32,

        /// Search results requested per query
        #[arg(long, default_value = "10")]
        max_results: usize,

        /// Pages scraped per cycle
        #[arg(long, default_value = "5")]
        max_urls: usize,

        /// Output file for the report (default: report_<timestamp>.md)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the full result as JSON to this file
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write the run's event log as JSON to this file
        #[arg(long)]
        events: Option<PathBuf>,

        /// Maximum runtime in seconds
        #[arg(long, default_value = "600")]
        timeout: u64,

        #[command(flatten)]
        providers: ProviderArgs,
    },

    /// Run a single web search and print the results as JSON
    Search {
        /// The search query
        #[arg(short, long)]
        query: String,

        /// Maximum number of results
        #[arg(long, default_value = "5")]
        max_results: usize,

        #[command(flatten)]
        providers: ProviderArgs,
    },

    /// Serve the research API over HTTP
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(short, long, env = "API_PORT", default_value = "8771")]
        port: u16,

        /// Maximum runtime per research request in seconds
        #[arg(long, default_value = "600")]
        timeout: u64,

        #[command(flatten)]
        providers: ProviderArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Research {
            topic,
            cycles,
            max_results,
            max_urls,
            output,
            json,
            events,
            timeout,
            providers,
        } => {
            let config = providers.apply(
                ResearchConfig::new(&topic)
                    .with_cycles(cycles)
                    .with_max_results(max_results)
                    .with_max_urls(max_urls),
            );
            let prompts = providers.load_prompts()?;
            run_research(config, &prompts, output, json, events, timeout).await?;
        }
        Commands::Search {
            query,
            max_results,
            providers,
        } => {
            run_search(&query, max_results, &providers).await?;
        }
        Commands::Serve {
            host,
            port,
            timeout,
            providers,
        } => {
            let defaults = providers.apply(ResearchConfig::default());
            let prompts = providers.load_prompts()?;
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("invalid bind address {}:{}", host, port))?;

            let state = server::AppState::new(defaults, prompts, ScrapeConfig::default(), Duration::from_secs(timeout));
            server::serve(state, addr).await?;
        }
    }

    Ok(())
}

async fn run_research(
    config: ResearchConfig,
    prompts: &PromptSet,
    output: Option<PathBuf>,
    json: Option<PathBuf>,
    events: Option<PathBuf>,
    timeout: u64,
) -> Result<()> {
    println!("🔎 DeepQ - Iterative Web Research\n");
    println!("📡 Model: {} ({:?})", config.model_id, config.model_provider);
    println!("🌐 Search: {}", config.search_provider.as_str());
    println!("📚 Topic: {}", config.topic);
    println!("🔁 Cycles: {} | ⏱️  Timeout: {}s\n", config.max_cycles, timeout);

    let topic = config.topic.clone();
    let collector = Arc::new(CollectingSink::new());
    let sink: SharedSink = Arc::new(TeeSink::new(Arc::new(TracingSink), collector.clone()));

    let mut controller = ResearchController::from_config(config, prompts, ScrapeConfig::default(), sink)?;
    let result = controller.run_with_timeout(Duration::from_secs(timeout)).await;

    if let Some(path) = events {
        fs::write(&path, serde_json::to_string_pretty(&collector.records())?)?;
        println!("🧾 Event log saved to: {}", path.display());
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            let envelope = FailureEnvelope::new(&topic, &e);
            eprintln!("{}", serde_json::to_string_pretty(&envelope)?);
            return Err(e.into());
        }
    };

    let output_path = output.unwrap_or_else(|| {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S");
        PathBuf::from(format!("report_{}.md", timestamp))
    });
    fs::write(&output_path, &report.final_report)?;

    if let Some(path) = json {
        fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        println!("🗂️  JSON result saved to: {}", path.display());
    }

    println!("\n✅ Research complete!");
    println!(
        "📊 {} productive cycles, {} search results",
        report.cycles_completed,
        report.all_hits.len()
    );
    println!("📄 Report saved to: {}", output_path.display());

    println!("\n{}", "=".repeat(60));
    let preview: String = report.final_report.chars().take(1000).collect();
    println!("{}", preview);
    if report.final_report.chars().count() > 1000 {
        println!("...\n[truncated - see full report in output file]");
    }

    Ok(())
}

async fn run_search(query: &str, max_results: usize, providers: &ProviderArgs) -> Result<()> {
    let (kind, key) = providers.search_provider();
    let key = key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| anyhow!("{} API key required. Set it via flag or environment", kind.as_str()))?;

    let searcher = WebSearcher::new(create_provider(kind, &key)?);
    let results = searcher.search(query, max_results).await;

    let response = SearchResponse {
        query: query.to_string(),
        results,
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn providers(args: &[&str]) -> ProviderArgs {
        let argv = ["deepq", "search", "--query", "q"].iter().chain(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Search { providers, .. } => providers,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_default_model_follows_provider() {
        let config = providers(&["--anthropic"]).apply(ResearchConfig::new("t"));
        assert_eq!(config.model_provider, ModelProvider::Anthropic);
        assert_eq!(config.model_id, DEFAULT_ANTHROPIC_MODEL);

        let config = providers(&["--openrouter"]).apply(ResearchConfig::new("t"));
        assert_eq!(config.model_id, DEFAULT_OPENROUTER_MODEL);
    }

    #[test]
    fn test_explicit_model_wins() {
        let config = providers(&["--anthropic", "--model", "claude-3-5-haiku-20241022"])
            .apply(ResearchConfig::new("t"));
        assert_eq!(config.model_id, "claude-3-5-haiku-20241022");
    }
}
