//! Research Controller
//!
//! Owns all mutable state of one research run and sequences the agents:
//! - Every outer iteration runs one cycle and one reflection
//! - A cycle whose search comes back empty skips scraping and summarizing
//!   and does not count as completed
//! - Model failures abort the run and discard its state
//!
//! Steps are awaited strictly in order; nothing runs concurrently inside a run.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

use deepq_agents::{backend_for, AgentError, PromptSet, ResearchAgents, SummaryUpdate};
use deepq_core::{
    ConfigError, ResearchConfig, ResearchEvent, ResearchReport, RunEvents, ScrapedDoc, SearchHit,
    SharedSink, SourceRegistry,
};
use deepq_net::{create_provider, ScrapeAdapter, ScrapeConfig, SearchAdapter, WebScraper, WebSearcher};

/// Errors that end a research run
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Failed to set up {0}: {1}")]
    Setup(&'static str, String),

    #[error("Research timed out after {0:?}")]
    Timeout(Duration),
}

/// Where the controller is in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    GenerateQuery,
    Search,
    Scrape,
    Summarize,
    Reflect,
    Finalize,
    Done,
    Failed,
}

/// Mutable state accumulated across cycles
#[derive(Debug, Clone, Default)]
pub struct ResearchState {
    /// Latest synthesis; replaced every productive cycle
    pub current_summary: String,
    pub cycles_completed: u32,
    /// Every hit of every productive cycle, duplicates included
    pub all_hits: Vec<SearchHit>,
    pub sources: SourceRegistry,
}

/// What a single cycle produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Productive { hits: usize, scraped: usize },
    NoResults,
}

/// The research cycle state machine
pub struct ResearchController {
    config: ResearchConfig,
    agents: ResearchAgents,
    searcher: Arc<dyn SearchAdapter>,
    scraper: Arc<dyn ScrapeAdapter>,
    events: RunEvents,
    state: ResearchState,
    phase: Phase,
    iteration: u32,
}

impl ResearchController {
    /// Create a controller from pre-built collaborators
    pub fn new(
        config: ResearchConfig,
        agents: ResearchAgents,
        searcher: Arc<dyn SearchAdapter>,
        scraper: Arc<dyn ScrapeAdapter>,
        sink: SharedSink,
    ) -> Result<Self, ResearchError> {
        config.validate()?;
        info!(
            "Initializing research controller with model {}",
            agents.model_name()
        );

        Ok(Self {
            config,
            agents,
            searcher,
            scraper,
            events: RunEvents::new(sink),
            state: ResearchState::default(),
            phase: Phase::Init,
            iteration: 0,
        })
    }

    /// Build the real backend, search provider and scraper named by the config
    pub fn from_config(
        config: ResearchConfig,
        prompts: &PromptSet,
        scrape_config: ScrapeConfig,
        sink: SharedSink,
    ) -> Result<Self, ResearchError> {
        config.validate()?;
        config.require_credentials()?;

        let backend = backend_for(&config).map_err(|e| ResearchError::Setup("model backend", e.to_string()))?;
        let search_key = config.search_api_key.as_deref().unwrap_or_default();
        let provider = create_provider(config.search_provider, search_key)
            .map_err(|e| ResearchError::Setup("search provider", e.to_string()))?;
        let scraper = WebScraper::new(scrape_config).map_err(|e| ResearchError::Setup("scraper", e.to_string()))?;

        Self::new(
            config,
            ResearchAgents::new(backend, prompts),
            Arc::new(WebSearcher::new(provider)),
            Arc::new(scraper),
            sink,
        )
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub fn state(&self) -> &ResearchState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn run_id(&self) -> String {
        self.events.run_id().to_string()
    }

    /// Clear all state and start a new run id
    pub fn reset(&mut self) {
        self.state = ResearchState::default();
        self.iteration = 0;
        self.phase = Phase::Init;
        self.events.renew();
    }

    fn enter(&mut self, phase: Phase) {
        debug!("Phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Ask the model for the next search query
    pub async fn generate_search_query(&mut self) -> Result<String, ResearchError> {
        self.enter(Phase::GenerateQuery);
        let generated = self
            .agents
            .query
            .generate(&self.config.topic, &self.state.current_summary, &self.config.budget)
            .await?;

        self.events.emit(ResearchEvent::QueryGenerated {
            query: generated.query.clone(),
        });
        Ok(generated.query)
    }

    /// Search the web; failures already arrive as an empty list
    pub async fn perform_web_search(&mut self, query: &str) -> Vec<SearchHit> {
        self.enter(Phase::Search);
        let mut hits = self
            .searcher
            .search(query, self.config.max_results_per_query)
            .await;
        hits.truncate(self.config.max_results_per_query);

        self.events.emit(ResearchEvent::SearchCompleted {
            query: query.to_string(),
            hit_count: hits.len(),
        });
        hits
    }

    /// Scrape the top hits one after another, dropping failures
    pub async fn scrape_search_results(&mut self, hits: &[SearchHit]) -> Vec<ScrapedDoc> {
        self.enter(Phase::Scrape);
        let urls: Vec<&str> = hits
            .iter()
            .take(self.config.max_urls_per_cycle)
            .map(|hit| hit.url.as_str())
            .collect();

        let mut docs = Vec::with_capacity(urls.len());
        for url in &urls {
            if let Some(doc) = self.scraper.scrape(url).await {
                docs.push(doc);
            }
        }

        self.events.emit(ResearchEvent::ScrapeCompleted {
            attempted: urls.len(),
            scraped: docs.len(),
        });
        docs
    }

    /// Fold a cycle's findings into a replacement summary
    pub async fn update_summary(
        &mut self,
        hits: &[SearchHit],
        docs: &[ScrapedDoc],
    ) -> Result<SummaryUpdate, ResearchError> {
        self.enter(Phase::Summarize);
        let update = self
            .agents
            .summarizer
            .update(
                &self.config.topic,
                &self.state.current_summary,
                hits,
                docs,
                &self.config.budget,
            )
            .await?;
        Ok(update)
    }

    /// Register every hit as a citation source
    pub fn update_sources(&mut self, hits: &[SearchHit]) {
        let added = self.state.sources.extend_from_hits(hits);
        self.events.emit(ResearchEvent::SourcesUpdated {
            added,
            total: self.state.sources.len(),
        });
    }

    /// Critique the current summary. The critique only goes to the event sink.
    pub async fn reflect_on_research(&mut self) -> Result<String, ResearchError> {
        self.enter(Phase::Reflect);
        let critique = self
            .agents
            .reflector
            .reflect(&self.config.topic, &self.state.current_summary, &self.config.budget)
            .await?;

        self.events.emit(ResearchEvent::Reflection {
            iteration: self.iteration,
            cycles_completed: self.state.cycles_completed,
            critique: critique.clone(),
        });
        Ok(critique)
    }

    /// Query, search, scrape and summarize once
    pub async fn run_research_cycle(&mut self) -> Result<CycleOutcome, ResearchError> {
        self.events.emit(ResearchEvent::CycleStarted {
            iteration: self.iteration,
            cycles_completed: self.state.cycles_completed,
        });

        let query = self.generate_search_query().await?;

        let hits = self.perform_web_search(&query).await;
        if hits.is_empty() {
            self.events.emit(ResearchEvent::CycleSkipped {
                iteration: self.iteration,
            });
            return Ok(CycleOutcome::NoResults);
        }

        let docs = self.scrape_search_results(&hits).await;

        let update = self.update_summary(&hits, &docs).await?;
        self.state.current_summary = update.summary;
        self.events.emit(ResearchEvent::SummaryUpdated {
            chars: self.state.current_summary.chars().count(),
            clipped: update.clipped,
        });

        self.update_sources(&hits);
        let hit_count = hits.len();
        self.state.all_hits.extend(hits);
        self.state.cycles_completed += 1;

        Ok(CycleOutcome::Productive {
            hits: hit_count,
            scraped: docs.len(),
        })
    }

    /// Have the model write the report, then append the citation list
    pub async fn generate_final_report(&mut self) -> Result<String, ResearchError> {
        self.enter(Phase::Finalize);
        let report = self
            .agents
            .reporter
            .generate(
                &self.config.topic,
                &self.state.current_summary,
                self.state.cycles_completed,
                self.state.sources.sources(),
            )
            .await?;

        self.events.emit(ResearchEvent::ReportGenerated {
            cycles_completed: self.state.cycles_completed,
            source_count: self.state.sources.len(),
            hit_count: self.state.all_hits.len(),
        });
        Ok(report)
    }

    async fn execute(&mut self) -> Result<ResearchReport, ResearchError> {
        self.events.emit(ResearchEvent::RunStarted {
            topic: self.config.topic.clone(),
            max_cycles: self.config.max_cycles,
        });

        for iteration in 1..=self.config.max_cycles {
            self.iteration = iteration;
            let outcome = self.run_research_cycle().await?;
            debug!("Iteration {} outcome: {:?}", iteration, outcome);

            self.reflect_on_research().await?;
        }

        let final_report = self.generate_final_report().await?;
        self.enter(Phase::Done);

        Ok(ResearchReport {
            topic: self.config.topic.clone(),
            cycles_completed: self.state.cycles_completed,
            final_summary: self.state.current_summary.clone(),
            final_report,
            all_hits: self.state.all_hits.clone(),
        })
    }

    /// Discard everything accumulated by a failed run
    fn abort(&mut self, err: &ResearchError) {
        error!("Research run {} failed in {:?}: {}", self.events.run_id(), self.phase, err);
        self.events.emit(ResearchEvent::RunFailed { error: err.to_string() });
        self.state = ResearchState::default();
        self.phase = Phase::Failed;
    }

    /// Run every configured iteration and produce the report.
    /// Either all iterations complete or nothing is returned.
    pub async fn run_full_research(&mut self) -> Result<ResearchReport, ResearchError> {
        self.reset();
        info!("Starting full research on topic: {}", self.config.topic);

        match self.execute().await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.abort(&e);
                Err(e)
            }
        }
    }

    /// [`Self::run_full_research`] bounded by a wall-clock limit
    pub async fn run_with_timeout(&mut self, limit: Duration) -> Result<ResearchReport, ResearchError> {
        match tokio::time::timeout(limit, self.run_full_research()).await {
            Ok(result) => result,
            Err(_) => {
                let err = ResearchError::Timeout(limit);
                self.abort(&err);
                Err(err)
            }
        }
    }
}
