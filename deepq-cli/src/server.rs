//! HTTP service
//!
//! Every research request gets its own controller built from the server
//! defaults overlaid with the request's fields. Nothing is shared between
//! requests except the defaults and the prompt set.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use deepq_agents::PromptSet;
use deepq_core::{
    FailureEnvelope, ResearchConfig, SearchRequest, SearchResponse, SharedSink, TracingSink,
};
use deepq_net::{create_provider, ScrapeConfig, SearchAdapter, WebSearcher};
use deepq_runtime::ResearchController;

/// Default number of cycles for HTTP research requests
const DEFAULT_REQUEST_CYCLES: u32 = 2;

/// Body of `POST /research`
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
    #[serde(default = "default_cycles")]
    pub cycles: u32,
    #[serde(default, alias = "tavily_api_key")]
    pub search_api_key: Option<String>,
    #[serde(default, alias = "openai_api_key")]
    pub model_api_key: Option<String>,
    #[serde(default, alias = "openai_model")]
    pub model_id: Option<String>,
}

fn default_cycles() -> u32 {
    DEFAULT_REQUEST_CYCLES
}

/// State shared by all handlers
pub struct AppState {
    defaults: ResearchConfig,
    prompts: PromptSet,
    scrape: ScrapeConfig,
    run_timeout: Duration,
}

impl AppState {
    pub fn new(defaults: ResearchConfig, prompts: PromptSet, scrape: ScrapeConfig, run_timeout: Duration) -> Self {
        Self {
            defaults,
            prompts,
            scrape,
            run_timeout,
        }
    }

    /// Request fields win over server defaults; blank strings count as absent
    fn config_for(&self, request: &ResearchRequest) -> ResearchConfig {
        let mut config = self.defaults.clone();
        config.topic = request.topic.clone();
        config.max_cycles = request.cycles;

        if let Some(key) = non_blank(&request.search_api_key) {
            config.search_api_key = Some(key);
        }
        if let Some(key) = non_blank(&request.model_api_key) {
            config.model_api_key = Some(key);
        }
        if let Some(model) = non_blank(&request.model_id) {
            config.model_id = model;
        }
        config
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

fn mask(key: &Option<String>) -> &'static str {
    if key.is_some() {
        "********"
    } else {
        "Not set"
    }
}

fn log_config(config: &ResearchConfig) {
    info!("Research configuration:");
    info!("- Topic: {}", config.topic);
    info!("- Max research cycles: {}", config.max_cycles);
    info!("- Max search results per query: {}", config.max_results_per_query);
    info!("- Max URLs to scrape per cycle: {}", config.max_urls_per_cycle);
    info!("- Model: {} ({:?})", config.model_id, config.model_provider);
    info!("- Model API key: {}", mask(&config.model_api_key));
    info!(
        "- Search provider: {} (key {})",
        config.search_provider.as_str(),
        mask(&config.search_api_key)
    );
}

fn failure(status: StatusCode, topic: &str, error: impl ToString) -> Response {
    (status, Json(FailureEnvelope::new(topic, error))).into_response()
}

/// Build the router with tracing on every request
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/research", post(research))
        .route("/search", post(search))
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

/// Serve until ctrl-c
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

async fn index() -> impl IntoResponse {
    Json(json!({
        "name": "DeepQ Research API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/research": "POST - Perform deep research on a topic",
            "/search": "POST - Perform a web search",
            "/health": "GET - Check API health"
        }
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn research(State(state): State<Arc<AppState>>, Json(request): Json<ResearchRequest>) -> Response {
    info!("Starting research on topic: {} (cycles={})", request.topic, request.cycles);

    let config = state.config_for(&request);
    if let Err(e) = config.validate().and_then(|_| config.require_credentials()) {
        warn!("Rejected research request: {}", e);
        return failure(StatusCode::BAD_REQUEST, &request.topic, e);
    }
    log_config(&config);

    let sink: SharedSink = Arc::new(TracingSink);
    let mut controller =
        match ResearchController::from_config(config, &state.prompts, state.scrape.clone(), sink) {
            Ok(controller) => controller,
            Err(e) => {
                error!("Failed to build research controller: {}", e);
                return failure(StatusCode::INTERNAL_SERVER_ERROR, &request.topic, e);
            }
        };

    let started = Instant::now();
    match controller.run_with_timeout(state.run_timeout).await {
        Ok(report) => {
            info!("Research completed in {:.2} seconds", started.elapsed().as_secs_f64());
            info!("Completed {} research cycles", report.cycles_completed);
            info!("Analyzed {} search results", report.all_hits.len());
            Json(report).into_response()
        }
        Err(e) => {
            error!("Error during research: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, &request.topic, e)
        }
    }
}

async fn search(State(state): State<Arc<AppState>>, Json(request): Json<SearchRequest>) -> Response {
    info!(
        "Performing search for query: {} (max {})",
        request.query, request.max_results
    );

    let Some(key) = non_blank(&state.defaults.search_api_key) else {
        return failure(
            StatusCode::BAD_REQUEST,
            &request.query,
            format!("{} API key not configured", state.defaults.search_provider.as_str()),
        );
    };
    let provider = match create_provider(state.defaults.search_provider, &key) {
        Ok(provider) => provider,
        Err(e) => return failure(StatusCode::INTERNAL_SERVER_ERROR, &request.query, e),
    };

    let started = Instant::now();
    let results = WebSearcher::new(provider)
        .search(&request.query, request.max_results)
        .await;
    info!(
        "Search returned {} results in {:.2} seconds",
        results.len(),
        started.elapsed().as_secs_f64()
    );

    Json(SearchResponse {
        query: request.query,
        results,
    })
    .into_response()
}
