//! Per-run structured events
//!
//! The controller reports what it does through an [`EventSink`] handed to it
//! at construction, so each run carries its own observability channel.
//! Reflections are only ever surfaced here.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Something that happened during a research run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    RunStarted {
        topic: String,
        max_cycles: u32,
    },
    CycleStarted {
        iteration: u32,
        cycles_completed: u32,
    },
    QueryGenerated {
        query: String,
    },
    SearchCompleted {
        query: String,
        hit_count: usize,
    },
    ScrapeCompleted {
        attempted: usize,
        scraped: usize,
    },
    SummaryUpdated {
        chars: usize,
        clipped: bool,
    },
    SourcesUpdated {
        added: usize,
        total: usize,
    },
    CycleSkipped {
        iteration: u32,
    },
    Reflection {
        iteration: u32,
        cycles_completed: u32,
        critique: String,
    },
    ReportGenerated {
        cycles_completed: u32,
        source_count: usize,
        hit_count: usize,
    },
    RunFailed {
        error: String,
    },
}

impl ResearchEvent {
    /// Stable name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            ResearchEvent::RunStarted { .. } => "run_started",
            ResearchEvent::CycleStarted { .. } => "cycle_started",
            ResearchEvent::QueryGenerated { .. } => "query_generated",
            ResearchEvent::SearchCompleted { .. } => "search_completed",
            ResearchEvent::ScrapeCompleted { .. } => "scrape_completed",
            ResearchEvent::SummaryUpdated { .. } => "summary_updated",
            ResearchEvent::SourcesUpdated { .. } => "sources_updated",
            ResearchEvent::CycleSkipped { .. } => "cycle_skipped",
            ResearchEvent::Reflection { .. } => "reflection",
            ResearchEvent::ReportGenerated { .. } => "report_generated",
            ResearchEvent::RunFailed { .. } => "run_failed",
        }
    }
}

/// An event stamped with its run and time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub run_id: Uuid,
    pub at: DateTime<Utc>,
    pub event: ResearchEvent,
}

/// Destination for run events
pub trait EventSink: Send + Sync {
    fn record(&self, record: EventRecord);
}

/// Thread-safe reference to an event sink
pub type SharedSink = Arc<dyn EventSink>;

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, record: EventRecord) {
        let run = record.run_id;
        match &record.event {
            ResearchEvent::RunStarted { topic, max_cycles } => {
                info!(%run, "Starting research on '{}' ({} cycles)", topic, max_cycles)
            }
            ResearchEvent::CycleStarted { iteration, cycles_completed } => info!(
                %run,
                "Starting iteration {} ({} productive cycles so far)",
                iteration, cycles_completed
            ),
            ResearchEvent::QueryGenerated { query } => {
                info!(%run, "Generated search query: {}", query)
            }
            ResearchEvent::SearchCompleted { hit_count, .. } => {
                info!(%run, "Found {} search results", hit_count)
            }
            ResearchEvent::ScrapeCompleted { attempted, scraped } => {
                info!(%run, "Scraped {}/{} URLs successfully", scraped, attempted)
            }
            ResearchEvent::SummaryUpdated { chars, clipped } => {
                debug!(%run, chars, clipped, "Summary updated")
            }
            ResearchEvent::SourcesUpdated { added, total } => {
                debug!(%run, added, total, "Sources updated")
            }
            ResearchEvent::CycleSkipped { iteration } => {
                warn!(%run, "No search results in iteration {}, moving on", iteration)
            }
            ResearchEvent::Reflection { iteration, critique, .. } => {
                info!(%run, "Reflection after iteration {}:\n{}", iteration, critique)
            }
            ResearchEvent::ReportGenerated { cycles_completed, source_count, hit_count } => info!(
                %run,
                "Generated final report: {} cycles, {} sources, {} results",
                cycles_completed, source_count, hit_count
            ),
            ResearchEvent::RunFailed { error } => warn!(%run, "Research run failed: {}", error),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<EventRecord>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }

    /// Number of events of the given kind
    pub fn count(&self, kind: &str) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.event.kind() == kind)
            .count()
    }

    /// Critiques in the order they were produced
    pub fn reflections(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match &r.event {
                ResearchEvent::Reflection { critique, .. } => Some(critique.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn record(&self, record: EventRecord) {
        self.records.lock().push(record);
    }
}

/// Records into both sinks
pub struct TeeSink {
    first: SharedSink,
    second: SharedSink,
}

impl TeeSink {
    pub fn new(first: SharedSink, second: SharedSink) -> Self {
        Self { first, second }
    }
}

impl EventSink for TeeSink {
    fn record(&self, record: EventRecord) {
        self.first.record(record.clone());
        self.second.record(record);
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _record: EventRecord) {}
}

/// Stamps events with one run id before handing them to a sink
#[derive(Clone)]
pub struct RunEvents {
    run_id: Uuid,
    sink: SharedSink,
}

impl RunEvents {
    pub fn new(sink: SharedSink) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            sink,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Start a fresh run id on the same sink
    pub fn renew(&mut self) {
        self.run_id = Uuid::new_v4();
    }

    pub fn emit(&self, event: ResearchEvent) {
        self.sink.record(EventRecord {
            run_id: self.run_id,
            at: Utc::now(),
            event,
        });
    }
}
