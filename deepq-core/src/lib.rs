//! DeepQ Core - data model for iterative web research
//!
//! This crate provides the foundational primitives:
//! - Research configuration and prompt size budgets
//! - Search hits, scraped documents, sources and the final report
//! - Deduplicated source registry and citation formatting
//! - Model-output cleanup for search queries
//! - Per-run structured event sink

pub mod config;
pub mod types;
pub mod registry;
pub mod citations;
pub mod text;
pub mod events;

pub use config::*;
pub use types::*;
pub use registry::*;
pub use citations::*;
pub use text::*;
pub use events::*;

/// Default year for sources whose provider gave no publication date
pub const UNKNOWN_YEAR: &str = "N/A";

/// Sentinel summary handed to the query generator before the first cycle
pub const NO_RESEARCH_YET: &str = "No research has been done yet.";

/// Sentinel prior summary handed to the summary updater on the first cycle
pub const NO_PREVIOUS_SUMMARY: &str = "No previous summary available.";

/// Lower bound for research cycles per run
pub const MIN_CYCLES: u32 = 1;

/// Upper bound for research cycles per run
pub const MAX_CYCLES: u32 = 5;
