//! DeepQ Agents
//!
//! Model-backed steps of a research run:
//! - **QueryGenerator**: turns the running summary into the next search query
//! - **SummaryUpdater**: folds a cycle's findings into a replacement summary
//! - **Reflector**: critiques the summary (observation only)
//! - **ReportGenerator**: writes the final report and appends citations
//!
//! ## Prompt templates
//!
//! Prompts are defined in TOML files under `prompts/` and embedded at build
//! time. See [`prompts::PromptSet`] for loading overrides from a directory.

pub mod backend;
pub mod prompts;
pub mod traits;
pub mod query;
pub mod summarizer;
pub mod reflector;
pub mod reporter;

pub use backend::*;
pub use prompts::*;
pub use traits::*;
pub use query::*;
pub use summarizer::*;
pub use reflector::*;
pub use reporter::*;
