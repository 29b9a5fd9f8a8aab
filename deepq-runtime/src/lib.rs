//! DeepQ Runtime
//!
//! Drives a research run as a fixed number of outer iterations:
//! query generation, search, scraping and summarization per cycle, a
//! reflection pass per iteration, and one final report.

pub mod controller;

pub use controller::*;
