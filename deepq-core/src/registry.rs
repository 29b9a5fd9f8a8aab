//! Source registry - deduplicated citation ledger
//!
//! Keeps sources in first-seen order and drops structural duplicates.

use std::collections::HashSet;

use crate::{SearchHit, Source};

/// Insertion-ordered set of citation sources
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    ordered: Vec<Source>,
    seen: HashSet<Source>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a source unless an equal one is already registered.
    /// Returns true when the source was new.
    pub fn insert(&mut self, source: Source) -> bool {
        if self.seen.contains(&source) {
            return false;
        }
        self.seen.insert(source.clone());
        self.ordered.push(source);
        true
    }

    /// Register every hit of a cycle, returning how many were new
    pub fn extend_from_hits(&mut self, hits: &[SearchHit]) -> usize {
        hits.iter()
            .filter(|hit| self.insert(hit.to_source()))
            .count()
    }

    pub fn sources(&self) -> &[Source] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
