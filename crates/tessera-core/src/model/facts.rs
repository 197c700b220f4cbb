//! Predicate-indexed view of the initial facts

use std::collections::HashMap;

use super::atom::GroundAtom;

/// Initial facts indexed by predicate name
///
/// Extractor and constraint lookups only touch the tuples stored under one
/// predicate instead of scanning the whole initial state.
#[derive(Debug, Clone, Default)]
pub struct FactIndex {
    by_predicate: HashMap<String, Vec<Vec<String>>>,
    len: usize,
}

impl FactIndex {
    /// Build the index from a set of facts
    pub fn new<'a>(facts: impl IntoIterator<Item = &'a GroundAtom>) -> Self {
        let mut by_predicate: HashMap<String, Vec<Vec<String>>> = HashMap::new();
        let mut len = 0;
        for fact in facts {
            by_predicate
                .entry(fact.predicate.clone())
                .or_default()
                .push(fact.args.clone());
            len += 1;
        }
        Self { by_predicate, len }
    }

    /// All argument tuples stored under `predicate`
    pub fn tuples(&self, predicate: &str) -> &[Vec<String>] {
        self.by_predicate
            .get(predicate)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether any fact uses `predicate`
    pub fn has_predicate(&self, predicate: &str) -> bool {
        self.by_predicate.contains_key(predicate)
    }

    /// Total number of indexed facts
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
