pub mod loader;

pub use loader::*;

use std::collections::HashMap;

/// Authoritative mapping from cleaned ISSN to Qualis tier.
///
/// Exactly one tier per key: the first entry inserted for an ISSN wins.
#[derive(Debug, Clone, Default)]
pub struct QualisIndex {
    tiers: HashMap<String, String>,
}

impl QualisIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tiers: HashMap::with_capacity(capacity),
        }
    }

    /// Add an entry keyed by an already cleaned ISSN. Returns false when the
    /// key was empty or already present (the existing tier is kept).
    pub fn insert(&mut self, issn_clean: &str, tier: &str) -> bool {
        if issn_clean.is_empty() || self.tiers.contains_key(issn_clean) {
            return false;
        }
        self.tiers.insert(issn_clean.to_string(), tier.trim().to_string());
        true
    }

    /// Authoritative tier for a cleaned ISSN
    pub fn tier(&self, issn_clean: &str) -> Option<&str> {
        self.tiers.get(issn_clean).map(String::as_str)
    }

    pub fn contains(&self, issn_clean: &str) -> bool {
        self.tiers.contains_key(issn_clean)
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Entries sorted by ISSN
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .tiers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_unstable();
        entries
    }
}
