use serde::{Deserialize, Serialize};

/// Statistics from a single reconciliation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub files_read: usize,
    pub files_skipped: usize,
    pub records_ingested: usize,
    pub records_accepted: usize,
    pub records_rejected: usize,
    pub cache_hit: bool,
}

impl ReconcileStats {
    /// Share of ingested records that survived the reference filter
    pub fn acceptance_rate(&self) -> f64 {
        crate::common::percent(self.records_accepted as f64, self.records_ingested as f64)
    }
}

/// Statistics from the report step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportStats {
    pub sources: usize,
    pub records_accepted: usize,
    pub records_excluded: usize,
    pub records_scored: usize,
    pub records_unscored: usize,
    pub researchers: usize,
    pub groups: usize,
    pub unmatched_researchers: usize,
}
