//! Reconciliation of ingested records against the Qualis reference.
//!
//! Accepted records are exactly those whose cleaned ISSN is a reference
//! key; their tier is replaced with the reference tier. Everything else is
//! rejected and reported, including records with no usable ISSN.

pub mod cache;
pub mod exclusion;

pub use cache::*;
pub use exclusion::*;

use log::{debug, info};
use polars::prelude::*;

use crate::error::Result;
use crate::ingest::{find_issn_column, stringify_columns, text_values, IngestWarning, IngestedBatch};
use crate::normalize::{clean_issn, coerce_year};
use crate::reference::QualisIndex;
use crate::{ISSN_CLEAN_COL, RESEARCHER_COL, TIER_COL, TITLE_COL, YEAR_COL};

/// Result of reconciling one source against one reference list
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Accepted records with the authoritative tier in `qualis`
    pub accepted: DataFrame,
    /// Rejected records, sorted by researcher
    pub exclusions: Vec<ExclusionEntry>,
    /// Files skipped during ingestion
    pub warnings: Vec<IngestWarning>,
    pub records_in: usize,
    /// Archive members or snapshot files read successfully
    pub files_read: usize,
}

impl Reconciliation {
    pub fn accepted_count(&self) -> usize {
        self.accepted.height()
    }

    /// No record survived; the run still succeeds but callers should warn
    pub fn is_empty(&self) -> bool {
        self.accepted.height() == 0
    }

    pub fn rejected_count(&self) -> usize {
        self.exclusions.len()
    }

    pub fn files_skipped(&self) -> usize {
        self.warnings.len()
    }

    /// Plain-text exclusion report
    pub fn render_log(&self) -> String {
        render_exclusion_log(&self.exclusions, &self.warnings)
    }
}

/// Coerce the year column to integers (leading digits, else 0) and every
/// other column to text, so batches from different schemas can be stacked.
pub fn normalize_types(df: &DataFrame) -> Result<DataFrame> {
    let years: Vec<i32> = text_values(df, YEAR_COL)?
        .iter()
        .map(|v| coerce_year(v.as_deref()))
        .collect();

    let mut out = stringify_columns(df)?;
    out.with_column(Series::new(YEAR_COL.into(), years))?;
    Ok(out)
}

/// Partition a record frame into accepted rows and exclusion entries
pub fn reconcile_frame(
    df: &DataFrame,
    reference: &QualisIndex,
) -> Result<(DataFrame, Vec<ExclusionEntry>)> {
    let height = df.height();

    let researchers = text_values(df, RESEARCHER_COL)?;
    let issns = match find_issn_column(df) {
        Some(column) => text_values(df, &column)?,
        None => {
            debug!("No ISSN column found; every record will be rejected");
            vec![None; height]
        }
    };
    let asserted_tiers = text_values(df, TIER_COL)?;
    let titles = text_values(df, TITLE_COL)?;

    let mut mask = Vec::with_capacity(height);
    let mut final_tiers: Vec<String> = Vec::new();
    let mut keys: Vec<String> = Vec::new();
    let mut exclusions = Vec::new();

    for row in 0..height {
        let key = clean_issn(issns[row].as_deref());
        match reference.tier(&key) {
            Some(tier) => {
                mask.push(true);
                final_tiers.push(tier.to_string());
                keys.push(key);
            }
            None => {
                mask.push(false);
                exclusions.push(ExclusionEntry {
                    researcher: researchers[row].clone().unwrap_or_default(),
                    issn: issns[row].clone(),
                    tier: asserted_tiers[row].clone(),
                    title: titles[row].clone(),
                });
            }
        }
    }

    // Stable: rows of one researcher keep their source order
    exclusions.sort_by(|a, b| a.researcher.cmp(&b.researcher));

    let mask = BooleanChunked::from_slice("accepted".into(), &mask);
    let mut accepted = df.filter(&mask)?;
    accepted.with_column(Series::new(TIER_COL.into(), final_tiers))?;
    accepted.with_column(Series::new(ISSN_CLEAN_COL.into(), keys))?;

    Ok((normalize_types(&accepted)?, exclusions))
}

/// Reconcile an ingested batch against the reference index
pub fn reconcile(batch: IngestedBatch, reference: &QualisIndex) -> Result<Reconciliation> {
    let records_in = batch.frame.height();
    let files_read = batch.files_read;
    let (accepted, exclusions) = reconcile_frame(&batch.frame, reference)?;

    info!(
        "Reconciled {} records: {} accepted, {} excluded",
        records_in,
        accepted.height(),
        exclusions.len()
    );

    Ok(Reconciliation {
        accepted,
        exclusions,
        warnings: batch.warnings,
        records_in,
        files_read,
    })
}
