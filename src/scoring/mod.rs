//! Score Map and the weighting pass over accepted records.

use log::{debug, info};
use polars::prelude::*;

use crate::error::Result;
use crate::ingest::text_values;
use crate::{SCORE_COL, TIER_COL, TIER_NORM_COL, YEAR_COL};

/// Number of weighted tiers
pub const TIER_COUNT: usize = 8;

/// Weight per Qualis tier, highest first
pub const SCORE_MAP: [(&str, f64); TIER_COUNT] = [
    ("A1", 100.0),
    ("A2", 85.0),
    ("A3", 75.0),
    ("A4", 65.0),
    ("B1", 55.0),
    ("B2", 40.0),
    ("B3", 25.0),
    ("B4", 10.0),
];

/// Canonical tier label: trimmed and uppercased
pub fn normalize_tier(tier: &str) -> String {
    tier.trim().to_uppercase()
}

/// Weight for a tier label, `None` when the tier is outside the map
pub fn score_for(tier: &str) -> Option<f64> {
    let tier = normalize_tier(tier);
    SCORE_MAP
        .iter()
        .find(|(label, _)| *label == tier)
        .map(|(_, weight)| *weight)
}

/// Position of a tier in the map, used to order per-tier views
pub fn tier_rank(tier: &str) -> Option<usize> {
    let tier = normalize_tier(tier);
    SCORE_MAP.iter().position(|(label, _)| *label == tier)
}

/// Accepted records carrying a weight
#[derive(Debug, Clone)]
pub struct ScoredRecords {
    /// Records with `qualis_norm` and `peso`, ordered by year
    pub frame: DataFrame,
    /// Records dropped because their tier has no weight
    pub unscored: usize,
}

/// Attach `qualis_norm` and `peso` to accepted records.
///
/// Records whose tier is not in [`SCORE_MAP`] are dropped. The result is
/// stably sorted by year so per-entity row order is preserved.
pub fn apply_scores(df: &DataFrame) -> Result<ScoredRecords> {
    let tiers = text_values(df, TIER_COL)?;

    let mut mask = Vec::with_capacity(tiers.len());
    let mut norms = Vec::new();
    let mut weights = Vec::new();

    for tier in &tiers {
        let norm = tier.as_deref().map(normalize_tier).unwrap_or_default();
        match score_for(&norm) {
            Some(weight) => {
                mask.push(true);
                norms.push(norm);
                weights.push(weight);
            }
            None => {
                debug!("Tier {:?} has no weight; record not scored", tier);
                mask.push(false);
            }
        }
    }

    let unscored = mask.iter().filter(|kept| !**kept).count();
    let mask = BooleanChunked::from_slice("scored".into(), &mask);
    let mut frame = df.filter(&mask)?;
    frame.with_column(Series::new(TIER_NORM_COL.into(), norms))?;
    frame.with_column(Series::new(SCORE_COL.into(), weights))?;

    if frame.get_column_index(YEAR_COL).is_some() {
        frame = frame
            .lazy()
            .sort(
                [YEAR_COL],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .collect()?;
    }

    if unscored > 0 {
        info!("{} accepted records dropped from scoring (tier outside the score map)", unscored);
    }

    Ok(ScoredRecords { frame, unscored })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RESEARCHER_COL;

    #[test]
    fn test_score_for_known_and_unknown_tiers() {
        assert_eq!(score_for("A1"), Some(100.0));
        assert_eq!(score_for(" b4 "), Some(10.0));
        assert_eq!(score_for("C"), None);
        assert_eq!(score_for(""), None);
        assert_eq!(tier_rank("a3"), Some(2));
    }

    #[test]
    fn test_apply_scores_drops_unknown_tiers_and_sorts_by_year() {
        let df = df!(
            RESEARCHER_COL => ["ana", "bruno", "ana", "carla"],
            TIER_COL => [Some("a1"), Some("B2"), Some("NP"), None],
            YEAR_COL => [2021i32, 2020, 2019, 2018]
        )
        .unwrap();

        let scored = apply_scores(&df).unwrap();
        assert_eq!(scored.unscored, 2);
        assert_eq!(scored.frame.height(), 2);

        let names = text_values(&scored.frame, RESEARCHER_COL).unwrap();
        assert_eq!(names, vec![Some("bruno".to_string()), Some("ana".to_string())]);

        let weights: Vec<Option<f64>> = scored.frame.column(SCORE_COL).unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(weights, vec![Some(40.0), Some(100.0)]);

        let norms = text_values(&scored.frame, TIER_NORM_COL).unwrap();
        assert_eq!(norms[1].as_deref(), Some("A1"));
    }

    #[test]
    fn test_year_sort_is_stable() {
        let df = df!(
            RESEARCHER_COL => ["c", "a", "b"],
            TIER_COL => ["A1", "A1", "A1"],
            YEAR_COL => [2020i32, 2020, 2020]
        )
        .unwrap();
        let scored = apply_scores(&df).unwrap();
        let names = text_values(&scored.frame, RESEARCHER_COL).unwrap();
        assert_eq!(
            names,
            vec![Some("c".to_string()), Some("a".to_string()), Some("b".to_string())]
        );
    }
}
