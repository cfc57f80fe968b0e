//! Pivoted entity x year matrix and per-researcher tier profiles.

use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::totals::YearRow;
use crate::error::Result;
use crate::ingest::text_values;
use crate::scoring::{tier_rank, SCORE_MAP, TIER_COUNT};
use crate::{RESEARCHER_COL, TIER_NORM_COL};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixRow {
    pub entity: String,
    /// One value per entry of `ScoreMatrix::years`
    pub values: Vec<f64>,
}

/// Yearly totals pivoted to entity rows and year columns, zero-filled
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreMatrix {
    pub years: Vec<i32>,
    pub rows: Vec<MatrixRow>,
}

impl ScoreMatrix {
    pub fn value(&self, entity: &str, year: i32) -> Option<f64> {
        let col = self.years.iter().position(|y| *y == year)?;
        self.rows
            .iter()
            .find(|r| r.entity == entity)
            .map(|r| r.values[col])
    }

    /// Frame with `entity_col` followed by one column per year
    pub fn to_frame(&self, entity_col: &str) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.years.len() + 1);
        let entities: Vec<&str> = self.rows.iter().map(|r| r.entity.as_str()).collect();
        columns.push(Column::new(entity_col.into(), entities));

        for (i, year) in self.years.iter().enumerate() {
            let values: Vec<f64> = self.rows.iter().map(|r| r.values[i]).collect();
            columns.push(Column::new(year.to_string().into(), values));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Pivot yearly totals; entities by name, years ascending
pub fn score_matrix<T: YearRow>(rows: &[T]) -> ScoreMatrix {
    let years: Vec<i32> = rows.iter().map(|r| r.year()).collect::<BTreeSet<_>>().into_iter().collect();

    let mut cells: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in rows {
        let values = cells.entry(row.entity()).or_insert_with(|| vec![0.0; years.len()]);
        if let Ok(col) = years.binary_search(&row.year()) {
            values[col] += row.total();
        }
    }

    ScoreMatrix {
        rows: cells
            .into_iter()
            .map(|(entity, values)| MatrixRow {
                entity: entity.to_string(),
                values,
            })
            .collect(),
        years,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierCount {
    pub tier: String,
    pub count: usize,
}

/// Publication mix of one researcher
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierProfile {
    pub researcher: String,
    /// Counts in score-map order, every tier listed
    pub counts: Vec<TierCount>,
    pub total: usize,
    /// Proportion of A1/A2 records
    pub band_a: f64,
    /// Proportion of A3/A4 records
    pub band_b: f64,
    /// Proportion of B1..B4 records
    pub band_c: f64,
}

fn band_of(rank: usize) -> usize {
    match rank {
        0 | 1 => 0,
        2 | 3 => 1,
        _ => 2,
    }
}

/// Tier counts and A/B/C band split per researcher, ordered by name
pub fn tier_profiles(scored: &DataFrame) -> Result<Vec<TierProfile>> {
    let researchers = text_values(scored, RESEARCHER_COL)?;
    let tiers = text_values(scored, TIER_NORM_COL)?;

    let mut counts: BTreeMap<String, [usize; TIER_COUNT]> = BTreeMap::new();
    for (researcher, tier) in researchers.into_iter().zip(tiers) {
        let Some(rank) = tier.as_deref().and_then(tier_rank) else {
            continue;
        };
        counts.entry(researcher.unwrap_or_default()).or_insert([0; TIER_COUNT])[rank] += 1;
    }

    Ok(counts
        .into_iter()
        .map(|(researcher, per_tier)| {
            let total: usize = per_tier.iter().sum();
            let mut bands = [0usize; 3];
            for (rank, count) in per_tier.iter().enumerate() {
                bands[band_of(rank)] += count;
            }
            let ratio = |n: usize| if total > 0 { n as f64 / total as f64 } else { 0.0 };
            TierProfile {
                researcher,
                counts: SCORE_MAP
                    .iter()
                    .zip(per_tier.iter())
                    .map(|((tier, _), count)| TierCount {
                        tier: tier.to_string(),
                        count: *count,
                    })
                    .collect(),
                total,
                band_a: ratio(bands[0]),
                band_b: ratio(bands[1]),
                band_c: ratio(bands[2]),
            }
        })
        .collect())
}
