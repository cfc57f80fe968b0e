//! Year-bounded rankings. Each year ranks entities by a value with a stable
//! descending sort over rows already in entity-name order, so ties keep
//! that order.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::totals::{EntityShare, GroupYearlyTotal, YearRow};
use crate::common::percent;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub position: usize,
    pub entity: String,
    pub value: f64,
    /// All-time share of the entity, for context
    pub global_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearRanking {
    pub year: i32,
    pub entries: Vec<RankEntry>,
}

fn distinct_years<T: YearRow>(rows: &[T]) -> BTreeSet<i32> {
    rows.iter().map(|r| r.year()).collect()
}

fn ranked(mut rows: Vec<(String, f64)>, shares: &HashMap<&str, f64>, limit: Option<usize>) -> Vec<RankEntry> {
    rows.sort_by(|a, b| b.1.total_cmp(&a.1));
    rows.into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(i, (entity, value))| RankEntry {
            position: i + 1,
            global_share: shares.get(entity.as_str()).copied().unwrap_or(0.0),
            entity,
            value,
        })
        .collect()
}

fn share_lookup(shares: &[EntityShare]) -> HashMap<&str, f64> {
    shares.iter().map(|s| (s.entity.as_str(), s.share)).collect()
}

/// Rank within each year by a per-row value
fn rank_each_year<T, F>(rows: &[T], shares: &[EntityShare], limit: Option<usize>, value: F) -> Vec<YearRanking>
where
    T: YearRow,
    F: Fn(&T, &[&T]) -> f64,
{
    let lookup = share_lookup(shares);
    distinct_years(rows)
        .into_iter()
        .map(|year| {
            let in_year: Vec<&T> = rows.iter().filter(|r| r.year() == year).collect();
            let values = in_year
                .iter()
                .map(|r| (r.entity().to_string(), value(*r, &in_year)))
                .collect();
            YearRanking {
                year,
                entries: ranked(values, &lookup, limit),
            }
        })
        .collect()
}

/// Rank by the sum of a per-row value over every year up to and including
/// each year, scaled by `scale`
fn rank_up_to_year<T, F, S>(rows: &[T], shares: &[EntityShare], limit: Option<usize>, value: F, scale: S) -> Vec<YearRanking>
where
    T: YearRow,
    F: Fn(&T) -> f64,
    S: Fn(f64) -> f64,
{
    let lookup = share_lookup(shares);
    distinct_years(rows)
        .into_iter()
        .map(|year| {
            let mut acc: BTreeMap<&str, f64> = BTreeMap::new();
            for row in rows.iter().filter(|r| r.year() <= year) {
                *acc.entry(row.entity()).or_insert(0.0) += value(row);
            }
            let values = acc.into_iter().map(|(e, v)| (e.to_string(), scale(v))).collect();
            YearRanking {
                year,
                entries: ranked(values, &lookup, limit),
            }
        })
        .collect()
}

/// Share of each year's total. A year whose total is 0 gives every entity 0.
pub fn annual_ranking<T: YearRow>(rows: &[T], shares: &[EntityShare], limit: Option<usize>) -> Vec<YearRanking> {
    rank_each_year(rows, shares, limit, |row, in_year| {
        let year_total: f64 = in_year.iter().map(|r| r.total()).sum();
        percent(row.total(), year_total)
    })
}

/// Share of the all-time grand total accumulated up to each year
pub fn cumulative_ranking<T: YearRow>(rows: &[T], shares: &[EntityShare], limit: Option<usize>) -> Vec<YearRanking> {
    let grand: f64 = rows.iter().map(|r| r.total()).sum();
    rank_up_to_year(rows, shares, limit, |r| r.total(), |v| percent(v, grand))
}

/// Points per member within each year
pub fn annual_efficiency_ranking(rows: &[GroupYearlyTotal], shares: &[EntityShare]) -> Vec<YearRanking> {
    rank_each_year(rows, shares, None, |row, _| row.per_member)
}

/// Points per member accumulated up to each year
pub fn cumulative_efficiency_ranking(rows: &[GroupYearlyTotal], shares: &[EntityShare]) -> Vec<YearRanking> {
    rank_up_to_year(rows, shares, None, |r| r.per_member, |v| v)
}
