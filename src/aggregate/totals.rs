//! Yearly totals, cumulative sums and global shares per entity.

use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::common::percent;
use crate::error::Result;
use crate::{GROUP_COL, RESEARCHER_COL, SCORE_COL, YEAR_COL};

/// A per-(entity, year) aggregate row
pub trait YearRow {
    fn entity(&self) -> &str;
    fn year(&self) -> i32;
    fn total(&self) -> f64;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyTotal {
    pub entity: String,
    pub year: i32,
    pub total: f64,
    pub cumulative: f64,
}

impl YearRow for YearlyTotal {
    fn entity(&self) -> &str {
        &self.entity
    }
    fn year(&self) -> i32 {
        self.year
    }
    fn total(&self) -> f64 {
        self.total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupYearlyTotal {
    pub group: String,
    pub year: i32,
    pub total: f64,
    pub cumulative: f64,
    /// Distinct researchers of the group over the whole dataset
    pub members: usize,
    pub per_member: f64,
    pub cumulative_per_member: f64,
}

impl YearRow for GroupYearlyTotal {
    fn entity(&self) -> &str {
        &self.group
    }
    fn year(&self) -> i32 {
        self.year
    }
    fn total(&self) -> f64 {
        self.total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityShare {
    pub entity: String,
    pub total: f64,
    /// Percentage of the all-time total of every entity
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearTotal {
    pub year: i32,
    pub total: f64,
}

/// Sum weights per (year, entity), ordered by year then entity name
fn sum_by_year(df: &DataFrame, entity_col: &str) -> Result<Vec<(String, i32, f64)>> {
    let summed = df
        .clone()
        .lazy()
        .select([
            col(entity_col).cast(DataType::String).fill_null(lit("")).alias("entity"),
            col(YEAR_COL).cast(DataType::Int32).fill_null(lit(0)).alias("year"),
            col(SCORE_COL).cast(DataType::Float64).fill_null(lit(0.0)).alias("total"),
        ])
        .group_by_stable([col("year"), col("entity")])
        .agg([col("total").sum()])
        .sort(
            ["year", "entity"],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?;

    let entities = summed.column("entity")?.str()?;
    let years = summed.column("year")?.i32()?;
    let totals = summed.column("total")?.f64()?;

    Ok((0..summed.height())
        .map(|i| {
            (
                entities.get(i).unwrap_or_default().to_string(),
                years.get(i).unwrap_or(0),
                totals.get(i).unwrap_or(0.0),
            )
        })
        .collect())
}

/// Yearly totals per value of `entity_col`, with running cumulative sums
pub fn yearly_totals(df: &DataFrame, entity_col: &str) -> Result<Vec<YearlyTotal>> {
    let mut running: HashMap<String, f64> = HashMap::new();
    Ok(sum_by_year(df, entity_col)?
        .into_iter()
        .map(|(entity, year, total)| {
            let acc = running.entry(entity.clone()).or_insert(0.0);
            *acc += total;
            YearlyTotal {
                cumulative: *acc,
                entity,
                year,
                total,
            }
        })
        .collect())
}

/// Yearly totals per researcher
pub fn researcher_totals(df: &DataFrame) -> Result<Vec<YearlyTotal>> {
    yearly_totals(df, RESEARCHER_COL)
}

/// Distinct member count per group over the whole frame
pub fn group_member_counts(grouped: &DataFrame) -> Result<HashMap<String, usize>> {
    let counts = grouped
        .clone()
        .lazy()
        .select([
            col(GROUP_COL).cast(DataType::String).fill_null(lit("")),
            col(RESEARCHER_COL).cast(DataType::String).fill_null(lit("")),
        ])
        .group_by([col(GROUP_COL)])
        .agg([col(RESEARCHER_COL).n_unique().alias("members")])
        .collect()?;

    let groups = counts.column(GROUP_COL)?.str()?;
    let members = counts.column("members")?.u32()?;

    Ok((0..counts.height())
        .map(|i| {
            (
                groups.get(i).unwrap_or_default().to_string(),
                members.get(i).unwrap_or(0) as usize,
            )
        })
        .collect())
}

/// Yearly group totals with member-normalized variants. Groups without
/// attributed rows do not appear.
pub fn group_totals(grouped: &DataFrame) -> Result<Vec<GroupYearlyTotal>> {
    let members = group_member_counts(grouped)?;
    let mut running: HashMap<String, (f64, f64)> = HashMap::new();

    Ok(yearly_totals(grouped, GROUP_COL)?
        .into_iter()
        .map(|row| {
            let count = members.get(&row.entity).copied().unwrap_or(0);
            let per_member = if count > 0 { row.total / count as f64 } else { 0.0 };
            let acc = running.entry(row.entity.clone()).or_insert((0.0, 0.0));
            acc.1 += per_member;
            acc.0 += row.total;
            GroupYearlyTotal {
                group: row.entity,
                year: row.year,
                total: row.total,
                cumulative: acc.0,
                members: count,
                per_member,
                cumulative_per_member: acc.1,
            }
        })
        .collect())
}

/// Total weight per year across every record
pub fn global_yearly_totals(df: &DataFrame) -> Result<Vec<YearTotal>> {
    let summed = df
        .clone()
        .lazy()
        .select([
            col(YEAR_COL).cast(DataType::Int32).fill_null(lit(0)).alias("year"),
            col(SCORE_COL).cast(DataType::Float64).fill_null(lit(0.0)).alias("total"),
        ])
        .group_by([col("year")])
        .agg([col("total").sum()])
        .sort(["year"], SortMultipleOptions::default())
        .collect()?;

    let years = summed.column("year")?.i32()?;
    let totals = summed.column("total")?.f64()?;
    Ok((0..summed.height())
        .map(|i| YearTotal {
            year: years.get(i).unwrap_or(0),
            total: totals.get(i).unwrap_or(0.0),
        })
        .collect())
}

/// All-time share of each entity, in entity-name order. Every share is 0
/// when the grand total is 0.
pub fn global_shares<T: YearRow>(rows: &[T]) -> Vec<EntityShare> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for row in rows {
        *totals.entry(row.entity()).or_insert(0.0) += row.total();
    }
    let grand: f64 = totals.values().sum();

    totals
        .into_iter()
        .map(|(entity, total)| EntityShare {
            entity: entity.to_string(),
            total,
            share: percent(total, grand),
        })
        .collect()
}
