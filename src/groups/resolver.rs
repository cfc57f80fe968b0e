use log::{info, warn};
use polars::prelude::*;
use std::collections::{BTreeSet, HashMap};

use super::Roster;
use crate::error::{PipelineError, Result};
use crate::ingest::text_values;
use crate::normalize::{normalize_text, title_case};
use crate::{GROUP_COL, ORIGIN_COL, RESEARCHER_COL};

/// Records after group attribution
#[derive(Debug, Clone)]
pub struct GroupResolution {
    /// Every record, researcher shown in its display form
    pub records: DataFrame,
    /// One row per (record, matched group) with `linha_pesquisa` set
    pub grouped: DataFrame,
    /// Display names present in the data but in no group, sorted
    pub unmatched: Vec<String>,
}

impl GroupResolution {
    pub fn group_count(&self) -> Result<usize> {
        let groups: BTreeSet<String> = text_values(&self.grouped, GROUP_COL)?
            .into_iter()
            .flatten()
            .collect();
        Ok(groups.len())
    }
}

fn with_researchers(df: &DataFrame, names: Vec<String>) -> Result<DataFrame> {
    let mut out = df.clone();
    out.with_column(Series::new(RESEARCHER_COL.into(), names))?;
    Ok(out)
}

/// Program comparison: the group of a record is the program it came from
pub fn resolve_programs(df: &DataFrame) -> Result<GroupResolution> {
    if df.get_column_index(ORIGIN_COL).is_none() {
        return Err(PipelineError::Schema(format!(
            "records carry no '{}' column",
            ORIGIN_COL
        )));
    }

    let names: Vec<String> = text_values(df, RESEARCHER_COL)?
        .iter()
        .map(|n| title_case(n.as_deref().unwrap_or_default()))
        .collect();
    let records = with_researchers(df, names)?;

    let origins: Vec<String> = text_values(df, ORIGIN_COL)?
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect();
    let mut grouped = records.clone();
    grouped.with_column(Series::new(GROUP_COL.into(), origins))?;

    Ok(GroupResolution {
        records,
        grouped,
        unmatched: Vec::new(),
    })
}

/// Roster attribution by normalized exact name match.
///
/// A record is emitted once per group listing its researcher, with the
/// roster spelling as researcher name. In `records`, matched names take
/// the roster spelling (the last matching member wins when spellings
/// differ) and the rest are title-cased.
pub fn resolve_roster(df: &DataFrame, roster: &Roster) -> Result<GroupResolution> {
    let members: Vec<(String, &str, &str)> = roster
        .groups()
        .iter()
        .flat_map(|g| {
            g.members
                .iter()
                .map(move |m| (normalize_text(m), m.as_str(), g.name.as_str()))
        })
        .collect();

    let raw_names: Vec<String> = text_values(df, RESEARCHER_COL)?
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect();

    let mut take: Vec<IdxSize> = Vec::new();
    let mut grouped_names: Vec<String> = Vec::new();
    let mut grouped_labels: Vec<String> = Vec::new();
    let mut corrections: HashMap<&str, &str> = HashMap::new();

    for (row, raw) in raw_names.iter().enumerate() {
        let key = normalize_text(raw);
        for (member_key, member, group) in &members {
            if *member_key == key {
                take.push(row as IdxSize);
                grouped_names.push(member.to_string());
                grouped_labels.push(group.to_string());
                corrections.insert(raw.as_str(), *member);
            }
        }
    }

    let mut grouped = df.take(&IdxCa::from_vec("rows".into(), take))?;
    grouped.with_column(Series::new(RESEARCHER_COL.into(), grouped_names))?;
    grouped.with_column(Series::new(GROUP_COL.into(), grouped_labels))?;

    let mut unmatched = BTreeSet::new();
    let display: Vec<String> = raw_names
        .iter()
        .map(|raw| match corrections.get(raw.as_str()) {
            Some(canonical) => canonical.to_string(),
            None => {
                let shown = title_case(raw);
                unmatched.insert(shown.clone());
                shown
            }
        })
        .collect();
    let records = with_researchers(df, display)?;

    if grouped.height() == 0 && !roster.is_empty() {
        warn!("No researcher matched the configured groups");
    }
    info!(
        "Group resolution: {} attributed rows, {} unmatched researchers",
        grouped.height(),
        unmatched.len()
    );

    Ok(GroupResolution {
        records,
        grouped,
        unmatched: unmatched.into_iter().collect(),
    })
}
