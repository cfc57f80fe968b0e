//! Aggregator: per-researcher and per-group views over scored records.

pub mod matrix;
pub mod ranking;
pub mod totals;

pub use matrix::*;
pub use ranking::*;
pub use totals::*;

use polars::prelude::DataFrame;
use serde::Serialize;

use crate::error::Result;

/// Researcher rankings list at most this many entries per year
pub const RESEARCHER_RANK_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct ResearcherView {
    pub yearly: Vec<YearlyTotal>,
    pub global_totals: Vec<YearTotal>,
    pub shares: Vec<EntityShare>,
    pub annual_ranking: Vec<YearRanking>,
    pub cumulative_ranking: Vec<YearRanking>,
    pub matrix: ScoreMatrix,
    pub profiles: Vec<TierProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    pub yearly: Vec<GroupYearlyTotal>,
    pub shares: Vec<EntityShare>,
    pub annual_volume_ranking: Vec<YearRanking>,
    pub cumulative_volume_ranking: Vec<YearRanking>,
    pub annual_efficiency_ranking: Vec<YearRanking>,
    pub cumulative_efficiency_ranking: Vec<YearRanking>,
    pub matrix: ScoreMatrix,
}

/// Every per-researcher aggregate of a scored frame
pub fn researcher_view(scored: &DataFrame) -> Result<ResearcherView> {
    let yearly = researcher_totals(scored)?;
    let shares = global_shares(&yearly);

    Ok(ResearcherView {
        global_totals: global_yearly_totals(scored)?,
        annual_ranking: annual_ranking(&yearly, &shares, Some(RESEARCHER_RANK_LIMIT)),
        cumulative_ranking: cumulative_ranking(&yearly, &shares, Some(RESEARCHER_RANK_LIMIT)),
        matrix: score_matrix(&yearly),
        profiles: tier_profiles(scored)?,
        shares,
        yearly,
    })
}

/// Every per-group aggregate, or `None` when no record was attributed
pub fn group_view(grouped: &DataFrame) -> Result<Option<GroupView>> {
    if grouped.height() == 0 {
        return Ok(None);
    }

    let yearly = group_totals(grouped)?;
    let shares = global_shares(&yearly);

    Ok(Some(GroupView {
        annual_volume_ranking: annual_ranking(&yearly, &shares, None),
        cumulative_volume_ranking: cumulative_ranking(&yearly, &shares, None),
        annual_efficiency_ranking: annual_efficiency_ranking(&yearly, &shares),
        cumulative_efficiency_ranking: cumulative_efficiency_ranking(&yearly, &shares),
        matrix: score_matrix(&yearly),
        shares,
        yearly,
    }))
}
