//! End-to-end orchestration: reconcile one or many sources, then score,
//! resolve groups and aggregate.

use log::{info, warn};
use polars::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::aggregate::{group_view, researcher_view, GroupView, ResearcherView};
use crate::catalog::ProgramEntry;
use crate::common::{ReconcileStats, ReportStats};
use crate::error::{PipelineError, Result};
use crate::groups::{audit_roster, resolve_programs, resolve_roster, Roster, RosterAudit};
use crate::ingest::{ingest_source, text_values, SourceMode, TableFormat};
use crate::normalize::normalize_text;
use crate::reconcile::{reconcile, render_program_logs, CacheKey, ReconcileCache, Reconciliation};
use crate::reference::build_index_from_bytes;
use crate::scoring::apply_scores;
use crate::{ORIGIN_COL, RESEARCHER_COL};

/// Reconciliation of one (reference, source) pair with its run statistics
#[derive(Debug, Clone)]
pub struct ReconcileRun {
    pub reconciliation: Reconciliation,
    pub stats: ReconcileStats,
}

/// Reconcile a source file against a reference file, reusing a cached
/// result for identical inputs
pub fn reconcile_paths(
    reference: &Path,
    source: &Path,
    mode: SourceMode,
    cache: &mut ReconcileCache,
) -> Result<ReconcileRun> {
    let reference_bytes = fs::read(reference)?;
    let source_bytes = fs::read(source)?;
    let key = CacheKey::compute(&reference_bytes, &source_bytes, mode.cache_tag());

    let (reconciliation, cache_hit) = cache.get_or_insert_with(key, || {
        let index = build_index_from_bytes(&reference_bytes, TableFormat::from_path(reference))?;
        let batch = ingest_source(&source_bytes, mode)?;
        reconcile(batch, &index)
    })?;

    let stats = ReconcileStats {
        files_read: reconciliation.files_read,
        files_skipped: reconciliation.files_skipped(),
        records_ingested: reconciliation.records_in,
        records_accepted: reconciliation.accepted_count(),
        records_rejected: reconciliation.rejected_count(),
        cache_hit,
    };

    Ok(ReconcileRun {
        reconciliation,
        stats,
    })
}

/// Per-program outcome of a combined run
#[derive(Debug, Clone, Serialize)]
pub struct ProgramSummary {
    pub name: String,
    pub stats: ReconcileStats,
    /// False when the program had no accepted record and was left out
    pub included: bool,
}

/// Accepted records of every program, stacked
#[derive(Debug, Clone)]
pub struct CombinedRun {
    pub records: DataFrame,
    pub log: String,
    pub programs: Vec<ProgramSummary>,
}

impl CombinedRun {
    pub fn excluded_count(&self) -> usize {
        self.programs.iter().map(|p| p.stats.records_rejected).sum()
    }

    /// Number of programs that contributed records
    pub fn source_count(&self) -> usize {
        self.programs.iter().filter(|p| p.included).count()
    }
}

/// Reconcile each program against its own reference and stack the accepted
/// sets, tagging each record with its program in `programa_origem`
pub fn reconcile_programs(programs: &[ProgramEntry], cache: &mut ReconcileCache) -> Result<CombinedRun> {
    let mut frames = Vec::new();
    let mut logs = Vec::new();
    let mut summaries = Vec::new();

    for program in programs {
        let mode = program.source_mode()?;
        info!("Reconciling program {}", program.name);
        let run = reconcile_paths(&program.reference, &program.source, mode, cache)?;

        let included = run.reconciliation.accepted_count() > 0;
        if included {
            let mut accepted = run.reconciliation.accepted.clone();
            let origin = vec![program.name.as_str(); accepted.height()];
            accepted.with_column(Series::new(ORIGIN_COL.into(), origin))?;
            frames.push(accepted);
            logs.push((program.name.clone(), run.reconciliation.render_log()));
        } else {
            warn!("Program {} has no accepted records; skipping", program.name);
        }

        summaries.push(ProgramSummary {
            name: program.name.clone(),
            stats: run.stats,
            included,
        });
    }

    if frames.is_empty() {
        return Err(PipelineError::EmptyResult(
            "no program produced accepted records".to_string(),
        ));
    }

    let records = polars::functions::concat_df_diagonal(&frames)?;
    info!("{} accepted records across {} programs", records.height(), logs.len());

    Ok(CombinedRun {
        records,
        log: render_program_logs(&logs),
        programs: summaries,
    })
}

/// Keep rows whose lowercased researcher name contains the normalized term
pub fn filter_researchers(df: &DataFrame, term: &str) -> Result<DataFrame> {
    let needle = normalize_text(term);
    let mask: Vec<bool> = text_values(df, RESEARCHER_COL)?
        .iter()
        .map(|name| {
            name.as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&needle))
        })
        .collect();
    Ok(df.filter(&BooleanChunked::from_slice("filter".into(), &mask))?)
}

#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Substring filter on researcher names
    pub researcher_filter: Option<String>,
    /// Group roster; ignored when several programs are compared
    pub roster: Option<Roster>,
}

/// Aggregated report, serialized to JSON by the `report` command
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub program_comparison: bool,
    pub stats: ReportStats,
    pub programs: Vec<ProgramSummary>,
    pub researchers: ResearcherView,
    pub groups: Option<GroupView>,
    pub audit: Option<RosterAudit>,
}

#[derive(Debug, Clone)]
pub struct ReportOutput {
    pub report: Report,
    /// Scored records with display names
    pub records: DataFrame,
    pub log: String,
}

/// Score, attribute and aggregate a combined run
pub fn build_report(run: CombinedRun, options: &ReportOptions) -> Result<ReportOutput> {
    let mut records = run.records.clone();

    if let Some(term) = options.researcher_filter.as_deref().filter(|t| !t.trim().is_empty()) {
        records = filter_researchers(&records, term)?;
        if records.height() == 0 {
            return Err(PipelineError::EmptyResult(format!(
                "no researcher matches '{}'",
                term
            )));
        }
        info!("Filter '{}' kept {} records", term, records.height());
    }

    let scored = apply_scores(&records)?;
    if scored.frame.height() == 0 {
        return Err(PipelineError::EmptyResult(
            "no accepted record has a weighted tier".to_string(),
        ));
    }

    // Requested programs, not contributing ones; the report command uses the same rule
    let program_comparison = run.programs.len() > 1;
    let resolution = if program_comparison {
        resolve_programs(&scored.frame)?
    } else {
        let empty = Roster::new();
        resolve_roster(&scored.frame, options.roster.as_ref().unwrap_or(&empty))?
    };

    let audit = match (&options.roster, program_comparison) {
        (Some(roster), false) => Some(audit_roster(roster, &resolution)?),
        _ => None,
    };

    let researchers = researcher_view(&resolution.records)?;
    let groups = group_view(&resolution.grouped)?;

    let stats = ReportStats {
        sources: run.source_count(),
        records_accepted: records.height(),
        records_excluded: run.excluded_count(),
        records_scored: scored.frame.height(),
        records_unscored: scored.unscored,
        researchers: researchers.shares.len(),
        groups: groups.as_ref().map_or(0, |g| g.shares.len()),
        unmatched_researchers: audit.as_ref().map_or(0, |a| a.unmatched.len()),
    };

    Ok(ReportOutput {
        report: Report {
            program_comparison,
            stats,
            programs: run.programs,
            researchers,
            groups,
            audit,
        },
        records: resolution.records,
        log: run.log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::parse_roster_text;
    use crate::{TIER_COL, YEAR_COL};

    fn combined(records: DataFrame, programs: &[&str]) -> CombinedRun {
        CombinedRun {
            records,
            log: String::new(),
            programs: programs
                .iter()
                .map(|name| ProgramSummary {
                    name: name.to_string(),
                    stats: ReconcileStats::default(),
                    included: true,
                })
                .collect(),
        }
    }

    #[test]
    fn test_filter_researchers() {
        let df = df!(RESEARCHER_COL => ["Joao Silva", "Maria Souza"]).unwrap();
        let filtered = filter_researchers(&df, "JOÃO").unwrap();
        assert_eq!(filtered.height(), 1);
    }

    #[test]
    fn test_filter_with_no_match_is_empty_result() {
        let df = df!(
            RESEARCHER_COL => ["ana"],
            TIER_COL => ["A1"],
            YEAR_COL => [2020i32]
        )
        .unwrap();
        let options = ReportOptions {
            researcher_filter: Some("zzz".to_string()),
            roster: None,
        };
        let result = build_report(combined(df, &["P"]), &options);
        assert!(matches!(result, Err(PipelineError::EmptyResult(_))));
    }

    #[test]
    fn test_program_comparison_groups_by_origin() {
        let df = df!(
            RESEARCHER_COL => ["ana", "bruno", "carla"],
            TIER_COL => ["A1", "B2", "C"],
            YEAR_COL => [2020i32, 2020, 2021],
            ORIGIN_COL => ["P1", "P2", "P2"]
        )
        .unwrap();
        let output = build_report(combined(df, &["P1", "P2"]), &ReportOptions::default()).unwrap();

        assert!(output.report.program_comparison);
        assert_eq!(output.report.stats.records_unscored, 1);
        let groups = output.report.groups.unwrap();
        assert_eq!(groups.shares.len(), 2);
        assert!(output.report.audit.is_none());
    }

    #[test]
    fn test_program_comparison_counts_empty_programs() {
        let df = df!(
            RESEARCHER_COL => ["ana", "bruno"],
            TIER_COL => ["A1", "B2"],
            YEAR_COL => [2020i32, 2021],
            ORIGIN_COL => ["P1", "P1"]
        )
        .unwrap();
        let mut run = combined(df, &["P1", "P2"]);
        run.programs[1].included = false;

        let options = ReportOptions {
            researcher_filter: None,
            roster: Some(parse_roster_text("ana, G1\n")),
        };
        let output = build_report(run, &options).unwrap();

        assert!(output.report.program_comparison);
        assert!(output.report.audit.is_none());
        assert_eq!(output.report.stats.sources, 1);
        let groups = output.report.groups.unwrap();
        assert_eq!(groups.shares.len(), 1);
    }
}
