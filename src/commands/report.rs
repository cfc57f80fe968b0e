use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use qualis_reconciliation::catalog::{resolve_mode, Catalog, ProgramEntry};
use qualis_reconciliation::common::{format_elapsed, setup_logging, write_table, ReportPaths, ReportStats};
use qualis_reconciliation::groups::load_roster;
use qualis_reconciliation::pipeline::{build_report, reconcile_programs, ReportOptions};
use qualis_reconciliation::RESEARCHER_COL;

use super::open_cache;
use crate::cli::ReportArgs;

/// Name given to a single source passed on the command line
const SINGLE_SOURCE_NAME: &str = "Upload";

fn programs_from_args(args: &ReportArgs) -> Result<Vec<ProgramEntry>> {
    match (&args.catalog, &args.reference, &args.source) {
        (Some(catalog_path), _, _) => {
            let catalog = Catalog::load(Path::new(catalog_path))
                .with_context(|| format!("Failed to load catalog: {}", catalog_path))?;
            Ok(catalog.select(&args.programs)?)
        }
        (None, Some(reference), Some(source)) => {
            let mode = resolve_mode(args.mode.as_flag(), Path::new(source))?;
            info!("Single source mode: {}", mode.cache_tag());
            Ok(vec![ProgramEntry {
                name: SINGLE_SOURCE_NAME.to_string(),
                reference: PathBuf::from(reference),
                source: PathBuf::from(source),
                mode: args.mode.as_flag().map(String::from),
            }])
        }
        _ => Err(anyhow::anyhow!("Either --catalog or both --reference and --source are required")),
    }
}

pub fn run_report(args: ReportArgs) -> Result<ReportStats> {
    setup_logging(&args.log_level)?;

    let start_time = Instant::now();
    let programs = programs_from_args(&args)?;

    let roster = match &args.roster {
        Some(path) => Some(load_roster(Path::new(path)).with_context(|| format!("Failed to load roster: {}", path))?),
        None => None,
    };
    if roster.is_some() && programs.len() > 1 {
        warn!("Roster ignored: several programs are compared, groups are the programs");
    }

    let mut cache = open_cache(args.cache_dir.as_deref())?;
    let combined = reconcile_programs(&programs, &mut cache).context("Reconciliation failed")?;

    let options = ReportOptions {
        researcher_filter: args.filter.clone(),
        roster,
    };
    let output = build_report(combined, &options).context("Failed to build report")?;

    let paths = ReportPaths::from_base(&args.output);
    write_table(&output.records, &paths.accepted)
        .with_context(|| format!("Failed to write scored records: {}", paths.accepted.display()))?;
    fs::write(&paths.exclusions, &output.log)
        .with_context(|| format!("Failed to write exclusion log: {}", paths.exclusions.display()))?;
    fs::write(&paths.report, serde_json::to_string_pretty(&output.report)?)
        .with_context(|| format!("Failed to write report: {}", paths.report.display()))?;
    let matrix = output.report.researchers.matrix.to_frame(RESEARCHER_COL)?;
    write_table(&matrix, &paths.matrix)
        .with_context(|| format!("Failed to write score matrix: {}", paths.matrix.display()))?;

    let stats = output.report.stats.clone();
    let total_time = start_time.elapsed();

    info!("==================== FINAL SUMMARY ====================");
    info!("Total execution time: {}", format_elapsed(total_time));
    info!("Sources: {}", stats.sources);
    info!("Records accepted: {}", stats.records_accepted);
    info!("Records excluded: {}", stats.records_excluded);
    info!("Records scored: {}", stats.records_scored);
    info!("Records without a weighted tier: {}", stats.records_unscored);
    info!("Researchers: {}", stats.researchers);
    info!("Groups: {}", stats.groups);
    if let Some(audit) = &output.report.audit {
        for group in &audit.groups {
            info!("  {}: {}/{} members found", group.group, group.found.len(), group.expected);
        }
        info!("Researchers in no group: {}", stats.unmatched_researchers);
    }
    info!("Scored records: {}", paths.accepted.display());
    info!("Report: {}", paths.report.display());
    info!("Exclusion log: {}", paths.exclusions.display());
    info!("========================================================");

    Ok(stats)
}
