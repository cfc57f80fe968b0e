use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::Path;
use std::time::Instant;

use qualis_reconciliation::catalog::resolve_mode;
use qualis_reconciliation::common::{format_elapsed, setup_logging, write_table, ReconcileStats, ReportPaths};
use qualis_reconciliation::pipeline::reconcile_paths;

use super::open_cache;
use crate::cli::ReconcileArgs;

pub fn run_reconcile(args: ReconcileArgs) -> Result<ReconcileStats> {
    setup_logging(&args.log_level)?;

    let start_time = Instant::now();
    let reference = Path::new(&args.reference);
    let source = Path::new(&args.source);

    for (label, path) in [("Reference", reference), ("Source", source)] {
        if !path.exists() {
            return Err(anyhow::anyhow!("{} file does not exist: {}", label, path.display()));
        }
    }

    let mode = resolve_mode(args.mode.as_flag(), source)?;
    info!("Reconciling {} against {} ({})", args.source, args.reference, mode.cache_tag());

    let mut cache = open_cache(args.cache_dir.as_deref())?;
    if args.clear_cache {
        cache.clear().context("Failed to clear cache")?;
        info!("Cache cleared");
    }

    let run = reconcile_paths(reference, source, mode, &mut cache)
        .with_context(|| format!("Failed to reconcile {}", args.source))?;
    if run.reconciliation.is_empty() {
        warn!(
            "No record of {} matched the reference; accepted table is empty",
            args.source
        );
    }

    let paths = ReportPaths::from_base(&args.output);
    write_table(&run.reconciliation.accepted, &paths.accepted)
        .with_context(|| format!("Failed to write accepted records: {}", paths.accepted.display()))?;
    fs::write(&paths.exclusions, run.reconciliation.render_log())
        .with_context(|| format!("Failed to write exclusion log: {}", paths.exclusions.display()))?;

    let stats = run.stats;
    let total_time = start_time.elapsed();

    info!("==================== FINAL SUMMARY ====================");
    info!("Total execution time: {}", format_elapsed(total_time));
    info!("Files read: {}", stats.files_read);
    info!("Files skipped: {}", stats.files_skipped);
    info!("Records ingested: {}", stats.records_ingested);
    info!("Records accepted: {} ({:.1}%)", stats.records_accepted, stats.acceptance_rate());
    info!("Records excluded: {}", stats.records_rejected);
    info!("Cache hit: {}", stats.cache_hit);
    info!("Accepted records: {}", paths.accepted.display());
    info!("Exclusion log: {}", paths.exclusions.display());
    info!("========================================================");

    Ok(stats)
}
