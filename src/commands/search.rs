use anyhow::{Context, Result};
use log::{info, warn};
use std::path::Path;
use std::time::Instant;

use qualis_reconciliation::catalog::{search_catalog, Catalog, SearchHit};
use qualis_reconciliation::common::{format_elapsed, setup_logging};

use crate::cli::SearchArgs;

pub fn run_search(args: SearchArgs) -> Result<Vec<SearchHit>> {
    setup_logging(&args.log_level)?;

    let start_time = Instant::now();
    let catalog = Catalog::load(Path::new(&args.catalog))
        .with_context(|| format!("Failed to load catalog: {}", args.catalog))?;

    info!("Scanning {} programs for '{}'", catalog.programs.len(), args.term);
    let hits = search_catalog(&catalog, &args.term);

    if hits.is_empty() {
        warn!("No researcher matching '{}' in any snapshot", args.term);
    }
    for hit in &hits {
        println!("{}: {}", hit.program, hit.researchers.join(", "));
    }

    info!("==================== FINAL SUMMARY ====================");
    info!("Total execution time: {}", format_elapsed(start_time.elapsed()));
    info!("Programs matched: {}", hits.len());
    info!("========================================================");

    Ok(hits)
}
