pub mod reconcile;
pub mod report;
pub mod search;

pub use reconcile::run_reconcile;
pub use report::run_report;
pub use search::run_search;

use anyhow::{Context, Result};
use qualis_reconciliation::reconcile::ReconcileCache;
use std::path::Path;

/// Open the on-disk cache when a directory is given, else an in-memory one
pub(crate) fn open_cache(cache_dir: Option<&str>) -> Result<ReconcileCache> {
    match cache_dir {
        Some(dir) => ReconcileCache::with_dir(Path::new(dir))
            .with_context(|| format!("Failed to open cache directory: {}", dir)),
        None => Ok(ReconcileCache::in_memory()),
    }
}
