use log::info;

use super::table::{
    canonicalize_columns, canonicalize_researcher, column_names, normalize_column_names,
    read_table_bytes, stringify_columns, TableFormat,
};
use super::IngestedBatch;
use crate::error::{PipelineError, Result};

/// Ingest a consolidated table that already names the researcher of every
/// row. Pandas index columns are dropped and every column becomes text.
pub fn ingest_columnar(bytes: &[u8], format: TableFormat) -> Result<IngestedBatch> {
    let raw = read_table_bytes(bytes, format)?;

    let kept: Vec<String> = column_names(&raw)
        .into_iter()
        .filter(|name| !name.starts_with("__index_level"))
        .collect();

    let mut df = stringify_columns(&raw.select(kept)?)?;
    normalize_column_names(&mut df)?;
    canonicalize_columns(&mut df)?;

    if !canonicalize_researcher(&mut df)? {
        return Err(PipelineError::Schema(
            "consolidated table has no 'pesquisador' or 'researcher' column".to_string(),
        ));
    }

    info!("Ingested {} rows from consolidated table", df.height());

    Ok(IngestedBatch {
        frame: df,
        warnings: Vec::new(),
        files_read: 1,
        files_skipped: 0,
    })
}
