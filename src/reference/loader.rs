use log::{info, warn};
use polars::prelude::*;
use std::fs;
use std::path::Path;
use std::time::Instant;

use super::QualisIndex;
use crate::common::format_elapsed;
use crate::error::{PipelineError, Result};
use crate::ingest::{find_column, find_column_by_alias, find_issn_column, normalize_column_names, read_table_bytes, text_values, TableFormat};
use crate::normalize::clean_issn;

/// Locate the tier column: exact `estrato`, else any header mentioning
/// estrato, qualis or tier.
fn find_tier_column(df: &DataFrame) -> Option<String> {
    find_column_by_alias(df, &["estrato"]).or_else(|| {
        find_column(df, |name| {
            let lower = name.to_lowercase();
            lower.contains("estrato") || lower.contains("qualis") || lower.contains("tier")
        })
    })
}

/// Build the reference index from a reference table. Fails with a schema
/// error when the ISSN or tier column cannot be located.
pub fn build_index_from_frame(df: &DataFrame) -> Result<QualisIndex> {
    let mut df = df.clone();
    normalize_column_names(&mut df)?;

    let issn_col = find_issn_column(&df).ok_or_else(|| {
        PipelineError::Schema("reference table has no 'issn' column".to_string())
    })?;
    let tier_col = find_tier_column(&df).ok_or_else(|| {
        PipelineError::Schema("reference table has no 'estrato' (tier) column".to_string())
    })?;

    let issns = text_values(&df, &issn_col)?;
    let tiers = text_values(&df, &tier_col)?;

    let mut index = QualisIndex::with_capacity(df.height());
    let mut duplicates = 0usize;
    let mut blank = 0usize;

    for (issn, tier) in issns.iter().zip(&tiers) {
        let key = clean_issn(issn.as_deref());
        if key.is_empty() {
            blank += 1;
            continue;
        }
        if !index.insert(&key, tier.as_deref().unwrap_or("")) {
            duplicates += 1;
        }
    }

    if duplicates > 0 {
        warn!("Reference list has {} duplicate ISSNs; kept the first tier for each", duplicates);
    }
    if blank > 0 {
        info!("  ({} reference rows without an ISSN ignored)", blank);
    }

    Ok(index)
}

/// Build the reference index from raw bytes
pub fn build_index_from_bytes(bytes: &[u8], format: TableFormat) -> Result<QualisIndex> {
    let df = read_table_bytes(bytes, format)?;
    build_index_from_frame(&df)
}

/// Load a reference list (CSV, Parquet or spreadsheet, by extension)
pub fn load_reference(path: &Path) -> Result<QualisIndex> {
    info!("Loading Qualis reference from: {}", path.display());
    let start = Instant::now();

    let bytes = fs::read(path)?;
    let index = build_index_from_bytes(&bytes, TableFormat::from_path(path))?;

    info!(
        "Loaded {} reference ISSNs in {}",
        index.len(),
        format_elapsed(start.elapsed())
    );

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_build_index_case_insensitive_headers() {
        let df = df!(
            " ISSN " => ["0001-0001", "0100.1965", "0001-0001", ""],
            "Título" => ["Rev A", "Rev B", "Rev A dup", "No issn"],
            "Estrato" => ["A1", "B2", "C", "A2"]
        )
        .unwrap();

        let index = build_index_from_frame(&df).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.tier("00010001"), Some("A1"));
        assert_eq!(index.tier("01001965"), Some("B2"));
    }

    #[test]
    fn test_missing_issn_column_is_schema_error() {
        let df = df!("periodico" => ["x"], "estrato" => ["A1"]).unwrap();
        assert!(matches!(build_index_from_frame(&df), Err(PipelineError::Schema(_))));
    }

    #[test]
    fn test_missing_tier_column_is_schema_error() {
        let df = df!("issn" => ["0001-0001"], "titulo" => ["x"]).unwrap();
        assert!(matches!(build_index_from_frame(&df), Err(PipelineError::Schema(_))));
    }

    #[test]
    fn test_load_reference_csv() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "ISSN;TITULO;ESTRATO").unwrap();
        writeln!(file, "0001-0001;Revista;A1").unwrap();
        writeln!(file, "1234-567X;Outra;B4").unwrap();
        file.flush().unwrap();

        let index = load_reference(file.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.tier("1234567X"), Some("B4"));
    }

    #[test]
    fn test_load_reference_spreadsheet() {
        let bytes = crate::ingest::spreadsheet::build_xlsx(&[
            &["ISSN", "TITULO", "ESTRATO"],
            &["0001-0001", "Revista", "A1"],
            &["1234-567X", "Outra", "B4"],
            &["0001-0001", "Duplicada", "C"],
        ]);
        let mut file = NamedTempFile::with_suffix(".xlsx").unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let index = load_reference(file.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.tier("00010001"), Some("A1"));
        assert_eq!(index.tier("1234567X"), Some("B4"));
    }
}
