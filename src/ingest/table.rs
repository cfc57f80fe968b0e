//! Schema-tolerant helpers over polars frames: reading loosely formatted
//! CSV, Parquet and spreadsheet bytes, and locating columns by name.

use polars::prelude::*;
use std::borrow::Cow;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use super::spreadsheet::read_spreadsheet_bytes;
use crate::error::Result;
use crate::{ISSN_COL, RESEARCHER_COL, TIER_COL, TITLE_COL, YEAR_COL};

/// Header names accepted for the canonical title column
pub const TITLE_ALIASES: &[&str] = &["titulo", "title"];
/// Header names accepted for the canonical tier column
pub const TIER_ALIASES: &[&str] = &["qualis", "estrato", "tier"];
/// Header names accepted for the canonical year column
pub const YEAR_ALIASES: &[&str] = &["ano_publicacao", "ano", "year"];
/// Header names accepted for the researcher column of consolidated tables
pub const RESEARCHER_ALIASES: &[&str] = &["pesquisador", "researcher"];

/// On-disk layout of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
    /// Workbook; only the first sheet is read
    Xlsx,
}

impl TableFormat {
    /// Pick a format from the file extension; unknown extensions are CSV
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("parquet" | "pq") => TableFormat::Parquet,
            Some("xlsx" | "xlsm" | "xls" | "ods") => TableFormat::Xlsx,
            _ => TableFormat::Csv,
        }
    }
}

/// Decode bytes as UTF-8, falling back to Latin-1. A leading BOM is dropped.
pub fn decode_text_bytes(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Guess the field separator from the header line
pub fn sniff_separator(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Read CSV bytes with every column as text. Malformed rows are skipped and
/// ragged lines truncated rather than failing the whole file.
pub fn read_csv_bytes(bytes: &[u8]) -> Result<DataFrame> {
    let text = decode_text_bytes(bytes);
    let separator = sniff_separator(&text);
    let cursor = Cursor::new(text.into_owned().into_bytes());

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_ignore_errors(true)
        .map_parse_options(|opts| opts.with_separator(separator).with_truncate_ragged_lines(true))
        .into_reader_with_file_handle(cursor)
        .finish()?;
    Ok(df)
}

/// Read a Parquet snapshot held in memory
pub fn read_parquet_bytes(bytes: &[u8]) -> Result<DataFrame> {
    let df = ParquetReader::new(Cursor::new(bytes.to_vec())).finish()?;
    Ok(df)
}

/// Read a table in the given format
pub fn read_table_bytes(bytes: &[u8], format: TableFormat) -> Result<DataFrame> {
    match format {
        TableFormat::Csv => read_csv_bytes(bytes),
        TableFormat::Parquet => read_parquet_bytes(bytes),
        TableFormat::Xlsx => read_spreadsheet_bytes(bytes),
    }
}

/// Owned column names in frame order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|n| n.to_string()).collect()
}

/// First column whose name satisfies the predicate. Never fails.
pub fn find_column<P>(df: &DataFrame, predicate: P) -> Option<String>
where
    P: Fn(&str) -> bool,
{
    df.get_column_names()
        .iter()
        .map(|n| n.as_str())
        .find(|name| predicate(name))
        .map(String::from)
}

/// First column whose lowercased, trimmed name equals one of `aliases`,
/// trying aliases in priority order.
pub fn find_column_by_alias(df: &DataFrame, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| {
        find_column(df, |name| name.trim().eq_ignore_ascii_case(alias))
    })
}

/// The ISSN-bearing column: an exact `issn` header wins over any header
/// merely containing "issn".
pub fn find_issn_column(df: &DataFrame) -> Option<String> {
    find_column_by_alias(df, &[ISSN_COL]).or_else(|| {
        find_column(df, |name| {
            let lower = name.to_lowercase();
            lower.contains("issn") && lower != crate::ISSN_CLEAN_COL
        })
    })
}

/// Lowercase and trim every column name. Names that collide after folding
/// get a numeric suffix so the frame stays valid.
pub fn normalize_column_names(df: &mut DataFrame) -> Result<()> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(df.width());

    for name in column_names(df) {
        let base = name.trim().to_lowercase();
        let mut candidate = base.clone();
        let mut n = 2;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        names.push(candidate);
    }

    df.set_column_names(names)?;
    Ok(())
}

fn rename_alias(df: &mut DataFrame, aliases: &[&str], canonical: &str) -> Result<()> {
    if df.get_column_index(canonical).is_some() {
        return Ok(());
    }
    if let Some(found) = find_column_by_alias(df, aliases) {
        df.rename(&found, canonical.into())?;
    }
    Ok(())
}

/// Rename the located ISSN, title, tier and year columns to their canonical
/// names. Columns that cannot be found are left absent.
pub fn canonicalize_columns(df: &mut DataFrame) -> Result<()> {
    if df.get_column_index(ISSN_COL).is_none() {
        if let Some(found) = find_issn_column(df) {
            df.rename(&found, ISSN_COL.into())?;
        }
    }
    rename_alias(df, TITLE_ALIASES, TITLE_COL)?;
    rename_alias(df, TIER_ALIASES, TIER_COL)?;
    rename_alias(df, YEAR_ALIASES, YEAR_COL)?;
    Ok(())
}

/// Rename the researcher column of a consolidated table to `pesquisador`.
/// Returns false when no such column exists.
pub fn canonicalize_researcher(df: &mut DataFrame) -> Result<bool> {
    if df.get_column_index(RESEARCHER_COL).is_some() {
        return Ok(true);
    }
    match find_column_by_alias(df, RESEARCHER_ALIASES) {
        Some(found) => {
            df.rename(&found, RESEARCHER_COL.into())?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Cast every column to text
pub fn stringify_columns(df: &DataFrame) -> Result<DataFrame> {
    let columns = df
        .get_columns()
        .iter()
        .map(|c| c.cast(&DataType::String))
        .collect::<PolarsResult<Vec<Column>>>()?;
    Ok(DataFrame::new(columns)?)
}

/// Values of a column as optional owned strings, whatever its dtype.
/// A missing column yields `None` for every row.
pub fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    if df.get_column_index(name).is_none() {
        return Ok(vec![None; df.height()]);
    }
    let casted = df.column(name)?.cast(&DataType::String)?;
    let values = casted.str()?.into_iter().map(|v| v.map(String::from)).collect();
    Ok(values)
}
