//! Source ingestion: per-researcher archives or one consolidated table,
//! unified into a single all-text frame with a `pesquisador` column.

pub mod archive;
pub mod columnar;
pub mod spreadsheet;
pub mod table;

pub use archive::*;
pub use columnar::*;
pub use spreadsheet::read_spreadsheet_bytes;
pub use table::*;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::RESEARCHER_COL;

/// How a source file is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Archive with one CSV per researcher, named after the researcher
    Archive,
    /// Single table that already carries a researcher column
    Columnar(TableFormat),
}

impl SourceMode {
    /// Infer the mode from a file name
    pub fn detect<P: AsRef<Path>>(path: P) -> Option<Self> {
        let name = path.as_ref().file_name()?.to_str()?.to_lowercase();
        if name.ends_with(".zip") || name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(SourceMode::Archive)
        } else if name.ends_with(".parquet") || name.ends_with(".pq") {
            Some(SourceMode::Columnar(TableFormat::Parquet))
        } else if name.ends_with(".xlsx") || name.ends_with(".xls") {
            Some(SourceMode::Columnar(TableFormat::Xlsx))
        } else if name.ends_with(".csv") {
            Some(SourceMode::Columnar(TableFormat::Csv))
        } else {
            None
        }
    }

    /// Stable tag mixed into cache keys
    pub fn cache_tag(&self) -> &'static str {
        match self {
            SourceMode::Archive => "archive",
            SourceMode::Columnar(TableFormat::Csv) => "columnar-csv",
            SourceMode::Columnar(TableFormat::Parquet) => "columnar-parquet",
            SourceMode::Columnar(TableFormat::Xlsx) => "columnar-xlsx",
        }
    }
}

/// A source file or row that could not be read; the run continued without it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestWarning {
    pub file: String,
    pub message: String,
}

/// Output of ingestion
#[derive(Debug, Clone)]
pub struct IngestedBatch {
    pub frame: DataFrame,
    pub warnings: Vec<IngestWarning>,
    pub files_read: usize,
    pub files_skipped: usize,
}

/// Frame with only the researcher column and no rows
pub fn empty_record_frame() -> Result<DataFrame> {
    Ok(DataFrame::new(vec![Column::new(
        RESEARCHER_COL.into(),
        Vec::<String>::new(),
    )])?)
}

/// Ingest source bytes in the given mode
pub fn ingest_source(bytes: &[u8], mode: SourceMode) -> Result<IngestedBatch> {
    match mode {
        SourceMode::Archive => ingest_archive(bytes),
        SourceMode::Columnar(format) => ingest_columnar(bytes, format),
    }
}
