use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Output files produced by a run, derived from the accepted-table path
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub accepted: PathBuf,
    pub exclusions: PathBuf,
    pub report: PathBuf,
    pub matrix: PathBuf,
}

impl ReportPaths {
    /// Generate sibling paths from a base path
    /// "results.parquet" -> "results.parquet", "results_exclusions.txt",
    /// "results_report.json", "results_matrix.csv"
    pub fn from_base<P: AsRef<Path>>(base: P) -> Self {
        let base = base.as_ref();
        let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        let parent = base.parent();

        let make_path = |suffix: &str, ext: &str| -> PathBuf {
            let filename = format!("{}_{}.{}", stem, suffix, ext);
            match parent {
                Some(p) if !p.as_os_str().is_empty() => p.join(filename),
                _ => PathBuf::from(filename),
            }
        };

        Self {
            accepted: base.to_path_buf(),
            exclusions: make_path("exclusions", "txt"),
            report: make_path("report", "json"),
            matrix: make_path("matrix", "csv"),
        }
    }
}

/// Write a table as CSV when the path ends in `.csv`, Parquet otherwise
pub fn write_table(df: &DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut df = df.clone();

    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    if is_csv {
        CsvWriter::new(file).include_header(true).finish(&mut df)?;
    } else {
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Zstd(None))
            .finish(&mut df)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_path_generation() {
        let paths = ReportPaths::from_base("results.parquet");
        assert_eq!(paths.accepted, PathBuf::from("results.parquet"));
        assert_eq!(paths.exclusions, PathBuf::from("results_exclusions.txt"));
        assert_eq!(paths.report, PathBuf::from("results_report.json"));
        assert_eq!(paths.matrix, PathBuf::from("results_matrix.csv"));
    }

    #[test]
    fn test_report_path_with_directory() {
        let paths = ReportPaths::from_base("/path/to/ppge.parquet");
        assert_eq!(paths.exclusions, PathBuf::from("/path/to/ppge_exclusions.txt"));
        assert_eq!(paths.report, PathBuf::from("/path/to/ppge_report.json"));
    }

    #[test]
    fn test_write_table_csv_and_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let df = df!("pesquisador" => ["Ana", "Bruno"], "peso" => [100.0, 40.0]).unwrap();

        let csv_path = dir.path().join("out.csv");
        write_table(&df, &csv_path).unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        assert!(text.starts_with("pesquisador,peso"));

        let pq_path = dir.path().join("out.parquet");
        write_table(&df, &pq_path).unwrap();
        let loaded = ParquetReader::new(File::open(&pq_path).unwrap()).finish().unwrap();
        assert_eq!(loaded.height(), 2);
    }
}
