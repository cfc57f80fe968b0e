//! Program catalog for multi-source runs and the global researcher scan.

use log::{debug, info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::ingest::{SourceMode, TableFormat};
use crate::normalize::normalize_text;
use crate::RESEARCHER_COL;

/// One program: its reference list and its publication source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramEntry {
    pub name: String,
    pub reference: PathBuf,
    pub source: PathBuf,
    /// `archive`, `columnar` or `auto` (default)
    #[serde(default)]
    pub mode: Option<String>,
}

impl ProgramEntry {
    /// Resolve the source mode, inferring it from the file name when unset
    pub fn source_mode(&self) -> Result<SourceMode> {
        resolve_mode(self.mode.as_deref(), &self.source)
    }
}

/// Interpret a mode flag for a source path
pub fn resolve_mode(mode: Option<&str>, source: &Path) -> Result<SourceMode> {
    match mode.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
        Some("archive") => Ok(SourceMode::Archive),
        Some("columnar") => Ok(SourceMode::Columnar(TableFormat::from_path(source))),
        None | Some("") | Some("auto") => SourceMode::detect(source).ok_or_else(|| {
            PipelineError::Parse(format!(
                "cannot infer source mode from '{}'",
                source.display()
            ))
        }),
        Some(other) => Err(PipelineError::Parse(format!("unknown source mode '{}'", other))),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub programs: Vec<ProgramEntry>,
}

impl Catalog {
    /// Load a JSON catalog. Relative paths are taken from the catalog's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let mut catalog: Catalog = serde_json::from_slice(&fs::read(path)?)?;
        if let Some(base) = path.parent() {
            for program in &mut catalog.programs {
                if program.reference.is_relative() {
                    program.reference = base.join(&program.reference);
                }
                if program.source.is_relative() {
                    program.source = base.join(&program.source);
                }
            }
        }
        info!("Catalog {} lists {} programs", path.display(), catalog.programs.len());
        Ok(catalog)
    }

    pub fn find(&self, name: &str) -> Option<&ProgramEntry> {
        self.programs.iter().find(|p| p.name == name)
    }

    /// Keep only the named programs, in catalog order. Unknown names are an error.
    pub fn select(&self, names: &[String]) -> Result<Vec<ProgramEntry>> {
        if names.is_empty() {
            return Ok(self.programs.clone());
        }
        for name in names {
            if self.find(name).is_none() {
                return Err(PipelineError::Parse(format!("program '{}' is not in the catalog", name)));
            }
        }
        Ok(self
            .programs
            .iter()
            .filter(|p| names.contains(&p.name))
            .cloned()
            .collect())
    }
}

/// Programs whose snapshot lists a researcher matching the search term
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub program: String,
    pub researchers: Vec<String>,
}

/// Distinct researcher names in a Parquet snapshot whose normalized form
/// contains `needle`
fn scan_snapshot(path: &Path, needle: &str) -> Result<Vec<String>> {
    let names = LazyFrame::scan_parquet(path, Default::default())?
        .select([col(RESEARCHER_COL).cast(DataType::String)])
        .collect()?;

    let mut found = BTreeSet::new();
    for name in names.column(RESEARCHER_COL)?.str()?.into_iter().flatten() {
        if normalize_text(name).contains(needle) {
            found.insert(name.to_string());
        }
    }
    Ok(found.into_iter().collect())
}

/// Scan every columnar Parquet program for researchers matching `term`
/// without reconciling anything. Unreadable snapshots are skipped.
pub fn search_catalog(catalog: &Catalog, term: &str) -> Vec<SearchHit> {
    let needle = normalize_text(term);
    let mut hits = Vec::new();

    for program in &catalog.programs {
        match program.source_mode() {
            Ok(SourceMode::Columnar(TableFormat::Parquet)) => {}
            _ => {
                debug!("Skipping {}: not a Parquet snapshot", program.name);
                continue;
            }
        }
        if !program.source.exists() {
            warn!("Snapshot for {} not found: {}", program.name, program.source.display());
            continue;
        }

        match scan_snapshot(&program.source, &needle) {
            Ok(researchers) if !researchers.is_empty() => hits.push(SearchHit {
                program: program.name.clone(),
                researchers,
            }),
            Ok(_) => {}
            Err(e) => warn!("Could not scan {}: {}", program.name, e),
        }
    }
    hits
}
