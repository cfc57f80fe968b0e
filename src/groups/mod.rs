//! Group Resolver: roster loading, record attribution and roster audit.

pub mod audit;
pub mod resolver;

pub use audit::*;
pub use resolver::*;

use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::ingest::{decode_text_bytes, normalize_column_names, read_table_bytes, text_values, TableFormat};
use crate::RESEARCHER_COL;
use polars::prelude::DataFrame;

/// Roster column naming the group
pub const ROSTER_GROUP_COL: &str = "grupo";

/// One configured group and its members, in the order they were listed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterGroup {
    pub name: String,
    pub members: Vec<String>,
}

/// Group name -> member list. Members may appear in several groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    groups: Vec<RosterGroup>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member to a group, creating the group on first use.
    /// Blank names are ignored; repeated members are kept.
    pub fn insert(&mut self, group: &str, member: &str) {
        let group = group.trim();
        let member = member.trim();
        if group.is_empty() || member.is_empty() {
            return;
        }
        match self.groups.iter_mut().find(|g| g.name == group) {
            Some(existing) => existing.members.push(member.to_string()),
            None => self.groups.push(RosterGroup {
                name: group.to_string(),
                members: vec![member.to_string()],
            }),
        }
    }

    pub fn groups(&self) -> &[RosterGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Parse `Researcher Name, Group Name` lines. The split is on the first
/// comma; lines without one are ignored.
pub fn parse_roster_text(text: &str) -> Roster {
    let mut roster = Roster::new();
    for line in text.lines() {
        if let Some((member, group)) = line.split_once(',') {
            roster.insert(group, member);
        }
    }
    roster
}

/// Build a roster from a table with `pesquisador` and `grupo` columns
/// (matched case-insensitively)
pub fn roster_from_frame(df: &DataFrame) -> Result<Roster> {
    let mut df = df.clone();
    normalize_column_names(&mut df)?;

    for required in [RESEARCHER_COL, ROSTER_GROUP_COL] {
        if df.get_column_index(required).is_none() {
            return Err(PipelineError::Schema(format!(
                "roster table has no '{}' column",
                required
            )));
        }
    }

    let members = text_values(&df, RESEARCHER_COL)?;
    let groups = text_values(&df, ROSTER_GROUP_COL)?;

    let mut roster = Roster::new();
    for (member, group) in members.iter().zip(&groups) {
        if let (Some(member), Some(group)) = (member, group) {
            roster.insert(group, member);
        }
    }
    Ok(roster)
}

/// Load a roster from `.csv`/`.parquet`/`.xlsx` tables or plain text lines
pub fn load_roster(path: &Path) -> Result<Roster> {
    let bytes = fs::read(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let roster = match ext.as_str() {
        "csv" | "parquet" | "pq" | "xlsx" | "xlsm" | "xls" | "ods" => {
            let df = read_table_bytes(&bytes, TableFormat::from_path(path))?;
            roster_from_frame(&df)?
        }
        _ => parse_roster_text(&decode_text_bytes(&bytes)),
    };

    if roster.is_empty() {
        warn!("Roster {} defines no groups", path.display());
    } else {
        info!("Loaded {} groups from {}", roster.len(), path.display());
    }
    Ok(roster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_roster_text() {
        let roster = parse_roster_text(
            "João Silva, Grupo A\nMaria Souza, Grupo B\nno comma here\nMaria Souza, Grupo A\nX, Y, Z\n",
        );
        let names: Vec<&str> = roster.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Grupo A", "Grupo B", "Y, Z"]);
        assert_eq!(roster.groups()[0].members, vec!["João Silva", "Maria Souza"]);
    }

    #[test]
    fn test_roster_from_frame_requires_columns() {
        let df = df!("Pesquisador" => ["Ana"], "Grupo" => ["G1"]).unwrap();
        let roster = roster_from_frame(&df).unwrap();
        assert_eq!(roster.groups()[0].members, vec!["Ana"]);

        let df = df!("pesquisador" => ["Ana"]).unwrap();
        assert!(matches!(roster_from_frame(&df), Err(PipelineError::Schema(_))));
    }

    #[test]
    fn test_load_roster_text_and_csv() {
        let mut text = NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(text, "Ana Lima, Grupo X").unwrap();
        assert_eq!(load_roster(text.path()).unwrap().len(), 1);

        let mut csv = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(csv, "pesquisador,grupo\nAna Lima,G1\nBruno,G2").unwrap();
        let roster = load_roster(csv.path()).unwrap();
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_load_roster_spreadsheet() {
        let bytes = crate::ingest::spreadsheet::build_xlsx(&[
            &["Pesquisador", "Grupo"],
            &["Ana Lima", "G1"],
            &["Bruno Reis", "G2"],
            &["Carla Dias", "G1"],
        ]);
        let mut file = NamedTempFile::with_suffix(".xlsx").unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let roster = load_roster(file.path()).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.groups()[0].name, "G1");
        assert_eq!(roster.groups()[0].members, vec!["Ana Lima", "Carla Dias"]);
    }
}
