use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::ingest::IngestWarning;

/// Placeholder used when a rejected record has no title
pub const MISSING_TITLE: &str = "Untitled publication";
/// Placeholder used when a rejected record asserts no tier
pub const MISSING_TIER: &str = "N/A";
/// Placeholder used when a rejected record has no ISSN at all
pub const MISSING_ISSN: &str = "S/N";

const RULE: &str = "--------------------------------------------------";

/// One rejected publication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionEntry {
    pub researcher: String,
    /// ISSN exactly as it appeared in the source
    pub issn: Option<String>,
    /// Tier asserted by the source
    pub tier: Option<String>,
    pub title: Option<String>,
}

impl ExclusionEntry {
    /// Single report line for this entry
    pub fn describe(&self) -> String {
        format!(
            "[X] REMOVED: ISSN {} (Qualis: {}) - {}",
            non_blank(&self.issn).unwrap_or(MISSING_ISSN),
            non_blank(&self.tier).unwrap_or(MISSING_TIER),
            non_blank(&self.title).unwrap_or(MISSING_TITLE),
        )
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Render the exclusion report. Entries are expected to be sorted by
/// researcher already; each researcher gets one contiguous block.
pub fn render_exclusion_log(entries: &[ExclusionEntry], warnings: &[IngestWarning]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "EXCLUDED PUBLICATIONS REPORT (QUALIS FILTER)");
    let _ = writeln!(out, "============================================");
    let _ = writeln!(out);

    let mut current: Option<&str> = None;
    for entry in entries {
        if current != Some(entry.researcher.as_str()) {
            if current.is_some() {
                let _ = writeln!(out, "{}", RULE);
            }
            let _ = writeln!(out, "RESEARCHER: {}", entry.researcher);
            current = Some(entry.researcher.as_str());
        }
        let _ = writeln!(out, "  {}", entry.describe());
    }
    if current.is_some() {
        let _ = writeln!(out, "{}", RULE);
    }

    for warning in warnings {
        let _ = writeln!(out, "WARNING: {} skipped: {}", warning.file, warning.message);
    }

    out
}

/// Join per-program logs under a banner for each program
pub fn render_program_logs(logs: &[(String, String)]) -> String {
    logs.iter()
        .map(|(name, text)| format!("=== LOG: {} ===\n{}\n", name, text))
        .collect::<Vec<_>>()
        .join("\n")
}
