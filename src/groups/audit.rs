//! Roster audit: which configured members appear in the data.

use serde::Serialize;
use std::collections::HashSet;

use super::{GroupResolution, Roster};
use crate::error::Result;
use crate::ingest::text_values;
use crate::{GROUP_COL, RESEARCHER_COL};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAudit {
    pub group: String,
    pub found: Vec<String>,
    pub missing: Vec<String>,
    pub expected: usize,
}

impl GroupAudit {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RosterAudit {
    pub groups: Vec<GroupAudit>,
    /// Researchers in the data that no group lists
    pub unmatched: Vec<String>,
}

/// Compare each group's member list with the (group, researcher) pairs the
/// resolver attributed
pub fn audit_roster(roster: &Roster, resolution: &GroupResolution) -> Result<RosterAudit> {
    let groups_col = text_values(&resolution.grouped, GROUP_COL)?;
    let members_col = text_values(&resolution.grouped, RESEARCHER_COL)?;
    let present: HashSet<(String, String)> = groups_col
        .into_iter()
        .zip(members_col)
        .filter_map(|pair| match pair {
            (Some(group), Some(member)) => Some((group, member)),
            _ => None,
        })
        .collect();

    let groups = roster
        .groups()
        .iter()
        .map(|group| {
            let (mut found, mut missing): (Vec<String>, Vec<String>) = group
                .members
                .iter()
                .cloned()
                .partition(|m| present.contains(&(group.name.clone(), m.clone())));
            found.sort();
            missing.sort();
            GroupAudit {
                group: group.name.clone(),
                found,
                missing,
                expected: group.members.len(),
            }
        })
        .collect();

    Ok(RosterAudit {
        groups,
        unmatched: resolution.unmatched.clone(),
    })
}
