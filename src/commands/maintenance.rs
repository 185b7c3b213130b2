//! Offline repair commands.

use super::Output;
use crate::Result;
use crate::storage::Storage;
use crate::storage::repair::{self, LinkFix, LinkRepairReport, Renumbered};
use serde::Serialize;

/// Result of `repair ids`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdRepair {
    pub dry_run: bool,
    pub renumbered: Vec<Renumbered>,
}

impl Output for IdRepair {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
    }

    fn to_human(&self) -> String {
        if self.renumbered.is_empty() {
            return "No duplicate friendly IDs found.".to_string();
        }
        let verb = if self.dry_run { "Would renumber" } else { "Renumbered" };
        let mut lines = vec![format!("{} {} item(s):", verb, self.renumbered.len())];
        for r in &self.renumbered {
            let from = if r.from.is_empty() { "(none)" } else { r.from.as_str() };
            lines.push(format!("  {} {} -> {}", r.id, from, r.to));
        }
        lines.join("\n")
    }
}

/// Result of `repair links`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRepair {
    pub dry_run: bool,
    #[serde(flatten)]
    pub report: LinkRepairReport,
}

fn describe(fix: &LinkFix) -> String {
    format!("  {} {} <-> {} {}", fix.kind, fix.id, fix.peer_kind, fix.peer_id)
}

impl Output for LinkRepair {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
    }

    fn to_human(&self) -> String {
        let LinkRepairReport { added, dropped } = &self.report;
        if added.is_empty() && dropped.is_empty() {
            return "All links are symmetric.".to_string();
        }
        let (add, drop) = if self.dry_run {
            ("Would add", "Would drop")
        } else {
            ("Added", "Dropped")
        };
        let mut lines = Vec::new();
        if !added.is_empty() {
            lines.push(format!("{} {} reverse link(s):", add, added.len()));
            lines.extend(added.iter().map(describe));
        }
        if !dropped.is_empty() {
            lines.push(format!("{} {} dangling link(s):", drop, dropped.len()));
            lines.extend(dropped.iter().map(describe));
        }
        lines.join("\n")
    }
}

/// Renumber duplicate friendly IDs across all work items.
pub fn repair_ids(storage: &mut Storage, dry_run: bool) -> Result<IdRepair> {
    let renumbered = if dry_run {
        storage.rehearse(|tx| repair::repair_all_friendly_ids(tx))?
    } else {
        storage.write(|tx| repair::repair_all_friendly_ids(tx))?
    };
    Ok(IdRepair { dry_run, renumbered })
}

/// Restore link symmetry and drop dangling links.
pub fn repair_links(storage: &mut Storage, dry_run: bool) -> Result<LinkRepair> {
    let report = if dry_run {
        storage.rehearse(|tx| repair::repair_links(tx))?
    } else {
        storage.write(|tx| repair::repair_links(tx))?
    };
    Ok(LinkRepair { dry_run, report })
}
