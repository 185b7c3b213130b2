//! Repair passes for data that escaped the invariants.
//!
//! Both passes write through the given connection; run them inside
//! [`Storage::rehearse`](super::Storage::rehearse) to preview the changes.

use super::allocator::{FriendlyId, SequenceCounter};
use super::documents::{Document, Query, find, replace};
use super::links::{add_reverse, item_exists};
use crate::Result;
use crate::models::{Bug, ItemKind, Task, TestCase, WorkItem};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

/// One document that received a new friendly ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Renumbered {
    pub id: String,
    pub from: String,
    pub to: String,
}

/// Renumber documents whose friendly ID is missing or already taken by an
/// older document. New numbers continue past the current maximum, handed out
/// in creation order.
pub fn repair_friendly_ids<D: FriendlyId>(
    conn: &Connection,
    prefix: &str,
) -> Result<Vec<Renumbered>> {
    let docs: Vec<D> = find(conn, &Query::new())?;
    let mut counter = SequenceCounter::load::<D>(conn, prefix)?;
    let mut seen = HashSet::new();
    let mut renumbered = Vec::new();

    for mut doc in docs {
        let current = doc.friendly_id().to_string();
        if !current.is_empty() && seen.insert(current.clone()) {
            continue;
        }

        let next = counter.next();
        info!(
            collection = D::COLLECTION,
            id = %doc.id(),
            from = %current,
            to = %next,
            "Renumbering"
        );
        doc.set_friendly_id(next.clone());
        replace(conn, &doc)?;
        renumbered.push(Renumbered {
            id: doc.id().to_string(),
            from: current,
            to: next,
        });
    }

    Ok(renumbered)
}

/// Renumber all three work-item collections.
pub fn repair_all_friendly_ids(conn: &Connection) -> Result<Vec<Renumbered>> {
    let mut all = repair_friendly_ids::<TestCase>(conn, ItemKind::TestCase.prefix())?;
    all.extend(repair_friendly_ids::<Bug>(conn, ItemKind::Bug.prefix())?);
    all.extend(repair_friendly_ids::<Task>(conn, ItemKind::Task.prefix())?);
    Ok(all)
}

/// One link that was added or dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkFix {
    pub kind: &'static str,
    pub id: String,
    pub peer_kind: &'static str,
    pub peer_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRepairReport {
    /// Reverse references that were missing
    pub added: Vec<LinkFix>,

    /// References to items that no longer exist
    pub dropped: Vec<LinkFix>,
}

/// Make every link symmetric and drop dangling ones.
pub fn repair_links(conn: &Connection) -> Result<LinkRepairReport> {
    let mut report = LinkRepairReport::default();
    repair_collection::<TestCase>(conn, &mut report)?;
    repair_collection::<Bug>(conn, &mut report)?;
    repair_collection::<Task>(conn, &mut report)?;
    info!(
        added = report.added.len(),
        dropped = report.dropped.len(),
        "Link repair finished"
    );
    Ok(report)
}

fn repair_collection<D: WorkItem + Document>(
    conn: &Connection,
    report: &mut LinkRepairReport,
) -> Result<()> {
    let docs: Vec<D> = find(conn, &Query::new())?;
    for mut doc in docs {
        let mut changed = false;
        for peer in D::KIND.peers() {
            for peer_id in doc.links(peer) {
                let fix = LinkFix {
                    kind: D::KIND.label(),
                    id: doc.id().to_string(),
                    peer_kind: peer.label(),
                    peer_id: peer_id.clone(),
                };
                if !item_exists(conn, peer, &peer_id)? {
                    doc.remove_link(peer, &peer_id);
                    changed = true;
                    report.dropped.push(fix);
                } else if add_reverse(conn, peer, &peer_id, D::KIND, doc.id())? {
                    report.added.push(fix);
                }
            }
        }
        if changed {
            replace(conn, &doc)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Storage, insert, load};

    #[test]
    fn test_duplicate_friendly_id_older_keeps_it() {
        let mut storage = Storage::open_memory().unwrap();
        let mut docs = Vec::new();
        for (title, fid) in [("one", "TC-1"), ("three", "TC-3"), ("dup", "TC-3"), ("none", "")] {
            let mut tc = TestCase::new("p".into(), title.into(), "u".into());
            tc.friendly_id = fid.into();
            docs.push(tc);
        }
        storage
            .write(|tx| {
                for doc in &docs {
                    insert(tx, doc)?;
                }
                Ok(())
            })
            .unwrap();

        let renumbered = storage
            .write(|tx| repair_friendly_ids::<TestCase>(tx, "TC"))
            .unwrap();
        assert_eq!(renumbered.len(), 2);

        let older: TestCase = storage.read(|conn| load(conn, &docs[1].id)).unwrap();
        assert_eq!(older.friendly_id, "TC-3");
        let newer: TestCase = storage.read(|conn| load(conn, &docs[2].id)).unwrap();
        assert_eq!(newer.friendly_id, "TC-4");
        let blank: TestCase = storage.read(|conn| load(conn, &docs[3].id)).unwrap();
        assert_eq!(blank.friendly_id, "TC-5");
    }

    #[test]
    fn test_rehearse_leaves_data_untouched() {
        let mut storage = Storage::open_memory().unwrap();
        let mut a = Bug::new("p".into(), "a".into(), "u".into());
        a.friendly_id = "BUG-1".into();
        let mut b = a.clone();
        b.id = crate::models::new_id();
        storage
            .write(|tx| {
                insert(tx, &a)?;
                insert(tx, &b)
            })
            .unwrap();

        let preview = storage
            .rehearse(|tx| repair_friendly_ids::<Bug>(tx, "BUG"))
            .unwrap();
        assert_eq!(preview.len(), 1);

        let b: Bug = storage.read(|conn| load(conn, &b.id)).unwrap();
        assert_eq!(b.friendly_id, "BUG-1");
    }

    #[test]
    fn test_repair_links() {
        let mut storage = Storage::open_memory().unwrap();
        let bug = Bug::new("p".into(), "bug".into(), "u".into());
        let mut tc = TestCase::new("p".into(), "case".into(), "u".into());
        tc.linked_bug_ids = vec![bug.id.clone(), "gone".into()];
        storage
            .write(|tx| {
                insert(tx, &bug)?;
                insert(tx, &tc)
            })
            .unwrap();

        let report = storage.write(|tx| repair_links(tx)).unwrap();
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].peer_id, "gone");

        let bug: Bug = storage.read(|conn| load(conn, &bug.id)).unwrap();
        assert_eq!(bug.linked_test_case_ids, vec![tc.id.clone()]);
        let tc: TestCase = storage.read(|conn| load(conn, &tc.id)).unwrap();
        assert_eq!(tc.linked_bug_ids, vec![bug.id.clone()]);

        let again = storage.write(|tx| repair_links(tx)).unwrap();
        assert!(again.added.is_empty() && again.dropped.is_empty());
    }
}
