//! Reverse-link maintenance.
//!
//! Links between test cases, bugs and tasks are stored on both sides. When an
//! item's link sets change, the peers named in the difference get this item's
//! ID added to or pulled from their reverse field.

use super::documents::{Document, Query, fetch, find, pluck, replace};
use crate::Result;
use crate::models::{Bug, ItemKind, Task, TestCase, WorkItem};
use rusqlite::Connection;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkOp {
    Add,
    Remove,
}

/// IDs in `after` but not `before`, and IDs in `before` but not `after`.
pub fn diff_links(before: &[String], after: &[String]) -> (Vec<String>, Vec<String>) {
    let added = after
        .iter()
        .filter(|id| !before.contains(id))
        .cloned()
        .collect();
    let removed = before
        .iter()
        .filter(|id| !after.contains(id))
        .cloned()
        .collect();
    (added, removed)
}

/// Project of the item of `kind` with `id`, if it exists.
pub fn item_project(conn: &Connection, kind: ItemKind, id: &str) -> Result<Option<String>> {
    let query = Query::new().eq("id", id);
    let projects = match kind {
        ItemKind::TestCase => pluck::<TestCase>(conn, "project_id", &query)?,
        ItemKind::Bug => pluck::<Bug>(conn, "project_id", &query)?,
        ItemKind::Task => pluck::<Task>(conn, "project_id", &query)?,
    };
    Ok(projects.into_iter().flatten().next())
}

/// Whether an item of `kind` with `id` exists.
pub fn item_exists(conn: &Connection, kind: ItemKind, id: &str) -> Result<bool> {
    Ok(item_project(conn, kind, id)?.is_some())
}

/// Drop links to items that do not exist or belong to another project.
pub fn prune_missing<D: WorkItem>(conn: &Connection, doc: &mut D) -> Result<()> {
    for peer in D::KIND.peers() {
        for id in doc.links(peer) {
            let project = item_project(conn, peer, &id)?;
            if project.as_deref() != Some(doc.project_id()) {
                warn!(kind = %peer, id = %id, "Dropping link to item outside the project");
                doc.remove_link(peer, &id);
            }
        }
    }
    Ok(())
}

/// Bring peers in line after `doc` changed from `before` (None for a new
/// item). Returns the number of peers touched.
pub fn sync_links<D: WorkItem + Document>(
    conn: &Connection,
    before: Option<&D>,
    after: &D,
) -> Result<usize> {
    let mut touched = 0;
    for peer in D::KIND.peers() {
        let old = before.map(|doc| doc.links(peer)).unwrap_or_default();
        let (added, removed) = diff_links(&old, &after.links(peer));

        for id in added {
            if edit_peer(conn, peer, &id, D::KIND, after.id(), LinkOp::Add)? {
                touched += 1;
            }
        }
        for id in removed {
            if edit_peer(conn, peer, &id, D::KIND, after.id(), LinkOp::Remove)? {
                touched += 1;
            }
        }
    }
    Ok(touched)
}

/// Add reverse references for every link of a freshly stored item.
pub fn link_all<D: WorkItem + Document>(conn: &Connection, doc: &D) -> Result<usize> {
    sync_links(conn, None, doc)
}

/// Add a reverse reference on `peer_id` pointing at `origin_id`.
pub fn add_reverse(
    conn: &Connection,
    peer: ItemKind,
    peer_id: &str,
    origin: ItemKind,
    origin_id: &str,
) -> Result<bool> {
    edit_peer(conn, peer, peer_id, origin, origin_id, LinkOp::Add)
}

/// Pull `id` of kind `origin` from every item that references it.
///
/// Finds candidates by scanning document bodies, so references are removed
/// even where the forward side is already gone.
pub fn unlink_all(conn: &Connection, origin: ItemKind, id: &str) -> Result<usize> {
    let mut touched = 0;
    for peer in origin.peers() {
        touched += match peer {
            ItemKind::TestCase => sweep::<TestCase>(conn, origin, id)?,
            ItemKind::Bug => sweep::<Bug>(conn, origin, id)?,
            ItemKind::Task => sweep::<Task>(conn, origin, id)?,
        };
    }
    Ok(touched)
}

fn sweep<P: WorkItem + Document>(conn: &Connection, origin: ItemKind, id: &str) -> Result<usize> {
    let candidates: Vec<P> = find(conn, &Query::new().contains("body", id))?;
    let mut touched = 0;
    for mut doc in candidates {
        if doc.remove_link(origin, id) {
            replace(conn, &doc)?;
            touched += 1;
        }
    }
    Ok(touched)
}

fn edit_peer(
    conn: &Connection,
    peer: ItemKind,
    peer_id: &str,
    origin: ItemKind,
    origin_id: &str,
    op: LinkOp,
) -> Result<bool> {
    match peer {
        ItemKind::TestCase => edit::<TestCase>(conn, peer_id, origin, origin_id, op),
        ItemKind::Bug => edit::<Bug>(conn, peer_id, origin, origin_id, op),
        ItemKind::Task => edit::<Task>(conn, peer_id, origin, origin_id, op),
    }
}

fn edit<P: WorkItem + Document>(
    conn: &Connection,
    id: &str,
    origin: ItemKind,
    origin_id: &str,
    op: LinkOp,
) -> Result<bool> {
    let Some(mut doc) = fetch::<P>(conn, id)? else {
        warn!(kind = %P::KIND, id = %id, "Linked item not found, skipping reverse link");
        return Ok(false);
    };

    let changed = match op {
        LinkOp::Add => doc.add_link(origin, origin_id),
        LinkOp::Remove => doc.remove_link(origin, origin_id),
    };
    if changed {
        debug!(kind = %P::KIND, id = %id, op = ?op, "Updated reverse link");
        replace(conn, &doc)?;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinkTarget, TaskLink};
    use crate::storage::{Storage, insert, load};

    fn setup() -> (Storage, TestCase, Bug, Task) {
        let mut storage = Storage::open_memory().unwrap();
        let tc = TestCase::new("p".into(), "case".into(), "u".into());
        let bug = Bug::new("p".into(), "bug".into(), "u".into());
        let task = Task::new("p".into(), "task".into(), "u".into());
        storage
            .write(|tx| {
                insert(tx, &tc)?;
                insert(tx, &bug)?;
                insert(tx, &task)
            })
            .unwrap();
        (storage, tc, bug, task)
    }

    #[test]
    fn test_diff_links() {
        let before = vec!["a".to_string(), "b".to_string()];
        let after = vec!["b".to_string(), "c".to_string()];
        let (added, removed) = diff_links(&before, &after);
        assert_eq!(added, vec!["c"]);
        assert_eq!(removed, vec!["a"]);
    }

    #[test]
    fn test_link_all_adds_reverse_refs() {
        let (mut storage, _, bug, task) = setup();
        let mut tc = TestCase::new("p".into(), "linked".into(), "u".into());
        tc.linked_bug_ids = vec![bug.id.clone()];
        tc.linked_task_ids = vec![task.id.clone()];

        storage
            .write(|tx| {
                insert(tx, &tc)?;
                link_all(tx, &tc)
            })
            .unwrap();

        let bug: Bug = storage.read(|conn| load(conn, &bug.id)).unwrap();
        assert_eq!(bug.linked_test_case_ids, vec![tc.id.clone()]);
        let task: Task = storage.read(|conn| load(conn, &task.id)).unwrap();
        assert_eq!(
            task.links,
            vec![TaskLink {
                target_type: LinkTarget::TestCase,
                target_id: tc.id.clone()
            }]
        );
    }

    #[test]
    fn test_sync_links_pulls_removed() {
        let (mut storage, tc, bug, _) = setup();
        let mut linked = tc.clone();
        linked.linked_bug_ids = vec![bug.id.clone()];
        storage
            .write(|tx| {
                replace(tx, &linked)?;
                sync_links(tx, Some(&tc), &linked)
            })
            .unwrap();

        let mut unlinked = linked.clone();
        unlinked.linked_bug_ids.clear();
        storage
            .write(|tx| {
                replace(tx, &unlinked)?;
                sync_links(tx, Some(&linked), &unlinked)
            })
            .unwrap();

        let bug: Bug = storage.read(|conn| load(conn, &bug.id)).unwrap();
        assert!(bug.linked_test_case_ids.is_empty());
    }

    #[test]
    fn test_prune_missing_drops_dangling() {
        let (mut storage, _, bug, _) = setup();
        let other = Bug::new("elsewhere".into(), "other".into(), "u".into());
        storage.write(|tx| insert(tx, &other)).unwrap();

        let mut tc = TestCase::new("p".into(), "x".into(), "u".into());
        tc.linked_bug_ids = vec![bug.id.clone(), "ghost".into(), other.id.clone()];
        storage.read(|conn| prune_missing(conn, &mut tc)).unwrap();
        assert_eq!(tc.linked_bug_ids, vec![bug.id.clone()]);
    }

    #[test]
    fn test_unlink_all_sweeps_peers() {
        let (mut storage, mut tc, bug, mut task) = setup();
        tc.linked_bug_ids.push(bug.id.clone());
        task.add_link(ItemKind::Bug, &bug.id);
        storage
            .write(|tx| {
                replace(tx, &tc)?;
                replace(tx, &task)
            })
            .unwrap();

        let touched = storage
            .write(|tx| unlink_all(tx, ItemKind::Bug, &bug.id))
            .unwrap();
        assert_eq!(touched, 2);

        let tc: TestCase = storage.read(|conn| load(conn, &tc.id)).unwrap();
        assert!(tc.linked_bug_ids.is_empty());
        let task: Task = storage.read(|conn| load(conn, &task.id)).unwrap();
        assert!(task.links.is_empty());
    }
}
