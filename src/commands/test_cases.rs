//! Test case commands, including duplicate/move and bulk variants.

use super::test_runs::record_run;
use super::{authorize, require};
use crate::auth::Identity;
use crate::models::items::dedup_ids;
use crate::models::{Action, ItemKind, Priority, TestCase, TestCasePatch, TestCaseStatus, WorkItem};
use crate::storage::{
    Query, SequenceCounter, Storage, find, insert, link_all, load, next_friendly_id, prune_missing,
    remove, replace, sync_links, unlink_all,
};
use crate::{Error, Result};
use rusqlite::Connection;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::info;

const PREFIX: &str = "TC";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTestCase {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub preconditions: String,
    pub steps: String,
    pub expected_result: String,
    pub priority: Priority,
    pub status: TestCaseStatus,
    pub tags: Vec<String>,
    pub linked_bug_ids: Vec<String>,
    pub linked_task_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkSelection {
    pub ids: Vec<String>,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreate {
    pub project_id: String,
    pub test_cases: Vec<NewTestCase>,
}

fn build(identity: &Identity, project_id: &str, input: NewTestCase) -> Result<TestCase> {
    let mut tc = TestCase::new(
        project_id.to_string(),
        input.title.trim().to_string(),
        identity.user_id.clone(),
    );
    tc.description = input.description;
    tc.preconditions = input.preconditions;
    tc.steps = input.steps;
    tc.expected_result = input.expected_result;
    tc.priority = input.priority;
    tc.status = input.status;
    tc.tags = input.tags;
    tc.linked_bug_ids = dedup_ids(input.linked_bug_ids);
    tc.linked_task_ids = dedup_ids(input.linked_task_ids);
    tc.validate()?;
    Ok(tc)
}

/// Persist a new test case and its reverse links.
fn store(conn: &Connection, tc: &mut TestCase) -> Result<()> {
    prune_missing(conn, tc)?;
    insert(conn, tc)?;
    link_all(conn, tc)?;
    Ok(())
}

/// A contentful copy of `source` in `project_id`: fresh identity, no links.
fn copy_of(source: &TestCase, project_id: &str, identity: &Identity) -> TestCase {
    let mut copy = TestCase::new(
        project_id.to_string(),
        format!("{} (Copy)", source.title),
        identity.user_id.clone(),
    );
    copy.description = source.description.clone();
    copy.preconditions = source.preconditions.clone();
    copy.steps = source.steps.clone();
    copy.expected_result = source.expected_result.clone();
    copy.priority = source.priority;
    copy.tags = source.tags.clone();
    copy
}

pub fn list_test_cases(
    storage: &Storage,
    identity: &Identity,
    project_id: &str,
) -> Result<Vec<TestCase>> {
    storage.read(|conn| {
        authorize(conn, identity, project_id, ItemKind::TestCase, Action::View)?;
        find(conn, &Query::new().eq("project_id", project_id).newest_first())
    })
}

pub fn create_test_case(
    storage: &mut Storage,
    identity: &Identity,
    input: NewTestCase,
) -> Result<TestCase> {
    require(&input.project_id, "projectId")?;
    let project_id = input.project_id.clone();
    let mut tc = build(identity, &project_id, input)?;

    storage.write(|tx| {
        authorize(tx, identity, &project_id, ItemKind::TestCase, Action::Create)?;
        tc.friendly_id = next_friendly_id::<TestCase>(tx, PREFIX)?;
        store(tx, &mut tc)
    })?;

    info!(id = %tc.id, friendly_id = %tc.friendly_id, "Created test case");
    Ok(tc)
}

/// Apply a partial update. Moving into `Pass` or `Fail` from another status
/// records a test run.
pub fn update_test_case(
    storage: &mut Storage,
    identity: &Identity,
    id: &str,
    patch: TestCasePatch,
) -> Result<TestCase> {
    storage.write(|tx| {
        let before: TestCase = load(tx, id)?;
        authorize(tx, identity, &before.project_id, ItemKind::TestCase, Action::Edit)?;

        let mut after = before.clone();
        patch.apply(&mut after);
        after.validate()?;
        prune_missing(tx, &mut after)?;

        replace(tx, &after)?;
        sync_links(tx, Some(&before), &after)?;

        if after.status != before.status {
            if let Some(status) = after.status.run_status() {
                record_run(tx, &after, status, &identity.user_id)?;
            }
        }
        Ok(after)
    })
}

pub fn delete_test_case(storage: &mut Storage, identity: &Identity, id: &str) -> Result<()> {
    storage.write(|tx| {
        let tc: TestCase = load(tx, id)?;
        authorize(tx, identity, &tc.project_id, ItemKind::TestCase, Action::Edit)?;
        remove::<TestCase>(tx, id)?;
        let touched = unlink_all(tx, ItemKind::TestCase, id)?;
        info!(id = %id, friendly_id = %tc.friendly_id, unlinked = touched, "Deleted test case");
        Ok(())
    })
}

fn duplicate_in(
    conn: &Connection,
    identity: &Identity,
    id: &str,
    target: Option<&str>,
    next_id: &mut dyn FnMut(&Connection) -> Result<String>,
) -> Result<TestCase> {
    let source: TestCase = load(conn, id)?;
    authorize(conn, identity, &source.project_id, ItemKind::TestCase, Action::View)?;
    let project_id = target.unwrap_or(&source.project_id).to_string();
    authorize(conn, identity, &project_id, ItemKind::TestCase, Action::Create)?;

    let mut copy = copy_of(&source, &project_id, identity);
    copy.friendly_id = next_id(conn)?;
    insert(conn, &copy)?;
    Ok(copy)
}

/// Copy a test case, into `target_project` if given.
pub fn duplicate_test_case(
    storage: &mut Storage,
    identity: &Identity,
    id: &str,
    target_project: Option<&str>,
) -> Result<TestCase> {
    storage.write(|tx| {
        duplicate_in(tx, identity, id, target_project, &mut |conn| {
            next_friendly_id::<TestCase>(conn, PREFIX)
        })
    })
}

fn move_in(conn: &Connection, identity: &Identity, id: &str, project_id: &str) -> Result<TestCase> {
    let before: TestCase = load(conn, id)?;
    authorize(conn, identity, &before.project_id, ItemKind::TestCase, Action::Edit)?;
    if before.project_id == project_id {
        return Ok(before);
    }
    authorize(conn, identity, project_id, ItemKind::TestCase, Action::Create)?;

    // links never cross projects
    let mut after = before.clone();
    after.clear_links();
    after.project_id = project_id.to_string();
    replace(conn, &after)?;
    sync_links(conn, Some(&before), &after)?;
    Ok(after)
}

/// Move a test case to another project, dropping its links.
pub fn move_test_case(
    storage: &mut Storage,
    identity: &Identity,
    id: &str,
    project_id: &str,
) -> Result<TestCase> {
    require(project_id, "projectId")?;
    storage.write(|tx| move_in(tx, identity, id, project_id))
}

fn unique(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert(id.as_str())).cloned().collect()
}

pub fn bulk_duplicate(
    storage: &mut Storage,
    identity: &Identity,
    selection: BulkSelection,
) -> Result<Vec<TestCase>> {
    storage.write(|tx| {
        let mut counter = SequenceCounter::load::<TestCase>(tx, PREFIX)?;
        let mut copies = Vec::new();
        for id in unique(&selection.ids) {
            copies.push(duplicate_in(
                tx,
                identity,
                &id,
                selection.project_id.as_deref(),
                &mut |_| Ok(counter.next()),
            )?);
        }
        info!(count = copies.len(), "Duplicated test cases");
        Ok(copies)
    })
}

pub fn bulk_move(
    storage: &mut Storage,
    identity: &Identity,
    selection: BulkSelection,
) -> Result<Vec<TestCase>> {
    let project_id = selection
        .project_id
        .clone()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| Error::Validation("projectId is required".to_string()))?;

    storage.write(|tx| {
        unique(&selection.ids)
            .iter()
            .map(|id| move_in(tx, identity, id, &project_id))
            .collect()
    })
}

/// Delete several test cases. All or nothing.
pub fn bulk_delete(
    storage: &mut Storage,
    identity: &Identity,
    selection: BulkSelection,
) -> Result<usize> {
    storage.write(|tx| {
        let ids = unique(&selection.ids);
        for id in &ids {
            let tc: TestCase = load(tx, id)?;
            authorize(tx, identity, &tc.project_id, ItemKind::TestCase, Action::Edit)?;
            remove::<TestCase>(tx, id)?;
            unlink_all(tx, ItemKind::TestCase, id)?;
        }
        info!(count = ids.len(), "Deleted test cases");
        Ok(ids.len())
    })
}

/// Create several test cases in one project, numbering them from one counter.
pub fn bulk_create(
    storage: &mut Storage,
    identity: &Identity,
    input: BulkCreate,
) -> Result<Vec<TestCase>> {
    require(&input.project_id, "projectId")?;
    let project_id = input.project_id;
    let mut cases = input
        .test_cases
        .into_iter()
        .map(|item| build(identity, &project_id, item))
        .collect::<Result<Vec<_>>>()?;

    storage.write(|tx| {
        authorize(tx, identity, &project_id, ItemKind::TestCase, Action::Create)?;
        let mut counter = SequenceCounter::load::<TestCase>(tx, PREFIX)?;
        for tc in &mut cases {
            tc.friendly_id = counter.next();
            store(tx, tc)?;
        }
        Ok(())
    })?;

    info!(count = cases.len(), project = %project_id, "Bulk-created test cases");
    Ok(cases)
}
