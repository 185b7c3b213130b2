//! Test run history.

use super::{authorize, member_project};
use crate::auth::Identity;
use crate::models::{Action, ItemKind, RunStatus, TestCase, TestRun};
use crate::storage::{Query, Storage, fetch, find, find_one, insert, load, next_run_id, replace};
use crate::{Error, Result};
use rusqlite::Connection;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub test_case_id: String,
    pub status: RunStatus,
}

/// Append a run for `test_case` in its project.
pub(crate) fn record_run(
    conn: &Connection,
    test_case: &TestCase,
    status: RunStatus,
    executed_by: &str,
) -> Result<TestRun> {
    let run_id = next_run_id(conn, &test_case.project_id)?;
    let run = TestRun::new(
        run_id,
        test_case.id.clone(),
        test_case.project_id.clone(),
        status,
        executed_by.to_string(),
    );
    insert(conn, &run)?;
    info!(
        run = %run.run_id,
        test_case = %test_case.friendly_id,
        status = ?status,
        "Recorded test run"
    );
    Ok(run)
}

/// Record an explicit result and set the test case's status to match.
pub fn report_run(
    storage: &mut Storage,
    identity: &Identity,
    report: RunReport,
) -> Result<TestRun> {
    storage.write(|tx| {
        let mut test_case: TestCase = load(tx, &report.test_case_id)?;
        authorize(tx, identity, &test_case.project_id, ItemKind::TestCase, Action::Edit)?;

        test_case.status = report.status.into();
        test_case.validate()?;
        let run = record_run(tx, &test_case, report.status, &identity.user_id)?;
        replace(tx, &test_case)?;
        Ok(run)
    })
}

/// Project owning the runs of `test_case_id`. Runs outlive their test case,
/// so fall back to the runs themselves.
fn run_project(conn: &Connection, test_case_id: &str) -> Result<String> {
    if let Some(tc) = fetch::<TestCase>(conn, test_case_id)? {
        return Ok(tc.project_id);
    }
    let any: Option<TestRun> = find_one(conn, &Query::new().eq("test_case_id", test_case_id))?;
    any.map(|run| run.project_id)
        .ok_or_else(|| Error::NotFound("Test case not found".to_string()))
}

/// All runs of a test case, newest first.
pub fn run_history(
    storage: &Storage,
    identity: &Identity,
    test_case_id: &str,
) -> Result<Vec<TestRun>> {
    storage.read(|conn| {
        let project_id = run_project(conn, test_case_id)?;
        authorize(conn, identity, &project_id, ItemKind::TestCase, Action::View)?;
        find(
            conn,
            &Query::new().eq("test_case_id", test_case_id).newest_first(),
        )
    })
}

pub fn latest_run(storage: &Storage, identity: &Identity, test_case_id: &str) -> Result<TestRun> {
    run_history(storage, identity, test_case_id)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::NotFound("No runs recorded for this test case".to_string()))
}

/// Newest run per test case. Test cases without runs, or in projects the
/// caller cannot see, are absent from the map.
pub fn latest_runs(
    storage: &Storage,
    identity: &Identity,
    test_case_ids: &[String],
) -> Result<BTreeMap<String, TestRun>> {
    storage.read(|conn| {
        let runs: Vec<TestRun> = find(conn, &Query::new().any_of("test_case_id", test_case_ids))?;

        let mut visible: HashMap<String, bool> = HashMap::new();
        let mut latest: BTreeMap<String, TestRun> = BTreeMap::new();
        for run in runs {
            let allowed = match visible.get(&run.project_id) {
                Some(allowed) => *allowed,
                None => {
                    let allowed = match member_project(conn, identity, &run.project_id) {
                        Ok(_) => true,
                        Err(Error::Forbidden(_) | Error::NotFound(_)) => false,
                        Err(e) => return Err(e),
                    };
                    visible.insert(run.project_id.clone(), allowed);
                    allowed
                }
            };
            if !allowed {
                continue;
            }

            // runs arrive oldest first, so later entries win ties
            let newer = latest
                .get(&run.test_case_id)
                .is_none_or(|current| run.run_date_time >= current.run_date_time);
            if newer {
                latest.insert(run.test_case_id.clone(), run);
            }
        }
        Ok(latest)
    })
}
