//! Friendly-ID and run-ID sequences.
//!
//! The next value is derived from the collection each time: take the most
//! recently created document carrying the prefix, parse its numeric suffix and
//! add one.

use super::documents::{Document, Query, find_one, pluck};
use crate::Result;
use crate::models::{Bug, Task, TestCase, TestRun};
use rusqlite::Connection;

/// Documents that carry a friendly display ID.
pub trait FriendlyId: Document {
    fn friendly_id(&self) -> &str;
    fn set_friendly_id(&mut self, id: String);
}

impl FriendlyId for TestCase {
    fn friendly_id(&self) -> &str {
        &self.friendly_id
    }

    fn set_friendly_id(&mut self, id: String) {
        self.friendly_id = id;
    }
}

impl FriendlyId for Bug {
    fn friendly_id(&self) -> &str {
        &self.friendly_id
    }

    fn set_friendly_id(&mut self, id: String) {
        self.friendly_id = id;
    }
}

impl FriendlyId for Task {
    fn friendly_id(&self) -> &str {
        &self.friendly_id
    }

    fn set_friendly_id(&mut self, id: String) {
        self.friendly_id = id;
    }
}

/// Numeric suffix of `id` if it carries `prefix`. An unparsable suffix is 0.
pub fn sequence_number(id: &str, prefix: &str) -> Option<u64> {
    let rest = id.strip_prefix(prefix)?.strip_prefix('-')?;
    Some(rest.parse().unwrap_or(0))
}

/// The ID following `latest` in the `prefix` sequence.
pub fn next_in_sequence(latest: Option<&str>, prefix: &str) -> String {
    let n = latest
        .and_then(|id| sequence_number(id, prefix))
        .unwrap_or(0);
    format!("{}-{}", prefix, n + 1)
}

/// Allocate the next friendly ID for a collection.
pub fn next_friendly_id<D: FriendlyId>(conn: &Connection, prefix: &str) -> Result<String> {
    let query = Query::new()
        .starts_with("friendly_id", &format!("{}-", prefix))
        .newest_first();
    let latest: Option<D> = find_one(conn, &query)?;
    Ok(next_in_sequence(
        latest.as_ref().map(|doc| doc.friendly_id()),
        prefix,
    ))
}

/// Local counter for bulk paths: reads the highest suffix once, then counts up.
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    prefix: String,
    current: u64,
}

impl SequenceCounter {
    pub fn new(prefix: &str, current: u64) -> Self {
        Self {
            prefix: prefix.to_string(),
            current,
        }
    }

    /// Start after the highest suffix currently stored for `prefix`.
    pub fn load<D: FriendlyId>(conn: &Connection, prefix: &str) -> Result<Self> {
        let ids = pluck::<D>(
            conn,
            "friendly_id",
            &Query::new().starts_with("friendly_id", &format!("{}-", prefix)),
        )?;
        let current = ids
            .iter()
            .flatten()
            .filter_map(|id| sequence_number(id, prefix))
            .max()
            .unwrap_or(0);
        Ok(Self::new(prefix, current))
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn next(&mut self) -> String {
        self.current += 1;
        format!("{}-{}", self.prefix, self.current)
    }
}

pub const RUN_PREFIX: &str = "RUN";

/// `RUN-001`, `RUN-002`, … (at least three digits).
pub fn format_run_id(n: u64) -> String {
    format!("{}-{:03}", RUN_PREFIX, n)
}

/// Allocate the next run ID within a project.
pub fn next_run_id(conn: &Connection, project_id: &str) -> Result<String> {
    let query = Query::new().eq("project_id", project_id).newest_first();
    let latest: Option<TestRun> = find_one(conn, &query)?;
    let n = latest
        .and_then(|run| sequence_number(&run.run_id, RUN_PREFIX))
        .unwrap_or(0);
    Ok(format_run_id(n + 1))
}
