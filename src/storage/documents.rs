//! Generic document persistence.
//!
//! A [`Document`] names its table and the indexed columns it exposes. The
//! functions here work on any `&Connection`, so they compose inside a
//! [`Storage::write`](super::Storage::write) transaction.

use crate::models::{Bug, Comment, Note, Notification, Project, Task, TestCase, TestRun, User};
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A JSON document stored in its own table.
pub trait Document: Serialize + DeserializeOwned {
    /// Table name
    const COLLECTION: &'static str;

    /// Human-readable name used in error messages
    const LABEL: &'static str;

    fn id(&self) -> &str;

    fn created_at(&self) -> DateTime<Utc>;

    /// Indexed columns derived from the document.
    fn columns(&self) -> Vec<(&'static str, Option<String>)> {
        Vec::new()
    }
}

/// Timestamp format used for ordering columns. Fixed width, so text order is
/// chronological.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Insert a new document.
pub fn insert<D: Document>(conn: &Connection, doc: &D) -> Result<()> {
    let columns = doc.columns();

    let mut names = vec!["id", "created_at", "body"];
    names.extend(columns.iter().map(|(name, _)| *name));
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        D::COLLECTION,
        names.join(", "),
        placeholders.join(", ")
    );

    let mut values: Vec<Option<String>> = vec![
        Some(doc.id().to_string()),
        Some(timestamp(doc.created_at())),
        Some(serde_json::to_string(doc)?),
    ];
    values.extend(columns.into_iter().map(|(_, value)| value));

    conn.execute(&sql, params_from_iter(values.iter()))?;
    Ok(())
}

/// Overwrite an existing document. Fails with `NotFound` if it is missing.
pub fn replace<D: Document>(conn: &Connection, doc: &D) -> Result<()> {
    let columns = doc.columns();

    let mut assignments = vec!["body = ?1".to_string()];
    for (i, (name, _)) in columns.iter().enumerate() {
        assignments.push(format!("{} = ?{}", name, i + 2));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        D::COLLECTION,
        assignments.join(", "),
        columns.len() + 2
    );

    let mut values: Vec<Option<String>> = vec![Some(serde_json::to_string(doc)?)];
    values.extend(columns.into_iter().map(|(_, value)| value));
    values.push(Some(doc.id().to_string()));

    let updated = conn.execute(&sql, params_from_iter(values.iter()))?;
    if updated == 0 {
        return Err(not_found::<D>());
    }
    Ok(())
}

/// Get a document by ID, if present.
pub fn fetch<D: Document>(conn: &Connection, id: &str) -> Result<Option<D>> {
    let sql = format!("SELECT body FROM {} WHERE id = ?1", D::COLLECTION);
    let body: Option<String> = conn
        .query_row(&sql, [id], |row| row.get(0))
        .optional()?;

    match body {
        Some(body) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

/// Get a document by ID, failing with `NotFound` if it is missing.
pub fn load<D: Document>(conn: &Connection, id: &str) -> Result<D> {
    fetch(conn, id)?.ok_or_else(not_found::<D>)
}

/// Delete a document by ID. Returns whether it existed.
pub fn remove<D: Document>(conn: &Connection, id: &str) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", D::COLLECTION);
    Ok(conn.execute(&sql, [id])? > 0)
}

pub(crate) fn not_found<D: Document>() -> Error {
    Error::NotFound(format!("{} not found", D::LABEL))
}

/// Filter and ordering for collection scans.
///
/// Column names are always static identifiers from this crate; values are
/// bound as parameters.
#[derive(Debug, Clone, Default)]
pub struct Query {
    conditions: Vec<String>,
    params: Vec<String>,
    newest_first: bool,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`
    pub fn eq(mut self, column: &'static str, value: impl Into<String>) -> Self {
        self.conditions.push(format!("{} = ?", column));
        self.params.push(value.into());
        self
    }

    /// `column IN (values…)`; an empty list matches nothing.
    pub fn any_of(mut self, column: &'static str, values: &[String]) -> Self {
        if values.is_empty() {
            self.conditions.push("0".to_string());
            return self;
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        self.conditions
            .push(format!("{} IN ({})", column, placeholders));
        self.params.extend(values.iter().cloned());
        self
    }

    /// Column starts with `prefix`.
    pub fn starts_with(mut self, column: &'static str, prefix: &str) -> Self {
        self.conditions.push(format!(
            "substr({}, 1, {}) = ?",
            column,
            prefix.chars().count()
        ));
        self.params.push(prefix.to_string());
        self
    }

    /// Column contains `needle` anywhere.
    pub fn contains(mut self, column: &'static str, needle: &str) -> Self {
        self.conditions.push(format!("instr({}, ?) > 0", column));
        self.params.push(needle.to_string());
        self
    }

    /// Order by creation time descending (default: ascending).
    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    fn tail(&self) -> String {
        // rowid breaks ties between documents created in the same microsecond
        let order = if self.newest_first {
            " ORDER BY created_at DESC, rowid DESC"
        } else {
            " ORDER BY created_at ASC, rowid ASC"
        };
        match self.limit {
            Some(limit) => format!("{} LIMIT {}", order, limit),
            None => order.to_string(),
        }
    }
}

/// All documents matching `query`.
pub fn find<D: Document>(conn: &Connection, query: &Query) -> Result<Vec<D>> {
    let sql = format!(
        "SELECT body FROM {}{}{}",
        D::COLLECTION,
        query.where_clause(),
        query.tail()
    );
    let mut stmt = conn.prepare(&sql)?;
    let bodies: Vec<String> = stmt
        .query_map(params_from_iter(query.params.iter()), |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;

    bodies
        .iter()
        .map(|body| serde_json::from_str(body).map_err(Error::from))
        .collect()
}

/// First document matching `query`.
pub fn find_one<D: Document>(conn: &Connection, query: &Query) -> Result<Option<D>> {
    let query = query.clone().limit(1);
    Ok(find::<D>(conn, &query)?.into_iter().next())
}

/// Values of one indexed column for the documents matching `query`.
pub fn pluck<D: Document>(
    conn: &Connection,
    column: &'static str,
    query: &Query,
) -> Result<Vec<Option<String>>> {
    let sql = format!(
        "SELECT {} FROM {}{}{}",
        column,
        D::COLLECTION,
        query.where_clause(),
        query.tail()
    );
    let mut stmt = conn.prepare(&sql)?;
    let values = stmt
        .query_map(params_from_iter(query.params.iter()), |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;
    Ok(values)
}

/// Number of documents matching `query`.
pub fn count<D: Document>(conn: &Connection, query: &Query) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}{}", D::COLLECTION, query.where_clause());
    let n: i64 = conn.query_row(&sql, params_from_iter(query.params.iter()), |row| row.get(0))?;
    Ok(n as usize)
}

/// Delete all documents matching `query`. Returns the number removed.
pub fn delete_where<D: Document>(conn: &Connection, query: &Query) -> Result<usize> {
    let sql = format!("DELETE FROM {}{}", D::COLLECTION, query.where_clause());
    Ok(conn.execute(&sql, params_from_iter(query.params.iter()))?)
}

impl Document for User {
    const COLLECTION: &'static str = "users";
    const LABEL: &'static str = "User";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn columns(&self) -> Vec<(&'static str, Option<String>)> {
        vec![("username", Some(self.username.clone()))]
    }
}

impl Document for Project {
    const COLLECTION: &'static str = "projects";
    const LABEL: &'static str = "Project";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn columns(&self) -> Vec<(&'static str, Option<String>)> {
        vec![("created_by", Some(self.created_by.clone()))]
    }
}

impl Document for TestCase {
    const COLLECTION: &'static str = "test_cases";
    const LABEL: &'static str = "Test case";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn columns(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("project_id", Some(self.project_id.clone())),
            ("friendly_id", Some(self.friendly_id.clone())),
        ]
    }
}

impl Document for Bug {
    const COLLECTION: &'static str = "bugs";
    const LABEL: &'static str = "Bug";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn columns(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("project_id", Some(self.project_id.clone())),
            ("friendly_id", Some(self.friendly_id.clone())),
        ]
    }
}

impl Document for Task {
    const COLLECTION: &'static str = "tasks";
    const LABEL: &'static str = "Task";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn columns(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("project_id", Some(self.project_id.clone())),
            ("friendly_id", Some(self.friendly_id.clone())),
            ("parent_id", self.parent_id.clone()),
        ]
    }
}

impl Document for TestRun {
    const COLLECTION: &'static str = "test_runs";
    const LABEL: &'static str = "Test run";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.run_date_time
    }

    fn columns(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("project_id", Some(self.project_id.clone())),
            ("test_case_id", Some(self.test_case_id.clone())),
            ("run_id", Some(self.run_id.clone())),
        ]
    }
}

impl Document for Comment {
    const COLLECTION: &'static str = "comments";
    const LABEL: &'static str = "Comment";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn columns(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("bug_id", Some(self.bug_id.clone())),
            ("parent_id", self.parent_id.clone()),
        ]
    }
}

impl Document for Notification {
    const COLLECTION: &'static str = "notifications";
    const LABEL: &'static str = "Notification";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn columns(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("user_id", Some(self.user_id.clone())),
            ("bug_id", Some(self.bug_id.clone())),
        ]
    }
}

impl Document for Note {
    const COLLECTION: &'static str = "notes";
    const LABEL: &'static str = "Note";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    fn tc(project: &str, title: &str) -> TestCase {
        TestCase::new(project.to_string(), title.to_string(), "u1".to_string())
    }

    #[test]
    fn test_insert_and_load() {
        let mut storage = Storage::open_memory().unwrap();
        let case = tc("p1", "Login");
        storage.write(|tx| insert(tx, &case)).unwrap();

        let loaded: TestCase = storage.read(|conn| load(conn, &case.id)).unwrap();
        assert_eq!(loaded.title, "Login");
        assert_eq!(loaded.project_id, "p1");
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let storage = Storage::open_memory().unwrap();
        let err = storage
            .read(|conn| load::<Bug>(conn, "nope"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(ref msg) if msg == "Bug not found"));
    }

    #[test]
    fn test_replace_updates_columns() {
        let mut storage = Storage::open_memory().unwrap();
        let mut case = tc("p1", "Login");
        storage.write(|tx| insert(tx, &case)).unwrap();

        case.project_id = "p2".to_string();
        storage.write(|tx| replace(tx, &case)).unwrap();

        let in_p2: Vec<TestCase> = storage
            .read(|conn| find(conn, &Query::new().eq("project_id", "p2")))
            .unwrap();
        assert_eq!(in_p2.len(), 1);
    }

    #[test]
    fn test_replace_missing_fails() {
        let mut storage = Storage::open_memory().unwrap();
        let case = tc("p1", "Ghost");
        let err = storage.write(|tx| replace(tx, &case)).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_find_orders_by_creation() {
        let mut storage = Storage::open_memory().unwrap();
        let first = tc("p1", "first");
        let second = tc("p1", "second");
        storage
            .write(|tx| {
                insert(tx, &first)?;
                insert(tx, &second)
            })
            .unwrap();

        let oldest: Vec<TestCase> = storage.read(|conn| find(conn, &Query::new())).unwrap();
        assert_eq!(oldest[0].title, "first");

        let newest: Option<TestCase> = storage
            .read(|conn| find_one(conn, &Query::new().newest_first()))
            .unwrap();
        assert_eq!(newest.unwrap().title, "second");
    }

    #[test]
    fn test_query_filters() {
        let mut storage = Storage::open_memory().unwrap();
        let a = tc("p1", "a");
        let b = tc("p2", "b");
        storage
            .write(|tx| {
                insert(tx, &a)?;
                insert(tx, &b)
            })
            .unwrap();

        let none: Vec<TestCase> = storage
            .read(|conn| find(conn, &Query::new().any_of("id", &[])))
            .unwrap();
        assert!(none.is_empty());

        let both = storage
            .read(|conn| {
                count::<TestCase>(conn, &Query::new().any_of("id", &[a.id.clone(), b.id.clone()]))
            })
            .unwrap();
        assert_eq!(both, 2);

        let by_body = storage
            .read(|conn| count::<TestCase>(conn, &Query::new().contains("body", &b.id)))
            .unwrap();
        assert_eq!(by_body, 1);

        let removed = storage
            .write(|tx| delete_where::<TestCase>(tx, &Query::new().eq("project_id", "p1")))
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_usernames_unique() {
        let mut storage = Storage::open_memory().unwrap();
        let a = User::new("A".into(), "ann".into(), "h".into(), crate::models::Role::Qa);
        let b = User::new("B".into(), "ann".into(), "h".into(), crate::models::Role::Dev);
        storage.write(|tx| insert(tx, &a)).unwrap();
        assert!(matches!(
            storage.write(|tx| insert(tx, &b)),
            Err(Error::Database(_))
        ));
    }
}
