//! Storage layer for qadeck data.
//!
//! Every collection is a SQLite table holding the JSON document in `body` next
//! to a handful of indexed columns extracted from it (see [`Document`]). The
//! document is the source of truth; the columns only serve lookups and
//! ordering.
//!
//! ## Submodules
//!
//! - [`documents`] - Generic document CRUD and the [`Query`] builder
//! - [`allocator`] - Friendly-ID and run-ID sequences
//! - [`links`] - Reverse-link maintenance between work items
//! - [`repair`] - Offline repair of duplicate IDs and asymmetric links

pub mod allocator;
pub mod documents;
pub mod links;
pub mod repair;

pub use allocator::{FriendlyId, SequenceCounter, next_friendly_id, next_run_id};
pub use documents::{
    Document, Query, count, delete_where, fetch, find, find_one, insert, load, pluck, remove,
    replace,
};
pub use links::{link_all, prune_missing, sync_links, unlink_all};

use crate::{Error, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::fs;
use std::path::{Path, PathBuf};

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Database file name inside the data directory.
pub const DB_FILE: &str = "qadeck.db";

/// Storage manager for one data directory.
pub struct Storage {
    /// Data directory (absent for in-memory stores)
    pub root: Option<PathBuf>,
    conn: Connection,
}

impl Storage {
    /// Open or create the store in `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let conn = Connection::open(data_dir.join(DB_FILE))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        Self::init_schema(&conn)?;

        Ok(Self {
            root: Some(data_dir.to_path_buf()),
            conn,
        })
    }

    /// Open an in-memory store for testing.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { root: None, conn })
    }

    /// Check if a store exists in `data_dir`.
    pub fn exists(data_dir: &Path) -> bool {
        data_dir.join(DB_FILE).exists()
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                body TEXT NOT NULL,
                username TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                body TEXT NOT NULL,
                created_by TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS test_cases (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                body TEXT NOT NULL,
                project_id TEXT NOT NULL,
                friendly_id TEXT
            );

            CREATE TABLE IF NOT EXISTS bugs (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                body TEXT NOT NULL,
                project_id TEXT NOT NULL,
                friendly_id TEXT
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                body TEXT NOT NULL,
                project_id TEXT NOT NULL,
                friendly_id TEXT,
                parent_id TEXT
            );

            CREATE TABLE IF NOT EXISTS test_runs (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                body TEXT NOT NULL,
                project_id TEXT NOT NULL,
                test_case_id TEXT NOT NULL,
                run_id TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                body TEXT NOT NULL,
                bug_id TEXT NOT NULL,
                parent_id TEXT
            );

            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                body TEXT NOT NULL,
                user_id TEXT NOT NULL,
                bug_id TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                body TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_test_cases_project ON test_cases(project_id);
            CREATE INDEX IF NOT EXISTS idx_test_cases_friendly
                ON test_cases(friendly_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_bugs_project ON bugs(project_id);
            CREATE INDEX IF NOT EXISTS idx_bugs_friendly ON bugs(friendly_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_friendly ON tasks(friendly_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);

            CREATE INDEX IF NOT EXISTS idx_test_runs_case ON test_runs(test_case_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_test_runs_project ON test_runs(project_id, created_at);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_test_runs_run_id ON test_runs(project_id, run_id);

            CREATE INDEX IF NOT EXISTS idx_comments_bug ON comments(bug_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at);
            "#,
        )?;

        Self::run_migrations(conn)?;

        Ok(())
    }

    /// Bring an existing database up to [`SCHEMA_VERSION`].
    fn run_migrations(conn: &Connection) -> Result<()> {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version > SCHEMA_VERSION {
            return Err(Error::Other(format!(
                "Database schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            )));
        }

        if version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }

        Ok(())
    }

    /// Run `f` inside one immediate transaction, committing if it succeeds.
    ///
    /// The transaction is rolled back when `f` returns an error.
    pub fn write<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Run `f` inside a transaction that is always rolled back. Used for dry
    /// runs of mutating passes.
    pub fn rehearse<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.rollback()?;
        Ok(result)
    }

    /// Run read-only queries against the store.
    pub fn read<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        f(&self.conn)
    }
}
