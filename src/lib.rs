//! qadeck - A QA collaboration backend.
//!
//! This library provides the core functionality for the `qadeck` server,
//! including projects, test cases, bugs, tasks, test-run history, comments,
//! notifications and notes, exposed over a JSON API.

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod models;
pub mod server;
pub mod storage;
pub mod upload;


/// Library-level error type for qadeck operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for qadeck operations.
pub type Result<T> = std::result::Result<T, Error>;
