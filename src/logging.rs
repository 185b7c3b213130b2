//! Logging configuration and initialization.
//!
//! Uses tracing with environment-based filtering, writing to stderr as text or
//! JSON lines.

use std::io::IsTerminal;
use std::sync::Once;

use crate::{Error, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize logging for the CLI.
///
/// Logging honors `RUST_LOG` if set; otherwise the filter follows `verbosity`.
pub fn init_logging(verbosity: u8, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(verbosity)))
        .map_err(|e| Error::Config(format!("log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if json {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json();
        tracing::subscriber::set_global_default(registry.with(layer))
    } else {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_ansi(std::io::stderr().is_terminal());
        tracing::subscriber::set_global_default(registry.with(layer))
    };

    installed.map_err(|e| Error::Other(format!("Failed to install logger: {}", e)))
}

fn default_filter(verbosity: u8) -> String {
    match verbosity {
        0 => "qadeck=info,tower_http=warn".to_string(),
        1 => "qadeck=debug,tower_http=debug".to_string(),
        2 => "qadeck=debug,tower_http=debug,rusqlite=debug".to_string(),
        _ => "qadeck=trace,tower_http=trace".to_string(),
    }
}

/// Initialize logging for tests with the test writer.
pub fn init_test_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("qadeck=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}
