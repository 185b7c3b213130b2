//! Configuration for the qadeck server.
//!
//! ## config.kdl
//!
//! Located in the data directory (`<platform data dir>/qadeck/config.kdl` by
//! default). Contains:
//! - `host`, `port` - Listen address
//! - `upload-dir` - Where attachments are stored
//! - `token-secret`, `token-ttl-hours` - Session token signing
//! - `demo-tokens` - Accept the fixed demo tokens
//! - `max-upload-mb` - Upload size limit
//!
//! ## Precedence
//!
//! CLI flag > `QADECK_*` env var > config.kdl > defaults
//!
//! Use the [`resolver`] module for unified precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, Resolved, ResolvedConfig, ValueSource, default_data_dir, resolve_config,
    resolve_config_with_env,
};
pub use schema::{CONFIG_FILE, ServerConfig};
