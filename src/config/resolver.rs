//! Precedence resolution for server configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`QADECK_*`)
//! 3. config.kdl in the data directory
//! 4. Built-in defaults

use super::schema::ServerConfig;
use crate::{Error, Result};
use serde_json::{Value, json};
use std::path::PathBuf;
use tracing::warn;

pub const HOST_ENV: &str = "QADECK_HOST";
pub const PORT_ENV: &str = "QADECK_PORT";
pub const TOKEN_SECRET_ENV: &str = "QADECK_TOKEN_SECRET";
pub const DATA_DIR_ENV: &str = "QADECK_DATA_DIR";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_TOKEN_TTL_HOURS: u64 = 24 * 7;
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 50;

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from environment variable
    EnvVar(String),
    /// Value from config.kdl
    ConfigFile,
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::ConfigFile => write!(f, "config"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_dir: Resolved<PathBuf>,
    pub host: Resolved<String>,
    pub port: Resolved<u16>,
    pub upload_dir: Resolved<PathBuf>,
    pub token_secret: Resolved<String>,
    pub token_ttl_hours: Resolved<u64>,
    pub demo_tokens: Resolved<bool>,
    pub max_upload_mb: Resolved<u64>,
}

impl ResolvedConfig {
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb.value as usize).saturating_mul(1024 * 1024)
    }

    /// The token secret with all but the first four characters hidden.
    pub fn masked_secret(&self) -> String {
        let secret = &self.token_secret.value;
        let shown: String = secret.chars().take(4).collect();
        format!("{}...", shown)
    }

    /// JSON view for `config show`, secret masked.
    pub fn to_json(&self) -> Value {
        fn entry(value: Value, source: &ValueSource) -> Value {
            json!({ "value": value, "source": source.to_string() })
        }

        json!({
            "dataDir": entry(json!(self.data_dir.value), &self.data_dir.source),
            "host": entry(json!(self.host.value), &self.host.source),
            "port": entry(json!(self.port.value), &self.port.source),
            "uploadDir": entry(json!(self.upload_dir.value), &self.upload_dir.source),
            "tokenSecret": entry(json!(self.masked_secret()), &self.token_secret.source),
            "tokenTtlHours": entry(json!(self.token_ttl_hours.value), &self.token_ttl_hours.source),
            "demoTokens": entry(json!(self.demo_tokens.value), &self.demo_tokens.source),
            "maxUploadMb": entry(json!(self.max_upload_mb.value), &self.max_upload_mb.source),
        })
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

/// Default data directory: `<platform data dir>/qadeck`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("qadeck")
}

/// Pick the first present value: CLI, then env, then file, then default.
fn pick<T>(
    cli: Option<T>,
    env: Option<(T, &str)>,
    file: Option<T>,
    default: impl FnOnce() -> T,
) -> Resolved<T> {
    if let Some(value) = cli {
        Resolved::new(value, ValueSource::CliFlag)
    } else if let Some((value, name)) = env {
        Resolved::new(value, ValueSource::EnvVar(name.to_string()))
    } else if let Some(value) = file {
        Resolved::new(value, ValueSource::ConfigFile)
    } else {
        Resolved::new(default(), ValueSource::Default)
    }
}

/// Resolve configuration from the process environment.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    resolve_config_with_env(overrides, |name| std::env::var(name).ok())
}

/// Resolve configuration with an explicit environment lookup.
pub fn resolve_config_with_env<F>(overrides: &ConfigOverrides, env: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let data_dir = pick(
        overrides.data_dir.clone(),
        env(DATA_DIR_ENV).map(|v| (PathBuf::from(v), DATA_DIR_ENV)),
        None,
        default_data_dir,
    );

    let file = ServerConfig::load(&data_dir.value)?;

    let env_port = match env(PORT_ENV) {
        Some(raw) => Some((
            raw.parse::<u16>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| {
                    Error::Config(format!("{} must be a port number, got {}", PORT_ENV, raw))
                })?,
            PORT_ENV,
        )),
        None => None,
    };

    let host = pick(
        overrides.host.clone(),
        env(HOST_ENV).map(|v| (v, HOST_ENV)),
        file.host.clone(),
        || DEFAULT_HOST.to_string(),
    );
    let port = pick(overrides.port, env_port, file.port, || DEFAULT_PORT);

    let uploads_default = data_dir.value.join("uploads");
    let upload_dir = pick(None, None, file.upload_dir.clone(), || uploads_default);

    let token_secret = pick(
        None,
        env(TOKEN_SECRET_ENV).map(|v| (v, TOKEN_SECRET_ENV)),
        file.token_secret.clone(),
        || uuid::Uuid::new_v4().simple().to_string(),
    );
    if token_secret.source == ValueSource::Default {
        warn!("No token secret configured; issued tokens will not survive a restart");
    }

    Ok(ResolvedConfig {
        data_dir,
        host,
        port,
        upload_dir,
        token_secret,
        token_ttl_hours: pick(None, None, file.token_ttl_hours, || DEFAULT_TOKEN_TTL_HOURS),
        demo_tokens: pick(None, None, file.demo_tokens, || true),
        max_upload_mb: pick(None, None, file.max_upload_mb, || DEFAULT_MAX_UPLOAD_MB),
    })
}
