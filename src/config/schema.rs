//! KDL schema for config.kdl.
//!
//! This module provides:
//! - The [`ServerConfig`] struct mirroring the file
//! - Serialization/deserialization to/from KDL format
//! - Validation

use crate::{Error, Result};
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the config file inside the data directory.
pub const CONFIG_FILE: &str = "config.kdl";

/// Server settings stored in config.kdl. Every key is optional.
///
/// # KDL Schema
///
/// ```kdl
/// host "127.0.0.1"
/// port 5000
/// upload-dir "/var/lib/qadeck/uploads"
/// token-secret "change-me"
/// token-ttl-hours 168
/// demo-tokens #true
/// max-upload-mb 50
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub upload_dir: Option<PathBuf>,

    /// Secret for signing session tokens (sensitive!)
    pub token_secret: Option<String>,

    pub token_ttl_hours: Option<u64>,
    pub demo_tokens: Option<bool>,
    pub max_upload_mb: Option<u64>,
}

fn string_arg<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a str> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .and_then(|entry| entry.value().as_string())
}

fn integer_arg(doc: &KdlDocument, name: &str) -> Option<i128> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .and_then(|entry| entry.value().as_integer())
}

fn bool_arg(doc: &KdlDocument, name: &str) -> Option<bool> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .and_then(|entry| entry.value().as_bool())
}

fn push_node(doc: &mut KdlDocument, name: &str, value: KdlValue) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(value));
    doc.nodes_mut().push(node);
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.port == Some(0) {
            return Err("port must be 1-65535".to_string());
        }
        if let Some(secret) = &self.token_secret {
            if secret.len() < 8 {
                return Err("token-secret must be at least 8 characters".to_string());
            }
        }
        if self.token_ttl_hours == Some(0) {
            return Err("token-ttl-hours must be positive".to_string());
        }
        if self.max_upload_mb == Some(0) {
            return Err("max-upload-mb must be positive".to_string());
        }
        Ok(())
    }

    /// Parse config from a KDL document. Values of the wrong type are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        Self {
            host: string_arg(doc, "host").map(str::to_string),
            port: integer_arg(doc, "port").and_then(|i| u16::try_from(i).ok()),
            upload_dir: string_arg(doc, "upload-dir").map(PathBuf::from),
            token_secret: string_arg(doc, "token-secret").map(str::to_string),
            token_ttl_hours: integer_arg(doc, "token-ttl-hours")
                .and_then(|i| u64::try_from(i).ok()),
            demo_tokens: bool_arg(doc, "demo-tokens"),
            max_upload_mb: integer_arg(doc, "max-upload-mb").and_then(|i| u64::try_from(i).ok()),
        }
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(ref host) = self.host {
            push_node(&mut doc, "host", KdlValue::String(host.clone()));
        }
        if let Some(port) = self.port {
            push_node(&mut doc, "port", KdlValue::Integer(port as i128));
        }
        if let Some(ref dir) = self.upload_dir {
            push_node(&mut doc, "upload-dir", KdlValue::String(dir.display().to_string()));
        }
        if let Some(ref secret) = self.token_secret {
            push_node(&mut doc, "token-secret", KdlValue::String(secret.clone()));
        }
        if let Some(hours) = self.token_ttl_hours {
            push_node(&mut doc, "token-ttl-hours", KdlValue::Integer(hours as i128));
        }
        if let Some(demo) = self.demo_tokens {
            push_node(&mut doc, "demo-tokens", KdlValue::Bool(demo));
        }
        if let Some(mb) = self.max_upload_mb {
            push_node(&mut doc, "max-upload-mb", KdlValue::Integer(mb as i128));
        }

        doc
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &ServerConfig) {
        if other.host.is_some() {
            self.host = other.host.clone();
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.upload_dir.is_some() {
            self.upload_dir = other.upload_dir.clone();
        }
        if other.token_secret.is_some() {
            self.token_secret = other.token_secret.clone();
        }
        if other.token_ttl_hours.is_some() {
            self.token_ttl_hours = other.token_ttl_hours;
        }
        if other.demo_tokens.is_some() {
            self.demo_tokens = other.demo_tokens;
        }
        if other.max_upload_mb.is_some() {
            self.max_upload_mb = other.max_upload_mb;
        }
    }

    /// Load config.kdl from `data_dir`. A missing file yields an empty config.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let doc: KdlDocument = content
            .parse()
            .map_err(|e| {
                Error::Config(format!("Failed to parse KDL in {}: {}", path.display(), e))
            })?;

        let config = Self::from_kdl(&doc);
        config
            .validate()
            .map_err(|msg| Error::Config(format!("{}: {}", path.display(), msg)))?;
        Ok(config)
    }
}
