//! Attachment storage.

use crate::models::Attachment;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// URL prefix under which stored objects are served.
pub const UPLOAD_URL_PREFIX: &str = "/uploads";

/// MIME types accepted by the upload endpoint.
const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/json",
    "application/zip",
    "application/x-zip-compressed",
    "application/msword",
    "application/vnd.ms-excel",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
    "text/csv",
];

pub fn is_allowed_mime(mime: &str) -> bool {
    let mime = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    mime.starts_with("image/")
        || mime.starts_with("video/")
        || ALLOWED_MIME_TYPES.contains(&mime.as_str())
}

/// Check an incoming file against the allow-list and size limit.
pub fn check_upload(mime: &str, size: usize, max_bytes: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::Validation("File is empty".to_string()));
    }
    if size > max_bytes {
        return Err(Error::Validation(format!(
            "File exceeds the {} MB limit",
            max_bytes / (1024 * 1024)
        )));
    }
    if !is_allowed_mime(mime) {
        return Err(Error::Validation(format!("File type {} is not allowed", mime)));
    }
    Ok(())
}

/// Where attachment bytes live.
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` and describe the stored object.
    fn put(&self, name: &str, mime_type: &str, bytes: &[u8]) -> Result<Attachment>;

    /// Remove the object behind `url`.
    fn delete(&self, url: &str) -> Result<()>;
}

/// Objects as files in one directory, served statically.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a public URL to a file inside the store.
    fn path_for(&self, url: &str) -> Result<PathBuf> {
        let not_found = || Error::NotFound("File not found".to_string());
        let key = url
            .rsplit_once(&format!("{}/", UPLOAD_URL_PREFIX))
            .map(|(_, key)| key)
            .ok_or_else(not_found)?;
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.starts_with('.') {
            return Err(not_found());
        }
        Ok(self.root.join(key))
    }
}

/// Keep the original name readable but safe as a single path segment.
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, name: &str, mime_type: &str, bytes: &[u8]) -> Result<Attachment> {
        let key = format!("{}-{}", uuid::Uuid::new_v4(), sanitize_name(name));
        fs::write(self.root.join(&key), bytes)?;
        info!(key = %key, size = bytes.len(), "Stored upload");

        Ok(Attachment {
            url: format!("{}/{}", UPLOAD_URL_PREFIX, key),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size: bytes.len() as u64,
        })
    }

    fn delete(&self, url: &str) -> Result<()> {
        let path = self.path_for(url)?;
        if !path.is_file() {
            return Err(Error::NotFound("File not found".to_string()));
        }
        fs::remove_file(&path)?;
        info!(path = %path.display(), "Deleted upload");
        Ok(())
    }
}
