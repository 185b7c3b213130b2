//! Comments, notifications and notes.

use super::new_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment on a bug. Replies reference their parent comment (one level).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub bug_id: String,
    pub user_id: String,

    /// Author display name at the time of posting
    pub user_name: String,

    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub resolved: bool,

    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(
        bug_id: String,
        user_id: String,
        user_name: String,
        content: String,
        parent_id: Option<String>,
    ) -> Self {
        Self {
            id: new_id(),
            bug_id,
            user_id,
            user_name,
            content,
            parent_id,
            resolved: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    BugCreated,
    BugStatusChanged,
    CommentAdded,
}

/// A message for one recipient, produced as a side effect of bug activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,

    /// Recipient user ID
    pub user_id: String,

    #[serde(rename = "type")]
    pub notification_type: NotificationType,

    pub bug_id: String,

    /// Bug title at the time of the event
    pub bug_title: String,

    pub message: String,

    #[serde(default)]
    pub read: bool,

    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: String,
        notification_type: NotificationType,
        bug_id: String,
        bug_title: String,
        message: String,
    ) -> Self {
        Self {
            id: new_id(),
            user_id,
            notification_type,
            bug_id,
            bug_title,
            message,
            read: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    #[default]
    Simple,
    Kv,
}

/// A scratchpad entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,

    #[serde(rename = "type", default)]
    pub note_type: NoteType,

    /// Key for `kv` notes, optional heading for `simple` ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub pinned: bool,

    #[serde(default)]
    pub hidden: bool,

    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn new(note_type: NoteType, label: Option<String>, content: String) -> Self {
        Self {
            id: new_id(),
            note_type,
            label,
            content,
            pinned: false,
            hidden: false,
            created_at: Utc::now(),
        }
    }
}
