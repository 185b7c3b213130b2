//! Data models for qadeck entities.
//!
//! This module defines the core documents:
//! - `User` - Accounts with a global role
//! - `Project` - Projects with a team roster, permission flags and board settings
//! - `TestCase`, `Bug`, `Task` - Work items with friendly IDs and link sets
//! - `TestRun` - Append-only execution history of test cases
//! - `Comment`, `Notification` - Bug discussion and fan-out
//! - `Note` - Freestanding scratchpad entries

pub mod collab;
pub mod items;
pub mod patch;

pub use collab::{Comment, Note, NoteType, Notification, NotificationType};
pub use items::{
    Attachment, Bug, BugStatus, ItemKind, LinkTarget, Priority, RunStatus, Severity, Task,
    TaskLink, TaskStatus, TestCase, TestCaseStatus, TestRun, WorkItem,
};
pub use patch::{BugPatch, NotePatch, TaskPatch, TestCasePatch};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Generate a new document identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Account role. Project membership reuses the same two roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "QA")]
    Qa,
    #[serde(rename = "DEV")]
    Dev,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Qa => "QA",
            Role::Dev => "DEV",
        }
    }

    /// Maximum number of members with this role in one project.
    pub fn member_cap(&self) -> usize {
        match self {
            Role::Qa => 3,
            Role::Dev => 5,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,

    /// Display name
    pub name: String,

    /// Unique login name
    pub username: String,

    /// Hashed password, never returned by the API
    pub password_hash: String,

    pub role: Role,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, username: String, password_hash: String, role: Role) -> Self {
        Self {
            id: new_id(),
            name,
            username,
            password_hash,
            role,
            created_at: Utc::now(),
        }
    }

    /// Public view of the account, without credentials.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// The API-facing view of a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub username: String,
    pub role: Role,
}

/// A project roster entry.
///
/// `name`, `username` and `role` are a snapshot taken when the member was
/// added; they are not refreshed when the account changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub user_id: String,
    pub name: String,
    pub username: String,

    /// Hashed password captured when the member was created through the roster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    pub role: Role,
}

/// Per-action capability flags for one item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPermissions {
    pub view: bool,
    pub create: bool,
    pub edit: bool,
}

impl Default for ItemPermissions {
    fn default() -> Self {
        Self {
            view: true,
            create: true,
            edit: true,
        }
    }
}

/// Actions gated by [`Permissions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Create,
    Edit,
}

/// Flags gating what DEV members may do in a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Permissions {
    pub test_cases: ItemPermissions,
    pub bugs: ItemPermissions,
    pub tasks: ItemPermissions,
    pub dev_can_only_edit_bug_status: bool,
}

impl Permissions {
    /// Whether `role` may perform `action` on items of `kind`.
    pub fn allows(&self, role: Role, kind: ItemKind, action: Action) -> bool {
        if role == Role::Qa {
            return true;
        }
        let flags = match kind {
            ItemKind::TestCase => self.test_cases,
            ItemKind::Bug => self.bugs,
            ItemKind::Task => self.tasks,
        };
        match action {
            Action::View => flags.view,
            Action::Create => flags.create,
            Action::Edit => flags.edit,
        }
    }
}

/// A column on the task board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardColumn {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
}

/// Which task fields the board renders on cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisibleFields {
    pub priority: bool,
    pub assignee: bool,
    pub tags: bool,
    pub due_info: bool,
    pub links: bool,
}

impl Default for VisibleFields {
    fn default() -> Self {
        Self {
            priority: true,
            assignee: true,
            tags: true,
            due_info: false,
            links: true,
        }
    }
}

/// Task board layout for a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskBoardSettings {
    pub columns: Vec<BoardColumn>,
    pub visible_fields: VisibleFields,
}

impl Default for TaskBoardSettings {
    fn default() -> Self {
        let columns = [
            ("todo", TaskStatus::ToDo),
            ("in-progress", TaskStatus::InProgress),
            ("done", TaskStatus::Done),
        ]
        .into_iter()
        .map(|(id, status)| BoardColumn {
            id: id.to_string(),
            title: status.as_str().to_string(),
            status,
        })
        .collect();
        Self {
            columns,
            visible_fields: VisibleFields::default(),
        }
    }
}

/// A project and its team.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// User ID of the creator
    pub created_by: String,

    #[serde(default)]
    pub members: Vec<TeamMember>,

    #[serde(default)]
    pub permissions: Permissions,

    #[serde(default)]
    pub task_board_settings: TaskBoardSettings,

    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: String, description: String, created_by: String) -> Self {
        Self {
            id: new_id(),
            name,
            description,
            created_by,
            members: Vec::new(),
            permissions: Permissions::default(),
            task_board_settings: TaskBoardSettings::default(),
            created_at: Utc::now(),
        }
    }

    pub fn member(&self, user_id: &str) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.created_by == user_id || self.member(user_id).is_some()
    }

    pub fn count_role(&self, role: Role) -> usize {
        self.members.iter().filter(|m| m.role == role).count()
    }

    /// Copy suitable for API responses: stored member passwords are dropped.
    pub fn redacted(mut self) -> Self {
        for member in &mut self.members {
            member.password = None;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Qa).unwrap(), "\"QA\"");
        assert_eq!(serde_json::from_str::<Role>("\"DEV\"").unwrap(), Role::Dev);
        assert!(serde_json::from_str::<Role>("\"PM\"").is_err());
    }

    #[test]
    fn test_permissions_qa_unrestricted() {
        let mut perms = Permissions::default();
        perms.bugs.edit = false;
        assert!(perms.allows(Role::Qa, ItemKind::Bug, Action::Edit));
        assert!(!perms.allows(Role::Dev, ItemKind::Bug, Action::Edit));
        assert!(perms.allows(Role::Dev, ItemKind::Bug, Action::View));
    }

    #[test]
    fn test_default_board_has_column_per_status() {
        let board = TaskBoardSettings::default();
        let statuses: Vec<_> = board.columns.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::ToDo, TaskStatus::InProgress, TaskStatus::Done]
        );
    }

    #[test]
    fn test_redacted_drops_member_passwords() {
        let mut project = Project::new("P".into(), String::new(), "u1".into());
        project.members.push(TeamMember {
            user_id: "u1".into(),
            name: "Ann".into(),
            username: "ann".into(),
            password: Some("hash".into()),
            role: Role::Qa,
        });
        let json = serde_json::to_value(project.redacted()).unwrap();
        assert!(json["members"][0].get("password").is_none());
    }
}
