//! Command implementations behind the API and CLI.
//!
//! Each command takes the store and the caller's identity, runs its mutation
//! inside one transaction and returns the resulting documents. Commands are
//! organized by entity type:
//! - `auth` - Registration, login, profile
//! - `projects` - Projects, roster, permissions, board settings
//! - `test_cases`, `bugs`, `tasks` - Work items and their links
//! - `test_runs` - Run history
//! - `comments`, `notifications` - Bug discussion and fan-out
//! - `notes` - Scratchpad
//! - `maintenance` - Repair passes

pub mod auth;
pub mod bugs;
pub mod comments;
pub mod maintenance;
pub mod notes;
pub mod notifications;
pub mod projects;
pub mod tasks;
pub mod test_cases;
pub mod test_runs;

use crate::auth::Identity;
use crate::models::{Action, ItemKind, Project, Role, User};
use crate::storage::{fetch, load};
use crate::{Error, Result};
use rusqlite::Connection;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Load a project the caller belongs to.
pub(crate) fn member_project(
    conn: &Connection,
    identity: &Identity,
    project_id: &str,
) -> Result<Project> {
    let project: Project = load(conn, project_id)?;
    if !project.is_visible_to(&identity.user_id) {
        return Err(Error::Forbidden(
            "You are not a member of this project".to_string(),
        ));
    }
    Ok(project)
}

/// The caller's role inside `project`: the roster role when listed, the
/// account role otherwise.
pub(crate) fn project_role(project: &Project, identity: &Identity) -> Role {
    project
        .member(&identity.user_id)
        .map(|m| m.role)
        .unwrap_or(identity.role)
}

/// Load a project and check the caller may perform `action` on `kind` in it.
pub(crate) fn authorize(
    conn: &Connection,
    identity: &Identity,
    project_id: &str,
    kind: ItemKind,
    action: Action,
) -> Result<Project> {
    let project = member_project(conn, identity, project_id)?;
    let role = project_role(&project, identity);
    if !project.permissions.allows(role, kind, action) {
        let verb = match action {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
        };
        return Err(Error::Forbidden(format!(
            "Developers may not {} {} items in this project",
            verb,
            kind.label().to_lowercase()
        )));
    }
    Ok(project)
}

/// Display name of a user, falling back to the ID for unknown accounts.
pub(crate) fn display_name(conn: &Connection, user_id: &str) -> Result<String> {
    let user: Option<User> = fetch(conn, user_id)?;
    Ok(user.map(|u| u.name).unwrap_or_else(|| user_id.to_string()))
}

pub(crate) fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(())
}
