//! Project, roster, permission and board commands.

use super::auth::find_by_username;
use super::{member_project, project_role, require};
use crate::auth::{Identity, PasswordHasher};
use crate::models::{
    BoardColumn, Bug, Comment, Notification, Project, Role, TeamMember, Task, TestCase, TestRun,
    User, VisibleFields,
};
use crate::storage::{Query, Storage, delete_where, find, insert, load, pluck, remove, replace};
use crate::{Error, Result};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMember {
    #[serde(default)]
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ItemPermissionsPatch {
    pub view: Option<bool>,
    pub create: Option<bool>,
    pub edit: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionsPatch {
    pub test_cases: Option<ItemPermissionsPatch>,
    pub bugs: Option<ItemPermissionsPatch>,
    pub tasks: Option<ItemPermissionsPatch>,
    pub dev_can_only_edit_bug_status: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardSettingsUpdate {
    pub columns: Option<Vec<BoardColumn>>,
    pub visible_fields: Option<VisibleFields>,
}

/// Projects the caller created or belongs to, newest first.
pub fn list_projects(storage: &Storage, identity: &Identity) -> Result<Vec<Project>> {
    let projects: Vec<Project> = storage.read(|conn| find(conn, &Query::new().newest_first()))?;
    Ok(projects
        .into_iter()
        .filter(|p| p.is_visible_to(&identity.user_id))
        .map(Project::redacted)
        .collect())
}

/// Create a project with the caller as its first member.
pub fn create_project(
    storage: &mut Storage,
    identity: &Identity,
    input: NewProject,
) -> Result<Project> {
    require(&input.name, "Project name")?;

    let project = storage.write(|tx| {
        let user: User = load(tx, &identity.user_id)?;
        let mut project = Project::new(
            input.name.trim().to_string(),
            input.description.unwrap_or_default(),
            identity.user_id.clone(),
        );
        project.members.push(TeamMember {
            user_id: user.id,
            name: user.name,
            username: user.username,
            password: None,
            role: user.role,
        });
        insert(tx, &project)?;
        Ok(project)
    })?;

    info!(project = %project.id, name = %project.name, "Created project");
    Ok(project.redacted())
}

pub fn update_project(
    storage: &mut Storage,
    identity: &Identity,
    project_id: &str,
    update: ProjectUpdate,
) -> Result<Project> {
    storage.write(|tx| {
        let mut project = member_project(tx, identity, project_id)?;
        if let Some(name) = update.name {
            require(&name, "Project name")?;
            project.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            project.description = description;
        }
        replace(tx, &project)?;
        Ok(project.redacted())
    })
}

/// Delete a project and everything filed under it. Creator only.
pub fn delete_project(storage: &mut Storage, identity: &Identity, project_id: &str) -> Result<()> {
    storage.write(|tx| {
        let project: Project = load(tx, project_id)?;
        if project.created_by != identity.user_id {
            return Err(Error::Forbidden(
                "Only the project creator can delete it".to_string(),
            ));
        }

        let in_project = Query::new().eq("project_id", project_id);
        let bug_ids: Vec<String> = pluck::<Bug>(tx, "id", &in_project)?
            .into_iter()
            .flatten()
            .collect();
        let in_bugs = Query::new().any_of("bug_id", &bug_ids);
        let comments = delete_where::<Comment>(tx, &in_bugs)?;
        let notifications = delete_where::<Notification>(tx, &in_bugs)?;
        let test_cases = delete_where::<TestCase>(tx, &in_project)?;
        let bugs = delete_where::<Bug>(tx, &in_project)?;
        let tasks = delete_where::<Task>(tx, &in_project)?;
        let runs = delete_where::<TestRun>(tx, &in_project)?;
        remove::<Project>(tx, project_id)?;

        info!(
            project = %project_id,
            test_cases, bugs, tasks, runs, comments, notifications,
            "Deleted project"
        );
        Ok(())
    })
}

/// Add a member by username, creating the account if it does not exist.
pub fn add_member(
    storage: &mut Storage,
    identity: &Identity,
    project_id: &str,
    input: NewMember,
    hasher: &dyn PasswordHasher,
) -> Result<Project> {
    require(&input.username, "Username")?;

    storage.write(|tx| {
        let mut project = member_project(tx, identity, project_id)?;

        let (user, password) = match find_by_username(tx, &input.username)? {
            Some(user) => (user, None),
            None => {
                require(&input.name, "Name")?;
                let password = input.password.as_deref().unwrap_or("");
                require(password, "Password")?;
                let hash = hasher.hash(password)?;
                let user = User::new(
                    input.name.trim().to_string(),
                    input.username.trim().to_string(),
                    hash.clone(),
                    input.role.unwrap_or(Role::Qa),
                );
                insert(tx, &user)?;
                info!(user = %user.username, "Created account for new member");
                (user, Some(hash))
            }
        };

        if project.member(&user.id).is_some() {
            return Err(Error::Validation(format!(
                "{} is already a member of this project",
                user.username
            )));
        }

        let role = input.role.unwrap_or(user.role);
        if project.count_role(role) >= role.member_cap() {
            return Err(Error::Validation(format!(
                "A project can have at most {} {} members",
                role.member_cap(),
                role
            )));
        }

        project.members.push(TeamMember {
            user_id: user.id.clone(),
            name: user.name.clone(),
            username: user.username.clone(),
            password,
            role,
        });
        replace(tx, &project)?;

        info!(project = %project.id, user = %user.username, role = %role, "Added member");
        Ok(project.redacted())
    })
}

/// Remove a roster entry. The account itself is untouched.
pub fn remove_member(
    storage: &mut Storage,
    identity: &Identity,
    project_id: &str,
    member_id: &str,
) -> Result<Project> {
    storage.write(|tx| {
        let mut project = member_project(tx, identity, project_id)?;
        if member_id == project.created_by {
            return Err(Error::Validation(
                "The project creator cannot be removed".to_string(),
            ));
        }

        let before = project.members.len();
        project.members.retain(|m| m.user_id != member_id);
        if project.members.len() == before {
            return Err(Error::NotFound("Member not found".to_string()));
        }

        replace(tx, &project)?;
        info!(project = %project.id, user_id = %member_id, "Removed member");
        Ok(project.redacted())
    })
}

/// Change DEV permission flags. Only QA members may do this.
pub fn update_permissions(
    storage: &mut Storage,
    identity: &Identity,
    project_id: &str,
    patch: PermissionsPatch,
) -> Result<Project> {
    storage.write(|tx| {
        let mut project = member_project(tx, identity, project_id)?;
        if project_role(&project, identity) != Role::Qa {
            return Err(Error::Forbidden(
                "Only QA members can change permissions".to_string(),
            ));
        }

        let perms = &mut project.permissions;
        for (target, change) in [
            (&mut perms.test_cases, patch.test_cases),
            (&mut perms.bugs, patch.bugs),
            (&mut perms.tasks, patch.tasks),
        ] {
            let Some(change) = change else { continue };
            if let Some(v) = change.view {
                target.view = v;
            }
            if let Some(v) = change.create {
                target.create = v;
            }
            if let Some(v) = change.edit {
                target.edit = v;
            }
        }
        if let Some(v) = patch.dev_can_only_edit_bug_status {
            perms.dev_can_only_edit_bug_status = v;
        }

        replace(tx, &project)?;
        Ok(project.redacted())
    })
}

pub fn update_board_settings(
    storage: &mut Storage,
    identity: &Identity,
    project_id: &str,
    update: BoardSettingsUpdate,
) -> Result<Project> {
    storage.write(|tx| {
        let mut project = member_project(tx, identity, project_id)?;

        if let Some(columns) = update.columns {
            if columns.is_empty() {
                return Err(Error::Validation("The board needs at least one column".to_string()));
            }
            let mut ids = std::collections::HashSet::new();
            for column in &columns {
                require(&column.id, "Column id")?;
                if !ids.insert(column.id.as_str()) {
                    return Err(Error::Validation(format!("Duplicate column id {}", column.id)));
                }
            }
            project.task_board_settings.columns = columns;
        }
        if let Some(fields) = update.visible_fields {
            project.task_board_settings.visible_fields = fields;
        }

        replace(tx, &project)?;
        Ok(project.redacted())
    })
}
