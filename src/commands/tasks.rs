//! Task board commands.

use super::{authorize, require};
use crate::auth::Identity;
use crate::models::items::dedup_task_links;
use crate::models::{Action, Attachment, ItemKind, Priority, Task, TaskLink, TaskPatch, TaskStatus};
use crate::storage::{
    Query, Storage, fetch, find, insert, link_all, load, next_friendly_id, pluck, prune_missing,
    remove, replace, sync_links, unlink_all,
};
use crate::{Error, Result};
use rusqlite::Connection;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::info;

const PREFIX: &str = "TASK";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTask {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub additional_info: String,
    pub attachments: Vec<Attachment>,
    pub parent_id: Option<String>,
    pub links: Vec<TaskLink>,

    /// Board position; appended after the last task when absent
    pub order: Option<i64>,

    pub assigned_to: Option<String>,
    pub reporter: Option<String>,
}

/// Tasks of a project in board order.
pub fn list_tasks(storage: &Storage, identity: &Identity, project_id: &str) -> Result<Vec<Task>> {
    storage.read(|conn| {
        authorize(conn, identity, project_id, ItemKind::Task, Action::View)?;
        let mut tasks: Vec<Task> = find(conn, &Query::new().eq("project_id", project_id))?;
        // stable, so equal positions keep creation order
        tasks.sort_by_key(|task| task.order);
        Ok(tasks)
    })
}

/// Check that `task.parent_id` names a task in the same project and that
/// following parents from it never comes back to `task`.
fn check_parent(conn: &Connection, task: &Task) -> Result<()> {
    let Some(parent_id) = task.parent_id.as_deref() else {
        return Ok(());
    };

    let mut seen = HashSet::from([task.id.clone()]);
    let mut cursor = Some(parent_id.to_string());
    while let Some(id) = cursor {
        if !seen.insert(id.clone()) {
            return Err(Error::Validation(
                "Parent task would create a cycle".to_string(),
            ));
        }
        let parent: Task = fetch(conn, &id)?
            .ok_or_else(|| Error::Validation("Parent task not found".to_string()))?;
        if parent.project_id != task.project_id {
            return Err(Error::Validation(
                "Parent task belongs to another project".to_string(),
            ));
        }
        cursor = parent.parent_id;
    }
    Ok(())
}

fn next_order(conn: &Connection, project_id: &str) -> Result<i64> {
    let tasks: Vec<Task> = find(conn, &Query::new().eq("project_id", project_id))?;
    Ok(tasks.iter().map(|t| t.order).max().map_or(0, |max| max + 1))
}

pub fn create_task(storage: &mut Storage, identity: &Identity, input: NewTask) -> Result<Task> {
    require(&input.project_id, "projectId")?;

    let mut task = Task::new(
        input.project_id,
        input.title.trim().to_string(),
        identity.user_id.clone(),
    );
    task.description = input.description;
    task.status = input.status;
    task.priority = input.priority;
    task.tags = input.tags;
    task.additional_info = input.additional_info;
    task.attachments = input.attachments;
    task.parent_id = input.parent_id.filter(|id| !id.is_empty());
    task.links = dedup_task_links(input.links);
    task.assigned_to = input.assigned_to;
    task.reporter = input.reporter.or_else(|| Some(identity.user_id.clone()));
    task.validate()?;

    storage.write(|tx| {
        authorize(tx, identity, &task.project_id, ItemKind::Task, Action::Create)?;
        check_parent(tx, &task)?;
        task.order = match input.order {
            Some(order) => order,
            None => next_order(tx, &task.project_id)?,
        };
        task.friendly_id = next_friendly_id::<Task>(tx, PREFIX)?;
        prune_missing(tx, &mut task)?;
        insert(tx, &task)?;
        link_all(tx, &task)?;
        Ok(())
    })?;

    info!(id = %task.id, friendly_id = %task.friendly_id, "Created task");
    Ok(task)
}

pub fn update_task(
    storage: &mut Storage,
    identity: &Identity,
    id: &str,
    patch: TaskPatch,
) -> Result<Task> {
    storage.write(|tx| {
        let before: Task = load(tx, id)?;
        authorize(tx, identity, &before.project_id, ItemKind::Task, Action::Edit)?;

        let mut after = before.clone();
        patch.apply(&mut after);
        after.validate()?;
        if after.parent_id != before.parent_id {
            check_parent(tx, &after)?;
        }
        prune_missing(tx, &mut after)?;

        replace(tx, &after)?;
        sync_links(tx, Some(&before), &after)?;
        Ok(after)
    })
}

/// Delete a task. Its subtasks become top-level tasks.
pub fn delete_task(storage: &mut Storage, identity: &Identity, id: &str) -> Result<()> {
    storage.write(|tx| {
        let task: Task = load(tx, id)?;
        authorize(tx, identity, &task.project_id, ItemKind::Task, Action::Edit)?;
        remove::<Task>(tx, id)?;
        let unlinked = unlink_all(tx, ItemKind::Task, id)?;

        let children = pluck::<Task>(tx, "id", &Query::new().eq("parent_id", id))?;
        for child_id in children.into_iter().flatten() {
            let mut child: Task = load(tx, &child_id)?;
            child.parent_id = None;
            replace(tx, &child)?;
        }

        info!(id = %id, friendly_id = %task.friendly_id, unlinked, "Deleted task");
        Ok(())
    })
}
