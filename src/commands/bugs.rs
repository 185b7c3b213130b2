//! Bug commands.

use super::notifications::{
    self, bug_created_message, drafts, members_except, status_changed_message,
};
use super::{authorize, display_name, project_role, require};
use crate::auth::Identity;
use crate::models::items::dedup_ids;
use crate::models::{
    Action, Attachment, Bug, BugPatch, BugStatus, Comment, ItemKind, Notification,
    NotificationType, Role, Severity,
};
use crate::storage::{
    Query, Storage, delete_where, find, insert, link_all, load, next_friendly_id, prune_missing,
    remove, replace, sync_links, unlink_all,
};
use crate::{Error, Result};
use serde::Deserialize;
use tracing::info;

const PREFIX: &str = "BUG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewBug {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub steps_to_reproduce: String,
    pub test_data: String,
    pub expected_result: String,
    pub actual_result: String,
    pub severity: Severity,
    pub status: BugStatus,
    pub tags: Vec<String>,
    pub linked_test_case_ids: Vec<String>,
    pub linked_task_ids: Vec<String>,
    pub attachments: Vec<Attachment>,
}

pub fn list_bugs(storage: &Storage, identity: &Identity, project_id: &str) -> Result<Vec<Bug>> {
    storage.read(|conn| {
        authorize(conn, identity, project_id, ItemKind::Bug, Action::View)?;
        find(conn, &Query::new().eq("project_id", project_id).newest_first())
    })
}

/// Report a bug. Every other project member is notified.
pub fn create_bug(storage: &mut Storage, identity: &Identity, input: NewBug) -> Result<Bug> {
    require(&input.project_id, "projectId")?;

    let mut bug = Bug::new(
        input.project_id,
        input.title.trim().to_string(),
        identity.user_id.clone(),
    );
    bug.description = input.description;
    bug.steps_to_reproduce = input.steps_to_reproduce;
    bug.test_data = input.test_data;
    bug.expected_result = input.expected_result;
    bug.actual_result = input.actual_result;
    bug.severity = input.severity;
    bug.status = input.status;
    bug.tags = input.tags;
    bug.linked_test_case_ids = dedup_ids(input.linked_test_case_ids);
    bug.linked_task_ids = dedup_ids(input.linked_task_ids);
    bug.attachments = input.attachments;
    bug.validate()?;

    let outbox = storage.write(|tx| {
        let project = authorize(tx, identity, &bug.project_id, ItemKind::Bug, Action::Create)?;
        bug.friendly_id = next_friendly_id::<Bug>(tx, PREFIX)?;
        prune_missing(tx, &mut bug)?;
        insert(tx, &bug)?;
        link_all(tx, &bug)?;

        let actor = display_name(tx, &identity.user_id)?;
        Ok(drafts(
            members_except(&project, &identity.user_id),
            NotificationType::BugCreated,
            &bug,
            &bug_created_message(&actor, &bug),
        ))
    })?;

    info!(id = %bug.id, friendly_id = %bug.friendly_id, "Created bug");
    notifications::deliver(storage, outbox);
    Ok(bug)
}

/// Apply a partial update. A status change notifies every project member.
pub fn update_bug(
    storage: &mut Storage,
    identity: &Identity,
    id: &str,
    patch: BugPatch,
) -> Result<Bug> {
    let (bug, outbox) = storage.write(|tx| {
        let before: Bug = load(tx, id)?;
        let project = authorize(tx, identity, &before.project_id, ItemKind::Bug, Action::Edit)?;

        if project.permissions.dev_can_only_edit_bug_status
            && project_role(&project, identity) == Role::Dev
            && !patch.is_status_only()
        {
            return Err(Error::Forbidden(
                "Developers may only change the status of bugs in this project".to_string(),
            ));
        }

        let mut after = before.clone();
        patch.apply(&mut after);
        after.validate()?;
        prune_missing(tx, &mut after)?;

        replace(tx, &after)?;
        sync_links(tx, Some(&before), &after)?;

        let outbox = if after.status != before.status {
            let actor = display_name(tx, &identity.user_id)?;
            let recipients = project.members.iter().map(|m| m.user_id.as_str());
            drafts(
                recipients,
                NotificationType::BugStatusChanged,
                &after,
                &status_changed_message(&actor, &after, before.status),
            )
        } else {
            Vec::new()
        };
        Ok((after, outbox))
    })?;

    notifications::deliver(storage, outbox);
    Ok(bug)
}

/// Delete a bug, its comments and every reference to it.
pub fn delete_bug(storage: &mut Storage, identity: &Identity, id: &str) -> Result<()> {
    storage.write(|tx| {
        let bug: Bug = load(tx, id)?;
        authorize(tx, identity, &bug.project_id, ItemKind::Bug, Action::Edit)?;
        remove::<Bug>(tx, id)?;
        let unlinked = unlink_all(tx, ItemKind::Bug, id)?;
        let comments = delete_where::<Comment>(tx, &Query::new().eq("bug_id", id))?;
        let notifications = delete_where::<Notification>(tx, &Query::new().eq("bug_id", id))?;
        info!(
            id = %id,
            friendly_id = %bug.friendly_id,
            unlinked,
            comments,
            notifications,
            "Deleted bug"
        );
        Ok(())
    })
}
