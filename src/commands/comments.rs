//! Bug comments and their notification fan-out.

use super::notifications::{self, comment_message, drafts, members_except, reply_message};
use super::{authorize, display_name, require};
use crate::auth::Identity;
use crate::models::{Action, Bug, Comment, ItemKind, NotificationType};
use crate::storage::{Query, Storage, find, insert, load, replace};
use crate::{Error, Result};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub bug_id: String,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Comments on a bug, oldest first.
pub fn list_comments(storage: &Storage, identity: &Identity, bug_id: &str) -> Result<Vec<Comment>> {
    storage.read(|conn| {
        let bug: Bug = load(conn, bug_id)?;
        authorize(conn, identity, &bug.project_id, ItemKind::Bug, Action::View)?;
        find(conn, &Query::new().eq("bug_id", bug_id))
    })
}

/// Post a comment or a reply.
///
/// A top-level comment notifies every project member but the author; a reply
/// notifies the parent's author only.
pub fn add_comment(
    storage: &mut Storage,
    identity: &Identity,
    input: NewComment,
) -> Result<Comment> {
    require(&input.content, "Content")?;
    let parent_id = input.parent_id.filter(|id| !id.is_empty());

    let (comment, outbox) = storage.write(|tx| {
        let bug: Bug = load(tx, &input.bug_id)?;
        let project = authorize(tx, identity, &bug.project_id, ItemKind::Bug, Action::View)?;

        let parent = match &parent_id {
            Some(id) => {
                let parent: Comment = load(tx, id)?;
                if parent.bug_id != bug.id {
                    return Err(Error::Validation(
                        "Parent comment belongs to another bug".to_string(),
                    ));
                }
                if parent.parent_id.is_some() {
                    return Err(Error::Validation("Cannot reply to a reply".to_string()));
                }
                Some(parent)
            }
            None => None,
        };

        let author = display_name(tx, &identity.user_id)?;
        let comment = Comment::new(
            bug.id.clone(),
            identity.user_id.clone(),
            author.clone(),
            input.content.trim().to_string(),
            parent_id.clone(),
        );
        insert(tx, &comment)?;

        let outbox = match parent {
            None => drafts(
                members_except(&project, &identity.user_id),
                NotificationType::CommentAdded,
                &bug,
                &comment_message(&author, &bug),
            ),
            Some(parent) if parent.user_id != identity.user_id => drafts(
                [parent.user_id.as_str()],
                NotificationType::CommentAdded,
                &bug,
                &reply_message(&author, &bug),
            ),
            Some(_) => Vec::new(),
        };
        Ok((comment, outbox))
    })?;

    info!(
        id = %comment.id,
        bug = %comment.bug_id,
        reply = comment.parent_id.is_some(),
        "Added comment"
    );
    notifications::deliver(storage, outbox);
    Ok(comment)
}

/// Flip a comment's `resolved` flag.
pub fn toggle_resolved(storage: &mut Storage, identity: &Identity, id: &str) -> Result<Comment> {
    storage.write(|tx| {
        let mut comment: Comment = load(tx, id)?;
        let bug: Bug = load(tx, &comment.bug_id)?;
        authorize(tx, identity, &bug.project_id, ItemKind::Bug, Action::View)?;
        comment.resolved = !comment.resolved;
        replace(tx, &comment)?;
        Ok(comment)
    })
}
