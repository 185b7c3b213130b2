//! Notification delivery and inbox commands.

use crate::auth::Identity;
use crate::models::{Bug, BugStatus, Notification, NotificationType, Project};
use crate::storage::{Query, Storage, delete_where, fetch, find, insert, replace};
use crate::{Error, Result};
use tracing::{error, info};

/// Notifications about one bug event, one per recipient.
pub(crate) fn drafts<'a>(
    recipients: impl IntoIterator<Item = &'a str>,
    kind: NotificationType,
    bug: &Bug,
    message: &str,
) -> Vec<Notification> {
    recipients
        .into_iter()
        .map(|user_id| {
            Notification::new(
                user_id.to_string(),
                kind,
                bug.id.clone(),
                bug.title.clone(),
                message.to_string(),
            )
        })
        .collect()
}

/// Members of `project` other than `except`.
pub(crate) fn members_except<'a>(
    project: &'a Project,
    except: &'a str,
) -> impl Iterator<Item = &'a str> {
    project
        .members
        .iter()
        .map(|m| m.user_id.as_str())
        .filter(move |id| *id != except)
}

pub(crate) fn bug_created_message(actor: &str, bug: &Bug) -> String {
    format!("{} reported a new bug: {}", actor, bug.title)
}

pub(crate) fn status_changed_message(actor: &str, bug: &Bug, from: BugStatus) -> String {
    format!(
        "{} changed the status of \"{}\" from {} to {}",
        actor,
        bug.title,
        from.as_str(),
        bug.status.as_str()
    )
}

pub(crate) fn comment_message(actor: &str, bug: &Bug) -> String {
    format!("{} commented on \"{}\"", actor, bug.title)
}

pub(crate) fn reply_message(actor: &str, bug: &Bug) -> String {
    format!("{} replied to your comment on \"{}\"", actor, bug.title)
}

/// Store notifications after the triggering change committed.
///
/// Failures are logged and swallowed; the triggering change stays.
pub(crate) fn deliver(storage: &mut Storage, notifications: Vec<Notification>) {
    if notifications.is_empty() {
        return;
    }
    let count = notifications.len();
    let result = storage.write(|tx| {
        for notification in &notifications {
            insert(tx, notification)?;
        }
        Ok(())
    });
    match result {
        Ok(()) => info!(count, "Delivered notifications"),
        Err(e) => error!(error = %e, count, "Notification fan-out failed"),
    }
}

/// The caller's notifications, newest first.
pub fn list_notifications(storage: &Storage, identity: &Identity) -> Result<Vec<Notification>> {
    storage.read(|conn| {
        find(
            conn,
            &Query::new().eq("user_id", identity.user_id.as_str()).newest_first(),
        )
    })
}

pub fn mark_read(storage: &mut Storage, identity: &Identity, id: &str) -> Result<Notification> {
    storage.write(|tx| {
        let mut notification = fetch::<Notification>(tx, id)?
            .filter(|n| n.user_id == identity.user_id)
            .ok_or_else(|| Error::NotFound("Notification not found".to_string()))?;
        if !notification.read {
            notification.read = true;
            replace(tx, &notification)?;
        }
        Ok(notification)
    })
}

/// Delete all of the caller's notifications.
pub fn clear_notifications(storage: &mut Storage, identity: &Identity) -> Result<usize> {
    storage.write(|tx| {
        delete_where::<Notification>(tx, &Query::new().eq("user_id", identity.user_id.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::test_utils::memory_storage;

    fn bug() -> Bug {
        Bug::new("p".into(), "Crash on save".into(), "u".into())
    }

    #[test]
    fn test_deliver_and_inbox() {
        let mut storage = memory_storage();
        let bug = bug();
        let message = bug_created_message("Ann", &bug);
        deliver(
            &mut storage,
            drafts(["u1", "u2"], NotificationType::BugCreated, &bug, &message),
        );

        let u1 = Identity::new("u1".into(), Role::Qa);
        let inbox = list_notifications(&storage, &u1).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].bug_title, "Crash on save");
        assert_eq!(inbox[0].message, "Ann reported a new bug: Crash on save");

        let read = mark_read(&mut storage, &u1, &inbox[0].id).unwrap();
        assert!(read.read);

        let u2 = Identity::new("u2".into(), Role::Qa);
        assert!(matches!(
            mark_read(&mut storage, &u2, &inbox[0].id),
            Err(Error::NotFound(_))
        ));

        assert_eq!(clear_notifications(&mut storage, &u1).unwrap(), 1);
        assert!(list_notifications(&storage, &u1).unwrap().is_empty());
        assert_eq!(list_notifications(&storage, &u2).unwrap().len(), 1);
    }

    #[test]
    fn test_status_message_names_both_states() {
        let mut bug = bug();
        bug.status = BugStatus::Fixed;
        assert_eq!(
            status_changed_message("Bo", &bug, BugStatus::Opened),
            "Bo changed the status of \"Crash on save\" from Opened to Fixed"
        );
    }
}
