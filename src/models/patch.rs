//! Partial updates for documents.
//!
//! A patch holds `Some` for every field the client sent. Nullable fields use a
//! double `Option` so that an explicit `null` clears the value while an absent
//! key leaves it untouched.

use super::items::{dedup_ids, dedup_task_links};
use super::{
    Attachment, Bug, BugStatus, Note, NoteType, Priority, Severity, Task, TaskLink, TaskStatus,
    TestCase, TestCaseStatus,
};
use serde::{Deserialize, Deserializer};

/// Deserialize a present field (including `null`) as `Some(..)`.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestCasePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub preconditions: Option<String>,
    pub steps: Option<String>,
    pub expected_result: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TestCaseStatus>,
    pub tags: Option<Vec<String>>,
    pub linked_bug_ids: Option<Vec<String>>,
    pub linked_task_ids: Option<Vec<String>>,
}

impl TestCasePatch {
    pub fn apply(self, tc: &mut TestCase) {
        if let Some(v) = self.title {
            tc.title = v;
        }
        if let Some(v) = self.description {
            tc.description = v;
        }
        if let Some(v) = self.preconditions {
            tc.preconditions = v;
        }
        if let Some(v) = self.steps {
            tc.steps = v;
        }
        if let Some(v) = self.expected_result {
            tc.expected_result = v;
        }
        if let Some(v) = self.priority {
            tc.priority = v;
        }
        if let Some(v) = self.status {
            tc.status = v;
        }
        if let Some(v) = self.tags {
            tc.tags = v;
        }
        if let Some(v) = self.linked_bug_ids {
            tc.linked_bug_ids = dedup_ids(v);
        }
        if let Some(v) = self.linked_task_ids {
            tc.linked_task_ids = dedup_ids(v);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BugPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub steps_to_reproduce: Option<String>,
    pub test_data: Option<String>,
    pub expected_result: Option<String>,
    pub actual_result: Option<String>,
    pub severity: Option<Severity>,
    pub status: Option<BugStatus>,
    pub tags: Option<Vec<String>>,
    pub linked_test_case_ids: Option<Vec<String>>,
    pub linked_task_ids: Option<Vec<String>>,
    pub attachments: Option<Vec<Attachment>>,
}

impl BugPatch {
    /// Whether the patch changes nothing but the status.
    pub fn is_status_only(&self) -> bool {
        let Self {
            title,
            description,
            steps_to_reproduce,
            test_data,
            expected_result,
            actual_result,
            severity,
            status: _,
            tags,
            linked_test_case_ids,
            linked_task_ids,
            attachments,
        } = self;
        title.is_none()
            && description.is_none()
            && steps_to_reproduce.is_none()
            && test_data.is_none()
            && expected_result.is_none()
            && actual_result.is_none()
            && severity.is_none()
            && tags.is_none()
            && linked_test_case_ids.is_none()
            && linked_task_ids.is_none()
            && attachments.is_none()
    }

    pub fn apply(self, bug: &mut Bug) {
        if let Some(v) = self.title {
            bug.title = v;
        }
        if let Some(v) = self.description {
            bug.description = v;
        }
        if let Some(v) = self.steps_to_reproduce {
            bug.steps_to_reproduce = v;
        }
        if let Some(v) = self.test_data {
            bug.test_data = v;
        }
        if let Some(v) = self.expected_result {
            bug.expected_result = v;
        }
        if let Some(v) = self.actual_result {
            bug.actual_result = v;
        }
        if let Some(v) = self.severity {
            bug.severity = v;
        }
        if let Some(v) = self.status {
            bug.status = v;
        }
        if let Some(v) = self.tags {
            bug.tags = v;
        }
        if let Some(v) = self.linked_test_case_ids {
            bug.linked_test_case_ids = dedup_ids(v);
        }
        if let Some(v) = self.linked_task_ids {
            bug.linked_task_ids = dedup_ids(v);
        }
        if let Some(v) = self.attachments {
            bug.attachments = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub additional_info: Option<String>,
    pub attachments: Option<Vec<Attachment>>,
    #[serde(deserialize_with = "double_option")]
    pub parent_id: Option<Option<String>>,
    pub links: Option<Vec<TaskLink>>,
    pub order: Option<i64>,
    #[serde(deserialize_with = "double_option")]
    pub assigned_to: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub reporter: Option<Option<String>>,
}

impl TaskPatch {
    pub fn apply(self, task: &mut Task) {
        if let Some(v) = self.title {
            task.title = v;
        }
        if let Some(v) = self.description {
            task.description = v;
        }
        if let Some(v) = self.status {
            task.status = v;
        }
        if let Some(v) = self.priority {
            task.priority = v;
        }
        if let Some(v) = self.tags {
            task.tags = v;
        }
        if let Some(v) = self.additional_info {
            task.additional_info = v;
        }
        if let Some(v) = self.attachments {
            task.attachments = v;
        }
        if let Some(v) = self.parent_id {
            task.parent_id = v.filter(|id| !id.is_empty());
        }
        if let Some(v) = self.links {
            task.links = dedup_task_links(v);
        }
        if let Some(v) = self.order {
            task.order = v;
        }
        if let Some(v) = self.assigned_to {
            task.assigned_to = v;
        }
        if let Some(v) = self.reporter {
            task.reporter = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotePatch {
    #[serde(rename = "type")]
    pub note_type: Option<NoteType>,
    #[serde(deserialize_with = "double_option")]
    pub label: Option<Option<String>>,
    pub content: Option<String>,
    pub pinned: Option<bool>,
    pub hidden: Option<bool>,
}

impl NotePatch {
    pub fn apply(self, note: &mut Note) {
        if let Some(v) = self.note_type {
            note.note_type = v;
        }
        if let Some(v) = self.label {
            note.label = v;
        }
        if let Some(v) = self.content {
            note.content = v;
        }
        if let Some(v) = self.pinned {
            note.pinned = v;
        }
        if let Some(v) = self.hidden {
            note.hidden = v;
        }
    }
}
