//! Work items (test cases, bugs, tasks) and test-run history.
//!
//! Every work item carries link sets to the two other item kinds. The sets are
//! kept symmetric by the storage layer; the [`WorkItem`] trait gives it uniform
//! access to them.

use super::new_id;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The three linkable item kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    TestCase,
    Bug,
    Task,
}

impl ItemKind {
    /// Friendly-ID prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            ItemKind::TestCase => "TC",
            ItemKind::Bug => "BUG",
            ItemKind::Task => "TASK",
        }
    }

    /// The two kinds this kind can link to.
    pub fn peers(&self) -> [ItemKind; 2] {
        match self {
            ItemKind::TestCase => [ItemKind::Bug, ItemKind::Task],
            ItemKind::Bug => [ItemKind::TestCase, ItemKind::Task],
            ItemKind::Task => [ItemKind::Bug, ItemKind::TestCase],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::TestCase => "Test case",
            ItemKind::Bug => "Bug",
            ItemKind::Task => "Task",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Uniform access to an item's link sets, keyed by peer kind.
pub trait WorkItem {
    const KIND: ItemKind;

    fn project_id(&self) -> &str;

    /// IDs of linked items of kind `peer`.
    fn links(&self, peer: ItemKind) -> Vec<String>;

    /// Add-to-set. Returns `true` if the set changed.
    fn add_link(&mut self, peer: ItemKind, id: &str) -> bool;

    /// Pull. Returns `true` if the set changed.
    fn remove_link(&mut self, peer: ItemKind, id: &str) -> bool;

    /// Drop every link, returning what was removed per peer kind.
    fn clear_links(&mut self) -> Vec<(ItemKind, Vec<String>)> {
        let mut removed = Vec::new();
        for peer in Self::KIND.peers() {
            let ids = self.links(peer);
            for id in &ids {
                self.remove_link(peer, id);
            }
            removed.push((peer, ids));
        }
        removed
    }
}

/// Deduplicate link IDs, keeping the first occurrence of each.
pub fn dedup_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

fn add_to_set(set: &mut Vec<String>, id: &str) -> bool {
    if set.iter().any(|existing| existing == id) {
        return false;
    }
    set.push(id.to_string());
    true
}

fn pull(set: &mut Vec<String>, id: &str) -> bool {
    let before = set.len();
    set.retain(|existing| existing != id);
    set.len() != before
}

fn require_text(value: &str, field: &str, kind: ItemKind) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} {} is required", kind, field)));
    }
    Ok(())
}

/// Shared priority scale for test cases and tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestCaseStatus {
    #[default]
    Draft,
    Todo,
    #[serde(rename = "In Progress")]
    InProgress,
    Pass,
    Fail,
}

impl TestCaseStatus {
    /// The run outcome this status records, if it is a terminal result.
    pub fn run_status(&self) -> Option<RunStatus> {
        match self {
            TestCaseStatus::Pass => Some(RunStatus::Pass),
            TestCaseStatus::Fail => Some(RunStatus::Fail),
            _ => None,
        }
    }
}

impl From<RunStatus> for TestCaseStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Pass => TestCaseStatus::Pass,
            RunStatus::Fail => TestCaseStatus::Fail,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BugStatus {
    #[default]
    Draft,
    Opened,
    Fixed,
    Closed,
}

impl BugStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BugStatus::Draft => "Draft",
            BugStatus::Opened => "Opened",
            BugStatus::Fixed => "Fixed",
            BugStatus::Closed => "Closed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }
}

/// Outcome of a single test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pass,
    Fail,
}

/// A file stored through the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

/// A test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    pub project_id: String,
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub preconditions: String,

    /// Required once the status leaves `Draft`
    #[serde(default)]
    pub steps: String,

    /// Required once the status leaves `Draft`
    #[serde(default)]
    pub expected_result: String,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub status: TestCaseStatus,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Display identifier, e.g. "TC-14"
    #[serde(default)]
    pub friendly_id: String,

    #[serde(default)]
    pub linked_bug_ids: Vec<String>,

    #[serde(default)]
    pub linked_task_ids: Vec<String>,

    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl TestCase {
    pub fn new(project_id: String, title: String, created_by: String) -> Self {
        Self {
            id: new_id(),
            project_id,
            title,
            description: String::new(),
            preconditions: String::new(),
            steps: String::new(),
            expected_result: String::new(),
            priority: Priority::default(),
            status: TestCaseStatus::default(),
            tags: Vec::new(),
            friendly_id: String::new(),
            linked_bug_ids: Vec::new(),
            linked_task_ids: Vec::new(),
            created_by,
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text(&self.title, "title", ItemKind::TestCase)?;
        if self.status != TestCaseStatus::Draft {
            require_text(&self.steps, "steps", ItemKind::TestCase)?;
            require_text(&self.expected_result, "expected result", ItemKind::TestCase)?;
        }
        Ok(())
    }
}

impl WorkItem for TestCase {
    const KIND: ItemKind = ItemKind::TestCase;

    fn project_id(&self) -> &str {
        &self.project_id
    }

    fn links(&self, peer: ItemKind) -> Vec<String> {
        match peer {
            ItemKind::Bug => self.linked_bug_ids.clone(),
            ItemKind::Task => self.linked_task_ids.clone(),
            ItemKind::TestCase => Vec::new(),
        }
    }

    fn add_link(&mut self, peer: ItemKind, id: &str) -> bool {
        match peer {
            ItemKind::Bug => add_to_set(&mut self.linked_bug_ids, id),
            ItemKind::Task => add_to_set(&mut self.linked_task_ids, id),
            ItemKind::TestCase => false,
        }
    }

    fn remove_link(&mut self, peer: ItemKind, id: &str) -> bool {
        match peer {
            ItemKind::Bug => pull(&mut self.linked_bug_ids, id),
            ItemKind::Task => pull(&mut self.linked_task_ids, id),
            ItemKind::TestCase => false,
        }
    }
}

/// A defect report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bug {
    pub id: String,
    pub project_id: String,
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Required once the status leaves `Draft`
    #[serde(default)]
    pub steps_to_reproduce: String,

    #[serde(default)]
    pub test_data: String,

    #[serde(default)]
    pub expected_result: String,

    #[serde(default)]
    pub actual_result: String,

    #[serde(default)]
    pub severity: Severity,

    #[serde(default)]
    pub status: BugStatus,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub linked_test_case_ids: Vec<String>,

    #[serde(default)]
    pub linked_task_ids: Vec<String>,

    #[serde(default)]
    pub attachments: Vec<Attachment>,

    #[serde(default)]
    pub friendly_id: String,

    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Bug {
    pub fn new(project_id: String, title: String, created_by: String) -> Self {
        Self {
            id: new_id(),
            project_id,
            title,
            description: String::new(),
            steps_to_reproduce: String::new(),
            test_data: String::new(),
            expected_result: String::new(),
            actual_result: String::new(),
            severity: Severity::default(),
            status: BugStatus::default(),
            tags: Vec::new(),
            linked_test_case_ids: Vec::new(),
            linked_task_ids: Vec::new(),
            attachments: Vec::new(),
            friendly_id: String::new(),
            created_by,
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text(&self.title, "title", ItemKind::Bug)?;
        if self.status != BugStatus::Draft {
            require_text(&self.steps_to_reproduce, "steps to reproduce", ItemKind::Bug)?;
        }
        Ok(())
    }
}

impl WorkItem for Bug {
    const KIND: ItemKind = ItemKind::Bug;

    fn project_id(&self) -> &str {
        &self.project_id
    }

    fn links(&self, peer: ItemKind) -> Vec<String> {
        match peer {
            ItemKind::TestCase => self.linked_test_case_ids.clone(),
            ItemKind::Task => self.linked_task_ids.clone(),
            ItemKind::Bug => Vec::new(),
        }
    }

    fn add_link(&mut self, peer: ItemKind, id: &str) -> bool {
        match peer {
            ItemKind::TestCase => add_to_set(&mut self.linked_test_case_ids, id),
            ItemKind::Task => add_to_set(&mut self.linked_task_ids, id),
            ItemKind::Bug => false,
        }
    }

    fn remove_link(&mut self, peer: ItemKind, id: &str) -> bool {
        match peer {
            ItemKind::TestCase => pull(&mut self.linked_test_case_ids, id),
            ItemKind::Task => pull(&mut self.linked_task_ids, id),
            ItemKind::Bug => false,
        }
    }
}

/// Target kind of a task link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkTarget {
    Bug,
    TestCase,
}

impl LinkTarget {
    pub fn kind(&self) -> ItemKind {
        match self {
            LinkTarget::Bug => ItemKind::Bug,
            LinkTarget::TestCase => ItemKind::TestCase,
        }
    }

    pub fn from_kind(kind: ItemKind) -> Option<Self> {
        match kind {
            ItemKind::Bug => Some(LinkTarget::Bug),
            ItemKind::TestCase => Some(LinkTarget::TestCase),
            ItemKind::Task => None,
        }
    }
}

/// One entry of a task's ordered link list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLink {
    pub target_type: LinkTarget,
    pub target_id: String,
}

/// Deduplicate task links by (type, id), keeping the first occurrence.
pub fn dedup_task_links(links: Vec<TaskLink>) -> Vec<TaskLink> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| !link.target_id.trim().is_empty())
        .filter(|link| seen.insert((link.target_type, link.target_id.clone())))
        .collect()
}

/// A unit of work on the task board.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub additional_info: String,

    #[serde(default)]
    pub attachments: Vec<Attachment>,

    /// Parent task for subtasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub links: Vec<TaskLink>,

    /// Position on the board
    #[serde(default)]
    pub order: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter: Option<String>,

    pub created_by: String,

    #[serde(default)]
    pub friendly_id: String,

    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(project_id: String, title: String, created_by: String) -> Self {
        Self {
            id: new_id(),
            project_id,
            title,
            description: String::new(),
            status: TaskStatus::default(),
            priority: Priority::default(),
            tags: Vec::new(),
            additional_info: String::new(),
            attachments: Vec::new(),
            parent_id: None,
            links: Vec::new(),
            order: 0,
            assigned_to: None,
            reporter: None,
            created_by,
            friendly_id: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text(&self.title, "title", ItemKind::Task)?;
        if self.parent_id.as_deref() == Some(self.id.as_str()) {
            return Err(Error::Validation("A task cannot be its own parent".to_string()));
        }
        Ok(())
    }
}

impl WorkItem for Task {
    const KIND: ItemKind = ItemKind::Task;

    fn project_id(&self) -> &str {
        &self.project_id
    }

    fn links(&self, peer: ItemKind) -> Vec<String> {
        let Some(target) = LinkTarget::from_kind(peer) else {
            return Vec::new();
        };
        self.links
            .iter()
            .filter(|link| link.target_type == target)
            .map(|link| link.target_id.clone())
            .collect()
    }

    fn add_link(&mut self, peer: ItemKind, id: &str) -> bool {
        let Some(target_type) = LinkTarget::from_kind(peer) else {
            return false;
        };
        if self
            .links
            .iter()
            .any(|link| link.target_type == target_type && link.target_id == id)
        {
            return false;
        }
        self.links.push(TaskLink {
            target_type,
            target_id: id.to_string(),
        });
        true
    }

    fn remove_link(&mut self, peer: ItemKind, id: &str) -> bool {
        let Some(target_type) = LinkTarget::from_kind(peer) else {
            return false;
        };
        let before = self.links.len();
        self.links
            .retain(|link| !(link.target_type == target_type && link.target_id == id));
        self.links.len() != before
    }
}

/// One recorded execution of a test case. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRun {
    pub id: String,

    /// Per-project sequential identifier, e.g. "RUN-007"
    pub run_id: String,

    pub test_case_id: String,
    pub project_id: String,
    pub status: RunStatus,

    /// User ID of whoever reported the result
    pub executed_by: String,

    pub run_date_time: DateTime<Utc>,
}

impl TestRun {
    pub fn new(
        run_id: String,
        test_case_id: String,
        project_id: String,
        status: RunStatus,
        executed_by: String,
    ) -> Self {
        Self {
            id: new_id(),
            run_id,
            test_case_id,
            project_id,
            status,
            executed_by,
            run_date_time: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_labels() {
        assert_eq!(
            serde_json::to_string(&TestCaseStatus::InProgress).unwrap(),
            "\"In Progress\""
        );
        assert_eq!(serde_json::to_string(&TaskStatus::ToDo).unwrap(), "\"To Do\"");
        assert!(serde_json::from_str::<BugStatus>("\"Reopened\"").is_err());
    }

    #[test]
    fn test_dedup_ids_keeps_first_occurrence() {
        let ids = vec!["a".into(), "b".into(), "a".into(), " ".into(), "c".into(), "b".into()];
        assert_eq!(dedup_ids(ids), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_draft_test_case_needs_only_title() {
        let tc = TestCase::new("p".into(), "Login works".into(), "u".into());
        assert!(tc.validate().is_ok());

        let mut ready = tc.clone();
        ready.status = TestCaseStatus::Todo;
        assert!(matches!(ready.validate(), Err(Error::Validation(_))));

        ready.steps = "1. open".into();
        ready.expected_result = "page loads".into();
        assert!(ready.validate().is_ok());
    }

    #[test]
    fn test_bug_requires_steps_outside_draft() {
        let mut bug = Bug::new("p".into(), "Crash".into(), "u".into());
        assert!(bug.validate().is_ok());
        bug.status = BugStatus::Opened;
        assert!(bug.validate().is_err());
        bug.steps_to_reproduce = "click".into();
        assert!(bug.validate().is_ok());
    }

    #[test]
    fn test_task_links_by_kind() {
        let mut task = Task::new("p".into(), "Fix".into(), "u".into());
        assert!(task.add_link(ItemKind::Bug, "b1"));
        assert!(!task.add_link(ItemKind::Bug, "b1"));
        assert!(task.add_link(ItemKind::TestCase, "t1"));
        assert!(!task.add_link(ItemKind::Task, "x"));

        assert_eq!(task.links(ItemKind::Bug), vec!["b1"]);
        assert_eq!(task.links(ItemKind::TestCase), vec!["t1"]);

        assert!(task.remove_link(ItemKind::Bug, "b1"));
        assert!(!task.remove_link(ItemKind::Bug, "b1"));
        assert_eq!(task.links.len(), 1);
    }

    #[test]
    fn test_clear_links_reports_removed() {
        let mut tc = TestCase::new("p".into(), "T".into(), "u".into());
        tc.add_link(ItemKind::Bug, "b1");
        tc.add_link(ItemKind::Task, "k1");
        let removed = tc.clear_links();
        assert_eq!(
            removed,
            vec![
                (ItemKind::Bug, vec!["b1".to_string()]),
                (ItemKind::Task, vec!["k1".to_string()])
            ]
        );
        assert!(tc.linked_bug_ids.is_empty());
        assert!(tc.linked_task_ids.is_empty());
    }

    #[test]
    fn test_dedup_task_links() {
        let link = |t, id: &str| TaskLink {
            target_type: t,
            target_id: id.to_string(),
        };
        let links = vec![
            link(LinkTarget::Bug, "1"),
            link(LinkTarget::TestCase, "1"),
            link(LinkTarget::Bug, "1"),
        ];
        assert_eq!(dedup_task_links(links).len(), 2);
    }
}
