use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::TaskboardError;

id_newtype!(
    /// Identifier of a locally owned task
    TaskId
);
id_newtype!(
    /// Identifier of a task shared across users
    SharedTaskId
);
id_newtype!(
    /// Identifier of an attempt (an execution workspace of a task)
    AttemptId
);
id_newtype!(
    /// Identifier of a project
    ProjectId
);
id_newtype!(
    /// Identifier of a user
    UserId
);

/// The fixed, ordered set of board statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    InReview,
    Done,
    Cancelled,
}

enum_display_fromstr!(
    TaskStatus,
    TaskboardError::InvalidStatus,
    {
        Todo => "todo",
        InProgress => "inprogress",
        InReview => "inreview",
        Done => "done",
        Cancelled => "cancelled",
    }
);

impl TaskStatus {
    /// All statuses in board order
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::InReview,
        TaskStatus::Done,
        TaskStatus::Cancelled,
    ];

    /// Position of this status in board order
    pub fn index(self) -> usize {
        match self {
            TaskStatus::Todo => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::InReview => 2,
            TaskStatus::Done => 3,
            TaskStatus::Cancelled => 4,
        }
    }

    /// Column heading used by the board renderers
    pub fn column_name(self) -> &'static str {
        match self {
            TaskStatus::Todo => "TO DO",
            TaskStatus::InProgress => "IN PROGRESS",
            TaskStatus::InReview => "IN REVIEW",
            TaskStatus::Done => "DONE",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }
}

pub const VALID_STATUSES: &[&str] = &["todo", "inprogress", "inreview", "done", "cancelled"];

/// A status as carried by the backing store.
///
/// Statuses are normalized (trimmed, lowercased). Values outside the fixed
/// set are kept verbatim in `Other` so they can get a column of their own
/// instead of being rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatusKey {
    Known(TaskStatus),
    Other(String),
}

impl StatusKey {
    pub fn parse(raw: &str) -> Self {
        match TaskStatus::from_str(raw) {
            Ok(status) => StatusKey::Known(status),
            Err(_) => StatusKey::Other(raw.trim().to_lowercase()),
        }
    }

    pub fn known(&self) -> Option<TaskStatus> {
        match self {
            StatusKey::Known(status) => Some(*status),
            StatusKey::Other(_) => None,
        }
    }
}

impl Default for StatusKey {
    fn default() -> Self {
        StatusKey::Known(TaskStatus::default())
    }
}

impl From<TaskStatus> for StatusKey {
    fn from(status: TaskStatus) -> Self {
        StatusKey::Known(status)
    }
}

impl From<String> for StatusKey {
    fn from(raw: String) -> Self {
        StatusKey::parse(&raw)
    }
}

impl From<StatusKey> for String {
    fn from(key: StatusKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKey::Known(status) => write!(f, "{status}"),
            StatusKey::Other(raw) => f.write_str(raw),
        }
    }
}

impl PartialEq<TaskStatus> for StatusKey {
    fn eq(&self, other: &TaskStatus) -> bool {
        self.known() == Some(*other)
    }
}

/// A locally owned task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: StatusKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_workspace_id: Option<AttemptId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_task_id: Option<SharedTaskId>,
    pub created_at: Timestamp,
}

/// A task visible across users, optionally assigned to one of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedTask {
    pub id: SharedTaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: StatusKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_user_id: Option<UserId>,
    pub created_at: Timestamp,
}

impl SharedTask {
    /// True when the task is assigned to someone other than `user`.
    ///
    /// Unassigned tasks are never "assigned elsewhere".
    pub fn is_assigned_elsewhere(&self, user: Option<&UserId>) -> bool {
        match &self.assignee_user_id {
            Some(assignee) => Some(assignee) != user,
            None => false,
        }
    }

    /// True only when the task has an assignee and it is `user`
    pub fn is_assigned_to(&self, user: Option<&UserId>) -> bool {
        matches!((&self.assignee_user_id, user), (Some(assignee), Some(user)) if assignee == user)
    }
}

/// An execution session associated with a local task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub task_id: TaskId,
    pub branch: String,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
}

/// Partial update of a task; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_workspace_id: Option<AttemptId>,
}

impl TaskUpdate {
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            task.status = StatusKey::Known(status);
        }
        if let Some(parent) = &self.parent_workspace_id {
            task.parent_workspace_id = Some(parent.clone());
        }
    }
}
