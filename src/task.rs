//! Task, status and related wire records.
//!
//! These are the closed record types exchanged with the API. Every record
//! coming off the wire goes through `validate` before it reaches the cache,
//! so the views can rely on non-empty ids and names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::fields::*;

/// A reference to a user, as embedded in tasks and comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A work item shown as a card on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub status_id: String,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Present on subtasks, which never render as board cards.
    #[serde(default)]
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub assignees: Vec<UserRef>,
    /// Hours logged against the task.
    #[serde(default)]
    pub actual_time: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Minimal task in the given status, mostly useful for tests and local drafts.
    pub fn new(id: &str, name: &str, status_id: &str) -> Self {
        Task {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            priority: Priority::default(),
            status_id: status_id.to_string(),
            deadline: None,
            parent_task_id: None,
            assignees: Vec::new(),
            actual_time: 0.0,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_subtask(&self) -> bool {
        self.parent_task_id.is_some()
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.id.trim().is_empty() {
            return Err(ApiError::invalid("task", "empty id"));
        }
        if self.name.trim().is_empty() {
            return Err(ApiError::invalid("task", format!("task {} has an empty name", self.id)));
        }
        if self.status_id.trim().is_empty() {
            return Err(ApiError::invalid("task", format!("task {} has no status", self.id)));
        }
        if !self.actual_time.is_finite() || self.actual_time < 0.0 {
            return Err(ApiError::invalid(
                "task",
                format!("task {} has invalid actual time {}", self.id, self.actual_time),
            ));
        }
        if self.parent_task_id.as_deref() == Some(self.id.as_str()) {
            return Err(ApiError::invalid("task", format!("task {} is its own parent", self.id)));
        }
        Ok(())
    }
}

/// A board column as stored by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub name: String,
    /// Ordering hint; absent means the order is undetermined.
    #[serde(default)]
    pub position: Option<i64>,
}

impl Status {
    pub fn new(id: &str, name: &str, position: Option<i64>) -> Self {
        Status {
            id: id.to_string(),
            name: name.to_string(),
            position,
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.id.trim().is_empty() {
            return Err(ApiError::invalid("status", "empty id"));
        }
        if self.name.trim().is_empty() {
            return Err(ApiError::invalid("status", format!("status {} has an empty name", self.id)));
        }
        Ok(())
    }
}

/// A comment left on a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub task_id: String,
    pub author: UserRef,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A project member and their permission level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
}

/// Partial update of a task. Unset fields are left out of the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<String>,
    /// `Some(None)` clears the deadline and is sent as `null`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_time: Option<f64>,
}

impl TaskPatch {
    pub fn deadline(deadline: Option<DateTime<Utc>>) -> Self {
        TaskPatch {
            deadline: Some(deadline),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }

    /// Layer a later patch on top of this one. Fields set in `newer` win.
    pub fn merge(&mut self, newer: TaskPatch) {
        let TaskPatch {
            name,
            description,
            priority,
            status_id,
            deadline,
            assignee_ids,
            actual_time,
        } = newer;
        self.name = name.or(self.name.take());
        self.description = description.or(self.description.take());
        self.priority = priority.or(self.priority);
        self.status_id = status_id.or(self.status_id.take());
        self.deadline = deadline.or(self.deadline);
        self.assignee_ids = assignee_ids.or(self.assignee_ids.take());
        self.actual_time = actual_time.or(self.actual_time);
    }

    /// Apply the set fields to a local copy of the task.
    /// Assignee ids cannot be resolved to names locally and are skipped.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(name) = &self.name {
            task.name = name.clone();
        }
        if let Some(desc) = &self.description {
            task.description = Some(desc.clone());
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(status_id) = &self.status_id {
            task.status_id = status_id.clone();
        }
        if let Some(deadline) = self.deadline {
            task.deadline = deadline;
        }
        if let Some(hours) = self.actual_time {
            task.actual_time = hours;
        }
    }
}

/// Body of a task creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: Priority,
    pub status_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignee_ids: Vec<String>,
}

/// Body of a status creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewStatus {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

/// Rename and/or reposition a status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}
