//! Data models for Deckhand entities.
//!
//! This module defines the core data structures:
//! - `TaskRecord` - Work items shared by every task kind, tagged with their
//!   owning kind and carrying an opaque per-kind extension payload
//! - `Subtask` - Generic child records attached to a (kind, id) parent
//! - `Milestone` - Dated checkpoints with a three-state lifecycle

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::registry::TaskKind;

/// Task status in the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    #[default]
    ToDo,
    InProgress,
    InReview,
    Done,
    Blocked,
}

impl TaskStatus {
    /// All statuses, in workflow order.
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Backlog,
        TaskStatus::ToDo,
        TaskStatus::InProgress,
        TaskStatus::InReview,
        TaskStatus::Done,
        TaskStatus::Blocked,
    ];

    /// Statuses that count as open for overdue detection.
    pub const OPEN: [TaskStatus; 4] = [
        TaskStatus::Backlog,
        TaskStatus::ToDo,
        TaskStatus::InProgress,
        TaskStatus::InReview,
    ];

    /// Canonical storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::ToDo => "to_do",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::InReview => "in_review",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        }
    }

    /// Human-readable display label.
    pub fn display(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "Backlog",
            TaskStatus::ToDo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::InReview => "In Review",
            TaskStatus::Done => "Done",
            TaskStatus::Blocked => "Blocked",
        }
    }

    /// Parse a status from its storage representation.
    ///
    /// Accepts the legacy `todo` spelling for `to_do`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "backlog" => Some(TaskStatus::Backlog),
            "to_do" | "todo" => Some(TaskStatus::ToDo),
            "in_progress" => Some(TaskStatus::InProgress),
            "in_review" => Some(TaskStatus::InReview),
            "done" => Some(TaskStatus::Done),
            "blocked" => Some(TaskStatus::Blocked),
            _ => None,
        }
    }

    /// Whether this status counts as open for overdue detection.
    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Task priority level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    /// All priorities, lowest first.
    pub const ALL: [TaskPriority; 4] = [
        TaskPriority::Low,
        TaskPriority::Medium,
        TaskPriority::High,
        TaskPriority::Critical,
    ];

    /// Canonical storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }

    /// Human-readable display label.
    pub fn display(&self) -> &'static str {
        match self {
            TaskPriority::Low => "Low",
            TaskPriority::Medium => "Medium",
            TaskPriority::High => "High",
            TaskPriority::Critical => "Critical",
        }
    }

    /// Parse a priority from its storage representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(TaskPriority::Low),
            "medium" => Some(TaskPriority::Medium),
            "high" => Some(TaskPriority::High),
            "critical" => Some(TaskPriority::Critical),
            _ => None,
        }
    }

    /// Sort weight: critical=3, high=2, medium=1, low=0.
    ///
    /// Unknown priorities read back from storage weigh 0.
    pub fn weight(&self) -> u8 {
        match self {
            TaskPriority::Critical => 3,
            TaskPriority::High => 2,
            TaskPriority::Medium => 1,
            TaskPriority::Low => 0,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A work item tracked by Deckhand.
///
/// Numeric ids are unique only within the owning kind's partition; the
/// `(kind, id)` pair is the only globally-unique identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Partition-local identifier
    pub id: i64,

    /// Owning task kind
    pub kind: TaskKind,

    /// Task title
    pub title: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Current status
    #[serde(default)]
    pub status: TaskStatus,

    /// Priority level
    #[serde(default)]
    pub priority: TaskPriority,

    /// Assigned user reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,

    /// Creating user reference
    #[serde(default)]
    pub created_by: String,

    /// Target completion date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    /// Estimated effort in hours
    #[serde(default)]
    pub estimated_hours: f64,

    /// Logged effort in hours
    #[serde(default)]
    pub actual_hours: f64,

    /// Free-text tags
    #[serde(default)]
    pub tags: String,

    /// Whether this task carries subtasks
    #[serde(default)]
    pub has_subtasks: bool,

    /// Opaque per-kind extension payload (e.g. machine_id/location for
    /// arcade tasks, course_id/target_audience for education tasks)
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub extension: serde_json::Value,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Whether the task is past due and still open.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match self.due_date {
            Some(due) => due < today && self.status.is_open(),
            None => false,
        }
    }
}

/// Fields accepted when creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    /// Task title
    pub title: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Initial status
    #[serde(default)]
    pub status: TaskStatus,

    /// Priority level
    #[serde(default)]
    pub priority: TaskPriority,

    /// Assigned user reference
    #[serde(default)]
    pub assigned_to: Option<String>,

    /// Creating user reference
    #[serde(default)]
    pub created_by: String,

    /// Target completion date
    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    /// Estimated effort in hours
    #[serde(default)]
    pub estimated_hours: f64,

    /// Free-text tags
    #[serde(default)]
    pub tags: String,

    /// Whether this task carries subtasks
    #[serde(default)]
    pub has_subtasks: bool,

    /// Opaque per-kind extension payload
    #[serde(default)]
    pub extension: serde_json::Value,
}

impl NewTask {
    /// Create task fields with a title and defaults for everything else.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update applied to an existing task.
///
/// `None` fields are left unchanged. Clearing a nullable field goes through
/// the dedicated sentinel handling at the API boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    /// `Some(None)` clears the assignee, `Some(Some(u))` assigns
    #[serde(default, with = "double_option")]
    pub assigned_to: Option<Option<String>>,
    /// `Some(None)` clears the due date
    #[serde(default, with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub actual_hours: Option<f64>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub has_subtasks: Option<bool>,
    #[serde(default)]
    pub extension: Option<serde_json::Value>,
}

impl TaskPatch {
    /// Whether the patch changes anything.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assigned_to.is_none()
            && self.due_date.is_none()
            && self.estimated_hours.is_none()
            && self.actual_hours.is_none()
            && self.tags.is_none()
            && self.has_subtasks.is_none()
            && self.extension.is_none()
    }
}

/// Serde helper distinguishing "absent" from "present but null".
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Fields accepted when creating or replacing a subtask.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSubtask {
    /// Subtask title; items blank after trimming are dropped on replace
    pub title: String,

    /// Completion flag
    #[serde(default, alias = "completed")]
    pub is_completed: bool,
}

impl NewSubtask {
    /// Create subtask fields with a title, not yet completed.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            is_completed: false,
        }
    }
}

/// A generic child record attached to a (kind, id) parent task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    /// Global subtask identifier
    pub id: i64,

    /// Parent task kind
    pub kind: TaskKind,

    /// Parent task id within its kind
    pub parent_id: i64,

    /// Subtask title (non-empty after trimming)
    pub title: String,

    /// Completion flag
    #[serde(default)]
    pub is_completed: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Milestone lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl MilestoneStatus {
    /// Canonical storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::NotStarted => "not_started",
            MilestoneStatus::InProgress => "in_progress",
            MilestoneStatus::Completed => "completed",
        }
    }

    /// Parse a milestone status from its storage representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "not_started" => Some(MilestoneStatus::NotStarted),
            "in_progress" => Some(MilestoneStatus::InProgress),
            "completed" => Some(MilestoneStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A dated checkpoint with a three-state lifecycle.
///
/// At most one milestone across the whole system has status `in_progress`
/// at any time; the milestone state machine maintains that invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    /// Unique identifier
    pub id: i64,

    /// Milestone title
    pub title: String,

    /// Target completion date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    /// Current lifecycle state
    #[serde(default)]
    pub status: MilestoneStatus,

    /// Set only when the milestone is completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}
