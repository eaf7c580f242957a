//! HTTP-shaped API boundary.
//!
//! Request and response payloads plus the handlers behind them. Handlers
//! take raw string inputs the way a query string or JSON body delivers
//! them, validate everything up front, and return serializable response
//! types; errors carry an HTTP status through [`Error::http_status`] and
//! serialize as an [`ErrorResponse`]. The `dh` CLI drives the same
//! handlers, so both surfaces share one validation path.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregator::{self, AssigneeFilter, DueBucket, TaskFilter, TaskStats};
use crate::milestones::{self, PhaseBanner};
use crate::models::{
    Milestone, MilestoneStatus, NewSubtask, NewTask, Subtask, TaskPatch, TaskPriority, TaskRecord,
    TaskStatus,
};
use crate::phases::PhaseResolver;
use crate::storage::Storage;
use crate::transitions;
use crate::{Error, Result};

/// Command results that serialize to JSON or format for humans.
///
/// JSON is the default output and comes straight from serde; the human
/// rendering is hand-written per type.
pub trait Output: Serialize {
    /// Serialize to pretty JSON.
    fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Error payload returned with a non-2xx status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    /// Build the (status, payload) pair for an error.
    pub fn from_error(err: &Error) -> (u16, Self) {
        (
            err.http_status(),
            Self {
                error: err.to_string(),
            },
        )
    }
}

// === Task List ===

/// Raw query-string filters for the merged task list.
///
/// Everything arrives as strings; parsing failures reject the whole
/// request rather than silently dropping a filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default, alias = "due_date")]
    pub due: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default, alias = "kind")]
    pub task_type: Option<String>,
}

impl TaskQuery {
    /// Parse the raw query into a typed filter.
    pub fn into_filter(self, storage: &Storage) -> Result<TaskFilter> {
        let status = match self.status.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(s) => Some(
                TaskStatus::from_str(s)
                    .ok_or_else(|| Error::InvalidStatus(s.to_string()))?,
            ),
            None => None,
        };
        let priority = match self.priority.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(s) => Some(
                TaskPriority::from_str(s)
                    .ok_or_else(|| Error::InvalidPriority(s.to_string()))?,
            ),
            None => None,
        };
        let due = match self.due.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(s) => Some(DueBucket::from_str(s).ok_or_else(|| {
                Error::MalformedRequestBody(format!("unknown due filter: {}", s))
            })?),
            None => None,
        };
        let kind = match self.task_type.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(s) => Some(storage.registry().resolve(s)?),
            None => None,
        };

        Ok(TaskFilter {
            status,
            priority,
            assigned_to: self
                .assigned_to
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(AssigneeFilter::from_str),
            due,
            search: self.search.filter(|s| !s.trim().is_empty()),
            kind,
        })
    }
}

/// Merged task list plus the always-unfiltered statistics block.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskRecord>,
    pub stats: TaskStats,
}

/// List tasks across every kind with the given filters applied.
///
/// The statistics in the response always cover the full unfiltered set.
pub fn list_tasks(storage: &Storage, query: TaskQuery) -> Result<TaskListResponse> {
    let filter = query.into_filter(storage)?;
    Ok(TaskListResponse {
        tasks: aggregator::fetch_all(storage, &filter)?,
        stats: aggregator::stats(storage)?,
    })
}

// === Status Update ===

/// Body for a single-task status change.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub task_id: i64,
    pub task_type: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateStatusResponse {
    pub success: bool,
    pub task_id: i64,
    pub status: String,
    pub status_display: String,
}

/// Change one task's status, dispatching on the raw kind key.
pub fn update_status(
    storage: &mut Storage,
    request: UpdateStatusRequest,
) -> Result<UpdateStatusResponse> {
    let task = transitions::set_status(
        storage,
        &request.task_type,
        request.task_id,
        &request.status,
    )?;
    Ok(UpdateStatusResponse {
        success: true,
        task_id: task.id,
        status: task.status.as_str().to_string(),
        status_display: task.status.display().to_string(),
    })
}

// === Subtasks ===

/// Body for a full subtask replacement on one parent task.
#[derive(Debug, Deserialize)]
pub struct ReplaceSubtasksRequest {
    pub task_type: String,
    pub task_id: i64,
    #[serde(default)]
    pub subtasks: Vec<NewSubtask>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplaceSubtasksResponse {
    pub success: bool,
    pub subtasks: Vec<Subtask>,
}

/// Replace the full subtask list of a parent task.
///
/// The parent must exist; its `has_subtasks` flag is kept in sync with
/// whether any subtasks survived the replacement.
pub fn replace_subtasks(
    storage: &mut Storage,
    request: ReplaceSubtasksRequest,
) -> Result<ReplaceSubtasksResponse> {
    let kind = storage.registry().resolve(&request.task_type)?;
    storage.get_task(kind, request.task_id)?;

    let subtasks = storage.replace_subtasks(kind, request.task_id, &request.subtasks)?;
    storage.update_task(
        kind,
        request.task_id,
        &TaskPatch {
            has_subtasks: Some(!subtasks.is_empty()),
            ..TaskPatch::default()
        },
    )?;

    Ok(ReplaceSubtasksResponse {
        success: true,
        subtasks,
    })
}

/// Body for toggling one subtask's completion flag.
#[derive(Debug, Deserialize)]
pub struct ToggleSubtaskRequest {
    pub subtask_id: i64,
    #[serde(alias = "completed")]
    pub is_completed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleSubtaskResponse {
    pub success: bool,
    pub subtask_id: i64,
    pub is_completed: bool,
}

/// Set a subtask's completion flag in place.
pub fn toggle_subtask(
    storage: &mut Storage,
    request: ToggleSubtaskRequest,
) -> Result<ToggleSubtaskResponse> {
    let subtask = storage.toggle_subtask(request.subtask_id, request.is_completed)?;
    Ok(ToggleSubtaskResponse {
        success: true,
        subtask_id: subtask.id,
        is_completed: subtask.is_completed,
    })
}

// === Batch Update ===

/// Sentinel clearing the assignee in a batch update.
const UNASSIGNED_SENTINEL: &str = "unassigned";
/// Sentinel clearing the due date in a batch update.
const NO_DATE_SENTINEL: &str = "no_date";

/// Body for a bulk update over several tasks of one kind.
#[derive(Debug, Deserialize)]
pub struct BatchUpdateRequest {
    pub task_ids: Vec<i64>,
    pub task_type: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchUpdateResponse {
    pub status: String,
    pub message: String,
    pub updated_count: usize,
}

/// Apply the same partial update to several tasks of one kind.
///
/// All fields are validated before the first write, so a bad value never
/// leaves the batch half-applied. The `unassigned` and `no_date`
/// sentinels clear the assignee and due date. Ids that no longer exist
/// are skipped and excluded from the count.
pub fn batch_update(
    storage: &mut Storage,
    request: BatchUpdateRequest,
) -> Result<BatchUpdateResponse> {
    let kind = storage.registry().resolve(&request.task_type)?;

    let mut patch = TaskPatch::default();
    if let Some(s) = request.status.as_deref().filter(|s| !s.trim().is_empty()) {
        patch.status =
            Some(TaskStatus::from_str(s).ok_or_else(|| Error::InvalidStatus(s.to_string()))?);
    }
    if let Some(p) = request.priority.as_deref().filter(|s| !s.trim().is_empty()) {
        patch.priority =
            Some(TaskPriority::from_str(p).ok_or_else(|| Error::InvalidPriority(p.to_string()))?);
    }
    if let Some(a) = request
        .assigned_to
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        patch.assigned_to = if a.eq_ignore_ascii_case(UNASSIGNED_SENTINEL) {
            Some(None)
        } else {
            Some(Some(a.to_string()))
        };
    }
    if let Some(d) = request
        .due_date
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        patch.due_date = if d.eq_ignore_ascii_case(NO_DATE_SENTINEL) {
            Some(None)
        } else {
            Some(Some(NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(
                |_| Error::MalformedRequestBody(format!("invalid due date: {}", d)),
            )?))
        };
    }

    if patch.is_empty() {
        return Err(Error::MalformedRequestBody(
            "no fields to update".to_string(),
        ));
    }

    let mut updated = 0;
    for id in &request.task_ids {
        match storage.update_task(kind, *id, &patch) {
            Ok(_) => updated += 1,
            Err(Error::RecordNotFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(BatchUpdateResponse {
        status: "success".to_string(),
        message: format!("Updated {} task(s)", updated),
        updated_count: updated,
    })
}

// === Phase ===

/// The banner for the company's current phase.
pub fn current_phase(storage: &Storage) -> Result<PhaseBanner> {
    milestones::current_phase(storage, &PhaseResolver::new())
}

// === Single-Task Operations ===

/// Create a task, dispatching on the raw kind key.
pub fn create_task(storage: &mut Storage, kind_key: &str, fields: &NewTask) -> Result<TaskRecord> {
    let kind = storage.registry().resolve(kind_key)?;
    storage.create_task(kind, fields)
}

/// Fetch one task by kind key and id.
pub fn get_task(storage: &Storage, kind_key: &str, id: i64) -> Result<TaskRecord> {
    let kind = storage.registry().resolve(kind_key)?;
    storage.get_task(kind, id)
}

/// Apply a partial update to one task. Empty patches are rejected.
pub fn update_task(
    storage: &mut Storage,
    kind_key: &str,
    id: i64,
    patch: &TaskPatch,
) -> Result<TaskRecord> {
    if patch.is_empty() {
        return Err(Error::MalformedRequestBody(
            "no fields to update".to_string(),
        ));
    }
    let kind = storage.registry().resolve(kind_key)?;
    storage.update_task(kind, id, patch)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteTaskResponse {
    pub success: bool,
    pub task_type: String,
    pub task_id: i64,
}

/// Delete one task and its subtasks.
pub fn delete_task(storage: &mut Storage, kind_key: &str, id: i64) -> Result<DeleteTaskResponse> {
    let kind = storage.registry().resolve(kind_key)?;
    storage.delete_task(kind, id)?;
    Ok(DeleteTaskResponse {
        success: true,
        task_type: kind.as_str().to_string(),
        task_id: id,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubtaskListResponse {
    pub subtasks: Vec<Subtask>,
}

/// List the subtasks of one parent task.
pub fn list_subtasks(storage: &Storage, kind_key: &str, id: i64) -> Result<SubtaskListResponse> {
    let kind = storage.registry().resolve(kind_key)?;
    storage.get_task(kind, id)?;
    Ok(SubtaskListResponse {
        subtasks: storage.list_subtasks(kind, id)?,
    })
}

// === Milestones ===

#[derive(Debug, Serialize, Deserialize)]
pub struct MilestoneListResponse {
    pub milestones: Vec<Milestone>,
}

/// Create a milestone in the `not_started` state.
pub fn create_milestone(
    storage: &mut Storage,
    title: &str,
    due_date: Option<NaiveDate>,
) -> Result<Milestone> {
    storage.create_milestone(title, due_date)
}

/// List all milestones in creation order.
pub fn list_milestones(storage: &Storage) -> Result<MilestoneListResponse> {
    Ok(MilestoneListResponse {
        milestones: storage.list_milestones()?,
    })
}

/// Set a milestone's status by title, from its raw string spelling.
///
/// `in_progress` goes through the promoting transition that keeps at
/// most one milestone active.
pub fn set_milestone_status(
    storage: &mut Storage,
    title: &str,
    status: &str,
) -> Result<Milestone> {
    let status = MilestoneStatus::from_str(status).ok_or_else(|| {
        Error::InvalidStatus(format!(
            "invalid milestone status \"{}\" (expected one of: not_started, in_progress, completed)",
            status
        ))
    })?;
    milestones::set_status_by_title(storage, title, status)
}

/// Promote the named milestone to the single active one.
pub fn set_current_milestone(storage: &mut Storage, title: &str) -> Result<Milestone> {
    milestones::set_current_by_title(storage, title)
}

// === System ===

#[derive(Debug, Serialize, Deserialize)]
pub struct InitResponse {
    pub initialized: bool,
    pub path: std::path::PathBuf,
}

/// Initialize storage at the environment-resolved data directory.
pub fn system_init() -> Result<InitResponse> {
    let already = Storage::exists()?;
    let storage = Storage::init()?;
    Ok(InitResponse {
        initialized: !already,
        path: storage.root,
    })
}

// === Output Rendering ===

fn task_line(task: &TaskRecord) -> String {
    let mut line = format!(
        "{} #{} [{}/{}] {}",
        task.kind,
        task.id,
        task.priority.as_str(),
        task.status.as_str(),
        task.title
    );
    if let Some(due) = task.due_date {
        line.push_str(&format!(" (due {})", due));
    }
    if let Some(assignee) = &task.assigned_to {
        line.push_str(&format!(" @{}", assignee));
    }
    line
}

fn milestone_line(m: &Milestone) -> String {
    let mut line = format!("#{} [{}] {}", m.id, m.status, m.title);
    if let Some(due) = m.due_date {
        line.push_str(&format!(" (due {})", due));
    }
    line
}

fn subtask_line(s: &Subtask) -> String {
    let mark = if s.is_completed { "x" } else { " " };
    format!("[{}] #{} {}", mark, s.id, s.title)
}

impl Output for TaskRecord {
    fn to_human(&self) -> String {
        let mut out = task_line(self);
        if !self.description.is_empty() {
            out.push_str(&format!("\n  {}", self.description));
        }
        if self.estimated_hours > 0.0 || self.actual_hours > 0.0 {
            out.push_str(&format!(
                "\n  hours: {:.1} logged / {:.1} estimated",
                self.actual_hours, self.estimated_hours
            ));
        }
        if !self.tags.is_empty() {
            out.push_str(&format!("\n  tags: {}", self.tags));
        }
        out
    }
}

impl Output for TaskListResponse {
    fn to_human(&self) -> String {
        let mut out = String::new();
        if self.tasks.is_empty() {
            out.push_str("No tasks match.\n");
        } else {
            for task in &self.tasks {
                out.push_str(&task_line(task));
                out.push('\n');
            }
        }
        out.push_str(&format!(
            "\n{} total, {}% done, {:.1}h logged / {:.1}h estimated",
            self.stats.total,
            self.stats.completion_rate,
            self.stats.actual_hours,
            self.stats.estimated_hours
        ));
        out
    }
}

impl Output for UpdateStatusResponse {
    fn to_human(&self) -> String {
        format!("Task #{} is now {}", self.task_id, self.status_display)
    }
}

impl Output for ReplaceSubtasksResponse {
    fn to_human(&self) -> String {
        if self.subtasks.is_empty() {
            return "All subtasks removed.".to_string();
        }
        self.subtasks
            .iter()
            .map(subtask_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Output for SubtaskListResponse {
    fn to_human(&self) -> String {
        if self.subtasks.is_empty() {
            return "No subtasks.".to_string();
        }
        self.subtasks
            .iter()
            .map(subtask_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Output for ToggleSubtaskResponse {
    fn to_human(&self) -> String {
        let state = if self.is_completed {
            "completed"
        } else {
            "reopened"
        };
        format!("Subtask #{} {}", self.subtask_id, state)
    }
}

impl Output for BatchUpdateResponse {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

impl Output for DeleteTaskResponse {
    fn to_human(&self) -> String {
        format!("Deleted {} #{}", self.task_type, self.task_id)
    }
}

impl Output for Milestone {
    fn to_human(&self) -> String {
        milestone_line(self)
    }
}

impl Output for MilestoneListResponse {
    fn to_human(&self) -> String {
        if self.milestones.is_empty() {
            return "No milestones.".to_string();
        }
        self.milestones
            .iter()
            .map(milestone_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Output for InitResponse {
    fn to_human(&self) -> String {
        if self.initialized {
            format!("Initialized tracker at {}", self.path.display())
        } else {
            format!("Tracker already initialized at {}", self.path.display())
        }
    }
}

impl Output for PhaseBanner {
    fn to_human(&self) -> String {
        format!(
            "Phase {}: {} ({})\nCurrent milestone: {}",
            self.phase_order, self.phase_name, self.phase_type, self.milestone_title
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;
    use crate::registry::TaskKind;
    use crate::test_utils::TestEnv;

    fn seed(storage: &mut Storage, kind: TaskKind, title: &str) -> TaskRecord {
        storage.create_task(kind, &NewTask::titled(title)).unwrap()
    }

    #[test]
    fn test_list_tasks_with_string_filters() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        seed(&mut storage, TaskKind::Arcade, "fix cabinet");
        seed(&mut storage, TaskKind::Education, "write outline");

        let query = TaskQuery {
            task_type: Some("ArcadeTask".to_string()),
            ..TaskQuery::default()
        };
        let response = list_tasks(&storage, query).unwrap();
        assert_eq!(response.tasks.len(), 1);
        assert_eq!(response.tasks[0].title, "fix cabinet");
        // Stats ignore the kind filter
        assert_eq!(response.stats.total, 2);
    }

    #[test]
    fn test_task_query_accepts_wire_parameter_names() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        seed(&mut storage, TaskKind::Arcade, "fix cabinet");
        seed(&mut storage, TaskKind::Education, "write outline");

        // The query-string surface names these kind= and due_date=
        let query: TaskQuery =
            serde_json::from_str(r#"{"kind": "arcade", "due_date": "no_date"}"#).unwrap();
        let response = list_tasks(&storage, query).unwrap();
        assert_eq!(response.tasks.len(), 1);
        assert_eq!(response.tasks[0].title, "fix cabinet");
    }

    #[test]
    fn test_list_tasks_rejects_bad_filters() {
        let env = TestEnv::new();
        let storage = env.init_storage();

        let query = TaskQuery {
            status: Some("paused".to_string()),
            ..TaskQuery::default()
        };
        let err = list_tasks(&storage, query).unwrap_err();
        assert_eq!(err.http_status(), 400);

        let query = TaskQuery {
            priority: Some("urgent".to_string()),
            ..TaskQuery::default()
        };
        assert!(matches!(
            list_tasks(&storage, query).unwrap_err(),
            Error::InvalidPriority(_)
        ));

        let query = TaskQuery {
            due: Some("someday".to_string()),
            ..TaskQuery::default()
        };
        assert!(matches!(
            list_tasks(&storage, query).unwrap_err(),
            Error::MalformedRequestBody(_)
        ));
    }

    #[test]
    fn test_update_status_response_shape() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let task = seed(&mut storage, TaskKind::SocialMedia, "post teaser");

        let response = update_status(
            &mut storage,
            UpdateStatusRequest {
                task_id: task.id,
                task_type: "social_media".to_string(),
                status: "in_review".to_string(),
            },
        )
        .unwrap();

        assert!(response.success);
        assert_eq!(response.task_id, task.id);
        assert_eq!(response.status, "in_review");
        assert_eq!(response.status_display, "In Review");
    }

    #[test]
    fn test_update_status_missing_task_maps_to_404() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        let err = update_status(
            &mut storage,
            UpdateStatusRequest {
                task_id: 7,
                task_type: "arcade".to_string(),
                status: "done".to_string(),
            },
        )
        .unwrap_err();

        assert_eq!(err.http_status(), 404);
        let (status, payload) = ErrorResponse::from_error(&err);
        assert_eq!(status, 404);
        assert!(payload.error.contains("arcade"));
    }

    #[test]
    fn test_replace_subtasks_syncs_parent_flag() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let task = seed(&mut storage, TaskKind::ThemePark, "inspect coaster");
        assert!(!task.has_subtasks);

        let response = replace_subtasks(
            &mut storage,
            ReplaceSubtasksRequest {
                task_type: "theme_park".to_string(),
                task_id: task.id,
                subtasks: vec![NewSubtask::titled("brakes"), NewSubtask::titled("track")],
            },
        )
        .unwrap();
        assert_eq!(response.subtasks.len(), 2);
        assert!(storage
            .get_task(TaskKind::ThemePark, task.id)
            .unwrap()
            .has_subtasks);

        // Replacing with an empty list clears the flag again
        let response = replace_subtasks(
            &mut storage,
            ReplaceSubtasksRequest {
                task_type: "theme_park".to_string(),
                task_id: task.id,
                subtasks: vec![],
            },
        )
        .unwrap();
        assert!(response.subtasks.is_empty());
        assert!(!storage
            .get_task(TaskKind::ThemePark, task.id)
            .unwrap()
            .has_subtasks);
    }

    #[test]
    fn test_replace_subtasks_requires_parent() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        let err = replace_subtasks(
            &mut storage,
            ReplaceSubtasksRequest {
                task_type: "arcade".to_string(),
                task_id: 42,
                subtasks: vec![NewSubtask::titled("orphan")],
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::RecordNotFound(_)));
    }

    #[test]
    fn test_toggle_subtask_response_shape() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let task = seed(&mut storage, TaskKind::R1d3, "parent");
        let saved = storage
            .replace_subtasks(TaskKind::R1d3, task.id, &[NewSubtask::titled("child")])
            .unwrap();

        let response = toggle_subtask(
            &mut storage,
            ToggleSubtaskRequest {
                subtask_id: saved[0].id,
                is_completed: true,
            },
        )
        .unwrap();
        assert!(response.success);
        assert_eq!(response.subtask_id, saved[0].id);
        assert!(response.is_completed);
    }

    #[test]
    fn test_batch_update_with_sentinels() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        let a = storage
            .create_task(
                TaskKind::Arcade,
                &NewTask {
                    title: "a".to_string(),
                    assigned_to: Some("omar".to_string()),
                    due_date: NaiveDate::from_ymd_opt(2024, 3, 1),
                    ..NewTask::default()
                },
            )
            .unwrap();
        let b = seed(&mut storage, TaskKind::Arcade, "b");

        let response = batch_update(
            &mut storage,
            BatchUpdateRequest {
                task_ids: vec![a.id, b.id],
                task_type: "arcade".to_string(),
                status: Some("in_progress".to_string()),
                priority: None,
                assigned_to: Some("unassigned".to_string()),
                due_date: Some("no_date".to_string()),
            },
        )
        .unwrap();

        assert_eq!(response.updated_count, 2);
        assert_eq!(response.status, "success");

        for id in [a.id, b.id] {
            let task = storage.get_task(TaskKind::Arcade, id).unwrap();
            assert_eq!(task.status, TaskStatus::InProgress);
            assert_eq!(task.assigned_to, None);
            assert_eq!(task.due_date, None);
        }
    }

    #[test]
    fn test_batch_update_skips_missing_ids() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let a = seed(&mut storage, TaskKind::Education, "a");

        let response = batch_update(
            &mut storage,
            BatchUpdateRequest {
                task_ids: vec![a.id, 999],
                task_type: "education".to_string(),
                status: Some("done".to_string()),
                priority: None,
                assigned_to: None,
                due_date: None,
            },
        )
        .unwrap();
        assert_eq!(response.updated_count, 1);
    }

    #[test]
    fn test_batch_update_validates_before_writing() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let a = seed(&mut storage, TaskKind::Education, "a");

        let err = batch_update(
            &mut storage,
            BatchUpdateRequest {
                task_ids: vec![a.id],
                task_type: "education".to_string(),
                status: Some("done".to_string()),
                priority: None,
                assigned_to: None,
                due_date: Some("next tuesday".to_string()),
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedRequestBody(_)));

        // Nothing was written
        let task = storage.get_task(TaskKind::Education, a.id).unwrap();
        assert_eq!(task.status, TaskStatus::ToDo);
    }

    #[test]
    fn test_batch_update_rejects_empty_patch() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        let err = batch_update(
            &mut storage,
            BatchUpdateRequest {
                task_ids: vec![1],
                task_type: "r1d3".to_string(),
                status: None,
                priority: None,
                assigned_to: None,
                due_date: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_current_phase_banner() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        let m = storage
            .create_milestone("Theme Park Feasibility Study", None)
            .unwrap();
        storage.set_milestone_in_progress(m.id).unwrap();

        let banner = current_phase(&storage).unwrap();
        assert_eq!(banner.phase_type, "theme_park");
        assert_eq!(banner.phase_order, 3);
    }
}
