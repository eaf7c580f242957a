//! Cross-kind task aggregation.
//!
//! The dashboard treats the per-kind partitions as one logical task list:
//! fetch from every registered kind, merge, then filter, sort, and compute
//! statistics over the merged list. Filters apply after the merge;
//! statistics always come from the full unfiltered fetch so the dashboard
//! totals stay stable while the visible list is narrowed - that split is a
//! user-visible contract, not an implementation detail.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{TaskPriority, TaskRecord, TaskStatus};
use crate::registry::TaskKind;
use crate::storage::Storage;
use crate::Result;

/// Due-date bucket filters for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueBucket {
    /// Due before today and still open
    Overdue,
    /// Due exactly today
    Today,
    /// Today through the end of the ISO week
    ThisWeek,
    /// The following Monday through Sunday
    NextWeek,
    /// Any day in the current calendar month
    ThisMonth,
    /// No due date set
    NoDate,
}

impl DueBucket {
    /// Parse a bucket from its query-string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "overdue" => Some(DueBucket::Overdue),
            "today" => Some(DueBucket::Today),
            "this_week" => Some(DueBucket::ThisWeek),
            "next_week" => Some(DueBucket::NextWeek),
            "this_month" => Some(DueBucket::ThisMonth),
            "no_date" => Some(DueBucket::NoDate),
            _ => None,
        }
    }

    fn matches(&self, task: &TaskRecord, today: NaiveDate) -> bool {
        let week_end = today + Duration::days(6 - i64::from(today.weekday().num_days_from_monday()));
        match self {
            DueBucket::Overdue => task.is_overdue(today),
            DueBucket::Today => task.due_date == Some(today),
            DueBucket::ThisWeek => match task.due_date {
                Some(due) => due >= today && due <= week_end,
                None => false,
            },
            DueBucket::NextWeek => match task.due_date {
                Some(due) => due > week_end && due <= week_end + Duration::days(7),
                None => false,
            },
            DueBucket::ThisMonth => match task.due_date {
                Some(due) => due.year() == today.year() && due.month() == today.month(),
                None => false,
            },
            DueBucket::NoDate => task.due_date.is_none(),
        }
    }
}

/// Assignee filter: a concrete user or the unassigned sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssigneeFilter {
    /// Tasks with no assignee
    Unassigned,
    /// Tasks assigned to this user reference
    User(String),
}

impl AssigneeFilter {
    /// Parse an assignee filter; the literal `unassigned` is the sentinel.
    pub fn from_str(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("unassigned") {
            AssigneeFilter::Unassigned
        } else {
            AssigneeFilter::User(s.trim().to_string())
        }
    }

    fn matches(&self, task: &TaskRecord) -> bool {
        match self {
            AssigneeFilter::Unassigned => task.assigned_to.is_none(),
            AssigneeFilter::User(user) => task.assigned_to.as_deref() == Some(user.as_str()),
        }
    }
}

/// Filters applied to the merged task list.
///
/// All filters are conjunctive. The default view (no status filter)
/// excludes `done` tasks; asking for a status explicitly - including
/// `done` - shows exactly that status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub assigned_to: Option<AssigneeFilter>,
    #[serde(default)]
    pub due: Option<DueBucket>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub kind: Option<TaskKind>,
}

impl TaskFilter {
    fn matches(&self, task: &TaskRecord, today: NaiveDate) -> bool {
        let status_ok = match self.status {
            Some(status) => task.status == status,
            None => task.status != TaskStatus::Done,
        };
        status_ok
            && self.priority.map_or(true, |p| task.priority == p)
            && self.assigned_to.as_ref().map_or(true, |a| a.matches(task))
            && self.due.map_or(true, |d| d.matches(task, today))
            && self.search.as_ref().map_or(true, |q| {
                let q = q.to_lowercase();
                task.title.to_lowercase().contains(&q)
                    || task.description.to_lowercase().contains(&q)
            })
            && self.kind.map_or(true, |k| task.kind == k)
    }
}

/// Statistics computed over the full unfiltered fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStats {
    /// Total task count across all kinds
    pub total: u64,
    /// Count per status (every status present, zero or not)
    pub by_status: BTreeMap<String, u64>,
    /// Count per kind (every registered kind present, zero or not)
    pub by_kind: BTreeMap<String, u64>,
    /// Percentage of tasks done, rounded down
    pub completion_rate: u64,
    /// Sum of estimated hours
    pub estimated_hours: f64,
    /// Sum of logged hours
    pub actual_hours: f64,
}

/// Fetch every kind's tasks, merged and sorted, with the given filters
/// applied after the merge.
///
/// Sort order: priority weight descending (critical first), then due date
/// ascending with missing due dates last, then stable in fetch order
/// (kinds in registration order, rows in insertion order).
pub fn fetch_all(storage: &Storage, filter: &TaskFilter) -> Result<Vec<TaskRecord>> {
    fetch_all_at(storage, filter, Utc::now().date_naive())
}

/// [`fetch_all`] with an explicit "today" for due-bucket filtering.
pub fn fetch_all_at(
    storage: &Storage,
    filter: &TaskFilter,
    today: NaiveDate,
) -> Result<Vec<TaskRecord>> {
    let mut tasks = fetch_unfiltered(storage)?;
    tasks.retain(|task| filter.matches(task, today));
    sort_tasks(&mut tasks);
    Ok(tasks)
}

/// Concatenate every registered kind's task list, unfiltered and unsorted.
pub fn fetch_unfiltered(storage: &Storage) -> Result<Vec<TaskRecord>> {
    let kinds: Vec<TaskKind> = storage.registry().kinds().collect();
    let mut tasks = Vec::new();
    for kind in kinds {
        tasks.extend(storage.list_tasks(kind)?);
    }
    Ok(tasks)
}

/// Sort tasks by the dashboard ordering rule.
pub fn sort_tasks(tasks: &mut [TaskRecord]) {
    // sort_by_key is stable: ties keep their fetch order.
    tasks.sort_by_key(|task| {
        (
            std::cmp::Reverse(task.priority.weight()),
            task.due_date.unwrap_or(NaiveDate::MAX),
        )
    });
}

/// Compute dashboard statistics over the full unfiltered fetch,
/// independent of any filters applied to the displayed list.
pub fn stats(storage: &Storage) -> Result<TaskStats> {
    let tasks = fetch_unfiltered(storage)?;

    let mut by_status: BTreeMap<String, u64> = TaskStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut by_kind: BTreeMap<String, u64> = storage
        .registry()
        .kinds()
        .map(|k| (k.as_str().to_string(), 0))
        .collect();

    let mut estimated = 0.0;
    let mut actual = 0.0;
    let mut done = 0u64;

    for task in &tasks {
        *by_status.entry(task.status.as_str().to_string()).or_insert(0) += 1;
        *by_kind.entry(task.kind.as_str().to_string()).or_insert(0) += 1;
        estimated += task.estimated_hours;
        actual += task.actual_hours;
        if task.status == TaskStatus::Done {
            done += 1;
        }
    }

    let total = tasks.len() as u64;
    let completion_rate = if total > 0 { done * 100 / total } else { 0 };

    Ok(TaskStats {
        total,
        by_status,
        by_kind,
        completion_rate,
        estimated_hours: estimated,
        actual_hours: actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, TaskPatch};
    use crate::test_utils::TestEnv;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seed(storage: &mut Storage, kind: TaskKind, title: &str, fields: NewTask) -> TaskRecord {
        let fields = NewTask {
            title: title.to_string(),
            ..fields
        };
        storage.create_task(kind, &fields).unwrap()
    }

    #[test]
    fn test_fetch_all_counts_every_partition() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        seed(&mut storage, TaskKind::R1d3, "a", NewTask::default());
        seed(&mut storage, TaskKind::Arcade, "b", NewTask::default());
        seed(&mut storage, TaskKind::Arcade, "c", NewTask::default());
        seed(&mut storage, TaskKind::Game, "legacy", NewTask::default());

        let all = fetch_unfiltered(&storage).unwrap();
        let sum: usize = storage
            .registry()
            .kinds()
            .map(|k| storage.list_tasks(k).unwrap().len())
            .sum();
        assert_eq!(all.len(), 4);
        assert_eq!(all.len(), sum);
    }

    #[test]
    fn test_sort_priority_then_due_date() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        // Scenario: task A in r1d3 (high, due 2024-01-10); task B in arcade
        // (critical, due 2024-01-05). Expected order: [B, A].
        seed(
            &mut storage,
            TaskKind::R1d3,
            "A",
            NewTask {
                priority: TaskPriority::High,
                due_date: Some(date(2024, 1, 10)),
                ..NewTask::default()
            },
        );
        seed(
            &mut storage,
            TaskKind::Arcade,
            "B",
            NewTask {
                priority: TaskPriority::Critical,
                due_date: Some(date(2024, 1, 5)),
                ..NewTask::default()
            },
        );

        let tasks = fetch_all_at(&storage, &TaskFilter::default(), date(2024, 1, 1)).unwrap();
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A"]);
    }

    #[test]
    fn test_sort_null_due_date_last() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        seed(
            &mut storage,
            TaskKind::R1d3,
            "no date",
            NewTask::default(),
        );
        seed(
            &mut storage,
            TaskKind::R1d3,
            "dated",
            NewTask {
                due_date: Some(date(2030, 1, 1)),
                ..NewTask::default()
            },
        );

        let tasks = fetch_all_at(&storage, &TaskFilter::default(), date(2024, 1, 1)).unwrap();
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["dated", "no date"]);
    }

    #[test]
    fn test_equal_keys_keep_fetch_order() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        // Same priority, same (absent) due date: registration order of the
        // kinds breaks the tie.
        seed(&mut storage, TaskKind::Education, "edu", NewTask::default());
        seed(&mut storage, TaskKind::R1d3, "r1d3", NewTask::default());

        let tasks = fetch_all_at(&storage, &TaskFilter::default(), date(2024, 1, 1)).unwrap();
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["r1d3", "edu"]);
    }

    #[test]
    fn test_default_view_excludes_done() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        let done = seed(&mut storage, TaskKind::R1d3, "done", NewTask::default());
        storage
            .update_task(
                TaskKind::R1d3,
                done.id,
                &TaskPatch {
                    status: Some(TaskStatus::Done),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        seed(&mut storage, TaskKind::R1d3, "open", NewTask::default());

        let tasks = fetch_all_at(&storage, &TaskFilter::default(), date(2024, 1, 1)).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "open");

        // Explicitly asking for done shows only done
        let filter = TaskFilter {
            status: Some(TaskStatus::Done),
            ..TaskFilter::default()
        };
        let tasks = fetch_all_at(&storage, &filter, date(2024, 1, 1)).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "done");
    }

    #[test]
    fn test_stats_ignore_filters() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        let done = seed(&mut storage, TaskKind::Arcade, "done", NewTask::default());
        storage
            .update_task(
                TaskKind::Arcade,
                done.id,
                &TaskPatch {
                    status: Some(TaskStatus::Done),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        seed(&mut storage, TaskKind::Arcade, "todo", NewTask::default());
        let started = seed(&mut storage, TaskKind::Education, "busy", NewTask::default());
        storage
            .update_task(
                TaskKind::Education,
                started.id,
                &TaskPatch {
                    status: Some(TaskStatus::InProgress),
                    ..TaskPatch::default()
                },
            )
            .unwrap();

        // A filtered view showing only done tasks...
        let filter = TaskFilter {
            status: Some(TaskStatus::Done),
            ..TaskFilter::default()
        };
        let visible = fetch_all_at(&storage, &filter, date(2024, 1, 1)).unwrap();
        assert_eq!(visible.len(), 1);

        // ...leaves the stats reporting full counts.
        let stats = stats(&storage).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_status["to_do"], 1);
        assert_eq!(stats.by_status["in_progress"], 1);
        assert_eq!(stats.by_status["done"], 1);
        assert_eq!(stats.by_kind["arcade"], 2);
        assert_eq!(stats.by_kind["education"], 1);
        assert_eq!(stats.by_kind["theme_park"], 0);
        assert_eq!(stats.completion_rate, 33);
    }

    #[test]
    fn test_assignee_filter() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        seed(
            &mut storage,
            TaskKind::R1d3,
            "mine",
            NewTask {
                assigned_to: Some("maya".to_string()),
                ..NewTask::default()
            },
        );
        seed(&mut storage, TaskKind::R1d3, "nobody's", NewTask::default());

        let filter = TaskFilter {
            assigned_to: Some(AssigneeFilter::from_str("maya")),
            ..TaskFilter::default()
        };
        let tasks = fetch_all_at(&storage, &filter, date(2024, 1, 1)).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "mine");

        let filter = TaskFilter {
            assigned_to: Some(AssigneeFilter::from_str("unassigned")),
            ..TaskFilter::default()
        };
        let tasks = fetch_all_at(&storage, &filter, date(2024, 1, 1)).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "nobody's");
    }

    #[test]
    fn test_search_matches_title_or_description() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        seed(
            &mut storage,
            TaskKind::SocialMedia,
            "Launch TikTok campaign",
            NewTask::default(),
        );
        seed(
            &mut storage,
            TaskKind::Education,
            "Write syllabus",
            NewTask {
                description: "Cover the campaign module".to_string(),
                ..NewTask::default()
            },
        );
        seed(&mut storage, TaskKind::R1d3, "Unrelated", NewTask::default());

        let filter = TaskFilter {
            search: Some("CAMPAIGN".to_string()),
            ..TaskFilter::default()
        };
        let tasks = fetch_all_at(&storage, &filter, date(2024, 1, 1)).unwrap();
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn test_due_buckets() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        // 2024-06-05 is a Wednesday; ISO week ends Sunday 2024-06-09.
        let today = date(2024, 6, 5);

        seed(
            &mut storage,
            TaskKind::R1d3,
            "overdue",
            NewTask {
                due_date: Some(date(2024, 6, 1)),
                ..NewTask::default()
            },
        );
        seed(
            &mut storage,
            TaskKind::R1d3,
            "today",
            NewTask {
                due_date: Some(today),
                ..NewTask::default()
            },
        );
        seed(
            &mut storage,
            TaskKind::R1d3,
            "this week",
            NewTask {
                due_date: Some(date(2024, 6, 8)),
                ..NewTask::default()
            },
        );
        seed(
            &mut storage,
            TaskKind::R1d3,
            "next week",
            NewTask {
                due_date: Some(date(2024, 6, 12)),
                ..NewTask::default()
            },
        );
        seed(
            &mut storage,
            TaskKind::R1d3,
            "this month",
            NewTask {
                due_date: Some(date(2024, 6, 28)),
                ..NewTask::default()
            },
        );
        seed(&mut storage, TaskKind::R1d3, "no date", NewTask::default());

        let titles_for = |bucket: DueBucket| -> Vec<String> {
            let filter = TaskFilter {
                due: Some(bucket),
                ..TaskFilter::default()
            };
            fetch_all_at(&storage, &filter, today)
                .unwrap()
                .into_iter()
                .map(|t| t.title)
                .collect()
        };

        assert_eq!(titles_for(DueBucket::Overdue), vec!["overdue"]);
        assert_eq!(titles_for(DueBucket::Today), vec!["today"]);
        assert_eq!(titles_for(DueBucket::ThisWeek), vec!["today", "this week"]);
        assert_eq!(titles_for(DueBucket::NextWeek), vec!["next week"]);
        assert_eq!(
            titles_for(DueBucket::ThisMonth),
            vec!["overdue", "today", "this week", "next week", "this month"]
        );
        assert_eq!(titles_for(DueBucket::NoDate), vec!["no date"]);
    }

    #[test]
    fn test_overdue_excludes_done_and_blocked() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let today = date(2024, 6, 5);

        for (title, status) in [
            ("open", TaskStatus::ToDo),
            ("done", TaskStatus::Done),
            ("blocked", TaskStatus::Blocked),
        ] {
            let task = seed(
                &mut storage,
                TaskKind::ThemePark,
                title,
                NewTask {
                    due_date: Some(date(2024, 5, 1)),
                    ..NewTask::default()
                },
            );
            storage
                .update_task(
                    TaskKind::ThemePark,
                    task.id,
                    &TaskPatch {
                        status: Some(status),
                        ..TaskPatch::default()
                    },
                )
                .unwrap();
        }

        let filter = TaskFilter {
            due: Some(DueBucket::Overdue),
            ..TaskFilter::default()
        };
        let tasks = fetch_all_at(&storage, &filter, today).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "open");
    }

    #[test]
    fn test_kind_filter() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        seed(&mut storage, TaskKind::Arcade, "a", NewTask::default());
        seed(&mut storage, TaskKind::Education, "b", NewTask::default());

        let filter = TaskFilter {
            kind: Some(TaskKind::Arcade),
            ..TaskFilter::default()
        };
        let tasks = fetch_all_at(&storage, &filter, date(2024, 1, 1)).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind, TaskKind::Arcade);
    }
}
