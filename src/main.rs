//! Deckhand CLI - a multi-department task registry and milestone tracker.

use chrono::NaiveDate;
use clap::Parser;
use std::process;

use deckhand::api::{
    self, BatchUpdateRequest, Output, ReplaceSubtasksRequest, TaskQuery, ToggleSubtaskRequest,
    UpdateStatusRequest,
};
use deckhand::cli::{Cli, Commands, MilestoneCommands, SubtaskCommands, SystemCommands, TaskCommands};
use deckhand::models::{NewSubtask, NewTask, TaskPatch, TaskPriority, TaskStatus};
use deckhand::storage::Storage;
use deckhand::{Error, Result};

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    if let Err(e) = run_command(cli.command, human) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!(
                "{}",
                serde_json::json!({"error": e.to_string(), "status": e.http_status()})
            );
        }
        process::exit(1);
    }
}

fn run_command(command: Commands, human: bool) -> Result<()> {
    match command {
        Commands::System {
            command: SystemCommands::Init,
        } => {
            let result = api::system_init()?;
            output(&result, human);
        }

        Commands::Task { command } => run_task_command(command, human)?,
        Commands::Subtask { command } => run_subtask_command(command, human)?,
        Commands::Milestone { command } => run_milestone_command(command, human)?,

        Commands::Phase => {
            let storage = Storage::open()?;
            let result = api::current_phase(&storage)?;
            output(&result, human);
        }
    }
    Ok(())
}

fn run_task_command(command: TaskCommands, human: bool) -> Result<()> {
    match command {
        TaskCommands::Create {
            kind,
            title,
            description,
            priority,
            status,
            assignee,
            due,
            estimate,
            tags,
            extension,
        } => {
            let mut storage = Storage::open()?;
            let fields = NewTask {
                title,
                description: description.unwrap_or_default(),
                status: match status.as_deref() {
                    Some(s) => parse_status(s)?,
                    None => TaskStatus::default(),
                },
                priority: match priority.as_deref() {
                    Some(p) => parse_priority(p)?,
                    None => TaskPriority::default(),
                },
                assigned_to: assignee,
                created_by: whoami(),
                due_date: due.as_deref().map(parse_date).transpose()?,
                estimated_hours: parse_hours(estimate)?.unwrap_or(0.0),
                tags: tags.unwrap_or_default(),
                has_subtasks: false,
                extension: match extension.as_deref() {
                    Some(json) => serde_json::from_str(json)?,
                    None => serde_json::Value::Null,
                },
            };
            let result = api::create_task(&mut storage, &kind, &fields)?;
            output(&result, human);
        }

        TaskCommands::List {
            status,
            priority,
            assignee,
            due,
            search,
            kind,
        } => {
            let storage = Storage::open()?;
            let query = TaskQuery {
                status,
                priority,
                assigned_to: assignee,
                due,
                search,
                task_type: kind,
            };
            let result = api::list_tasks(&storage, query)?;
            output(&result, human);
        }

        TaskCommands::Show { kind, id } => {
            let storage = Storage::open()?;
            let result = api::get_task(&storage, &kind, id)?;
            output(&result, human);
        }

        TaskCommands::Update {
            kind,
            id,
            title,
            description,
            priority,
            assignee,
            due,
            estimate,
            hours,
            tags,
            extension,
        } => {
            let mut storage = Storage::open()?;
            let patch = TaskPatch {
                title,
                description,
                status: None,
                priority: priority.as_deref().map(parse_priority).transpose()?,
                assigned_to: assignee.map(|a| {
                    if a.trim().eq_ignore_ascii_case("unassigned") {
                        None
                    } else {
                        Some(a)
                    }
                }),
                due_date: due
                    .as_deref()
                    .map(|d| {
                        if d.trim().eq_ignore_ascii_case("no_date") {
                            Ok(None)
                        } else {
                            parse_date(d).map(Some)
                        }
                    })
                    .transpose()?,
                estimated_hours: parse_hours(estimate)?,
                actual_hours: parse_hours(hours)?,
                tags,
                has_subtasks: None,
                extension: extension
                    .as_deref()
                    .map(serde_json::from_str)
                    .transpose()?,
            };
            let result = api::update_task(&mut storage, &kind, id, &patch)?;
            output(&result, human);
        }

        TaskCommands::Status { kind, id, status } => {
            let mut storage = Storage::open()?;
            let result = api::update_status(
                &mut storage,
                UpdateStatusRequest {
                    task_id: id,
                    task_type: kind,
                    status,
                },
            )?;
            output(&result, human);
        }

        TaskCommands::Batch {
            kind,
            ids,
            status,
            priority,
            assignee,
            due,
        } => {
            let mut storage = Storage::open()?;
            let result = api::batch_update(
                &mut storage,
                BatchUpdateRequest {
                    task_ids: ids,
                    task_type: kind,
                    status,
                    priority,
                    assigned_to: assignee,
                    due_date: due,
                },
            )?;
            output(&result, human);
        }

        TaskCommands::Delete { kind, id } => {
            let mut storage = Storage::open()?;
            let result = api::delete_task(&mut storage, &kind, id)?;
            output(&result, human);
        }
    }
    Ok(())
}

fn run_subtask_command(command: SubtaskCommands, human: bool) -> Result<()> {
    match command {
        SubtaskCommands::Set { kind, id, titles } => {
            let mut storage = Storage::open()?;
            let result = api::replace_subtasks(
                &mut storage,
                ReplaceSubtasksRequest {
                    task_type: kind,
                    task_id: id,
                    subtasks: titles.into_iter().map(NewSubtask::titled).collect(),
                },
            )?;
            output(&result, human);
        }

        SubtaskCommands::List { kind, id } => {
            let storage = Storage::open()?;
            let result = api::list_subtasks(&storage, &kind, id)?;
            output(&result, human);
        }

        SubtaskCommands::Toggle { subtask_id, reopen } => {
            let mut storage = Storage::open()?;
            let result = api::toggle_subtask(
                &mut storage,
                ToggleSubtaskRequest {
                    subtask_id,
                    is_completed: !reopen,
                },
            )?;
            output(&result, human);
        }
    }
    Ok(())
}

fn run_milestone_command(command: MilestoneCommands, human: bool) -> Result<()> {
    match command {
        MilestoneCommands::Create { title, due } => {
            let mut storage = Storage::open()?;
            let due = due.as_deref().map(parse_date).transpose()?;
            let result = api::create_milestone(&mut storage, &title, due)?;
            output(&result, human);
        }

        MilestoneCommands::List => {
            let storage = Storage::open()?;
            let result = api::list_milestones(&storage)?;
            output(&result, human);
        }

        MilestoneCommands::SetStatus { title, status } => {
            let mut storage = Storage::open()?;
            let result = api::set_milestone_status(&mut storage, &title, &status)?;
            output(&result, human);
        }

        MilestoneCommands::SetCurrent { title } => {
            let mut storage = Storage::open()?;
            let result = api::set_current_milestone(&mut storage, &title)?;
            output(&result, human);
        }
    }
    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| Error::MalformedRequestBody(format!("invalid date: {} (expected YYYY-MM-DD)", s)))
}

fn parse_status(s: &str) -> Result<TaskStatus> {
    TaskStatus::from_str(s).ok_or_else(|| Error::InvalidStatus(s.to_string()))
}

fn parse_priority(s: &str) -> Result<TaskPriority> {
    TaskPriority::from_str(s).ok_or_else(|| Error::InvalidPriority(s.to_string()))
}

fn parse_hours(value: Option<f64>) -> Result<Option<f64>> {
    match value {
        Some(h) if !h.is_finite() || h < 0.0 => Err(Error::InvalidNumericValue(format!(
            "hours must be a non-negative number, got {}",
            h
        ))),
        other => Ok(other),
    }
}

/// Creator attribution for new tasks, best-effort from the environment.
fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}
