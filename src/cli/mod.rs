//! CLI argument definitions for Deckhand.

use clap::{Parser, Subcommand};

/// Deckhand - a multi-department task registry and milestone tracker.
///
/// Output is JSON by default; pass -H for human-readable text.
#[derive(Parser, Debug)]
#[command(name = "dh")]
#[command(author, version, about = "Track tasks, subtasks, and milestones across departments", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Task management commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Subtask management commands
    Subtask {
        #[command(subcommand)]
        command: SubtaskCommands,
    },

    /// Milestone management commands
    Milestone {
        #[command(subcommand)]
        command: MilestoneCommands,
    },

    /// Show the current company phase banner
    Phase,

    /// System administration commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a new task in a department
    Create {
        /// Task kind (department), e.g. arcade, education, theme_park
        kind: String,

        /// Task title
        title: String,

        /// Task description
        #[arg(short, long)]
        description: Option<String>,

        /// Priority (low, medium, high, critical)
        #[arg(short, long)]
        priority: Option<String>,

        /// Initial status (defaults to to_do)
        #[arg(short, long)]
        status: Option<String>,

        /// Assignee
        #[arg(short, long)]
        assignee: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// Estimated hours
        #[arg(short, long, allow_negative_numbers = true)]
        estimate: Option<f64>,

        /// Free-text tags
        #[arg(short, long)]
        tags: Option<String>,

        /// Kind-specific extension payload as inline JSON
        #[arg(short = 'x', long)]
        extension: Option<String>,
    },

    /// List tasks across all departments, merged and sorted
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,

        /// Filter by priority
        #[arg(long)]
        priority: Option<String>,

        /// Filter by assignee ("unassigned" for tasks with none)
        #[arg(long)]
        assignee: Option<String>,

        /// Filter by due bucket (overdue, today, this_week, next_week,
        /// this_month, no_date)
        #[arg(long)]
        due: Option<String>,

        /// Case-insensitive search over title and description
        #[arg(long)]
        search: Option<String>,

        /// Restrict to one task kind
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Show one task
    Show {
        /// Task kind
        kind: String,

        /// Task id within its kind
        id: i64,
    },

    /// Update task fields
    Update {
        /// Task kind
        kind: String,

        /// Task id within its kind
        id: i64,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New priority
        #[arg(short, long)]
        priority: Option<String>,

        /// New assignee ("unassigned" to clear)
        #[arg(short, long)]
        assignee: Option<String>,

        /// New due date, YYYY-MM-DD ("no_date" to clear)
        #[arg(long)]
        due: Option<String>,

        /// Estimated hours
        #[arg(short, long, allow_negative_numbers = true)]
        estimate: Option<f64>,

        /// Logged hours
        #[arg(long, allow_negative_numbers = true)]
        hours: Option<f64>,

        /// Free-text tags
        #[arg(short, long)]
        tags: Option<String>,

        /// Kind-specific extension payload as inline JSON
        #[arg(short = 'x', long)]
        extension: Option<String>,
    },

    /// Change a task's status
    Status {
        /// Task kind
        kind: String,

        /// Task id within its kind
        id: i64,

        /// New status (backlog, to_do, in_progress, in_review, done, blocked)
        status: String,
    },

    /// Apply the same update to several tasks of one kind
    Batch {
        /// Task kind
        kind: String,

        /// Task ids within the kind
        #[arg(required = true)]
        ids: Vec<i64>,

        /// New status
        #[arg(long)]
        status: Option<String>,

        /// New priority
        #[arg(long)]
        priority: Option<String>,

        /// New assignee ("unassigned" to clear)
        #[arg(long)]
        assignee: Option<String>,

        /// New due date, YYYY-MM-DD ("no_date" to clear)
        #[arg(long)]
        due: Option<String>,
    },

    /// Delete a task and its subtasks
    Delete {
        /// Task kind
        kind: String,

        /// Task id within its kind
        id: i64,
    },
}

/// Subtask subcommands
#[derive(Subcommand, Debug)]
pub enum SubtaskCommands {
    /// Replace the full subtask list of a parent task
    Set {
        /// Parent task kind
        kind: String,

        /// Parent task id within its kind
        id: i64,

        /// Subtask titles, in order (blank titles are dropped)
        titles: Vec<String>,
    },

    /// List the subtasks of a parent task
    List {
        /// Parent task kind
        kind: String,

        /// Parent task id within its kind
        id: i64,
    },

    /// Mark one subtask complete or reopen it
    Toggle {
        /// Subtask id
        subtask_id: i64,

        /// Reopen instead of completing
        #[arg(long)]
        reopen: bool,
    },
}

/// Milestone subcommands
#[derive(Subcommand, Debug)]
pub enum MilestoneCommands {
    /// Create a milestone
    Create {
        /// Milestone title
        title: String,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },

    /// List all milestones
    List,

    /// Set a milestone's status by title
    SetStatus {
        /// Milestone title
        title: String,

        /// New status (not_started, in_progress, completed)
        status: String,
    },

    /// Make the named milestone the single active one
    SetCurrent {
        /// Milestone title
        title: String,
    },
}

/// System subcommands
#[derive(Subcommand, Debug)]
pub enum SystemCommands {
    /// Initialize the tracker database
    Init,
}
