//! Task kind registry.
//!
//! Every department stores its tasks in an independent partition; the
//! registry is the single place that maps an inbound kind key (in any of
//! its historical spellings) to the canonical kind and its schema. Callers
//! never hold duplicate entries for the same kind - normalization happens
//! in [`TaskKindRegistry::resolve`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{TaskPriority, TaskStatus};
use crate::{Error, Result};

/// One of the closed set of task categories.
///
/// `Game` is the legacy pre-split kind kept alive for old records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    R1d3,
    GameDevelopment,
    Education,
    SocialMedia,
    Arcade,
    ThemePark,
    Game,
}

impl TaskKind {
    /// All kinds, in registration order.
    pub const ALL: [TaskKind; 7] = [
        TaskKind::R1d3,
        TaskKind::GameDevelopment,
        TaskKind::Education,
        TaskKind::SocialMedia,
        TaskKind::Arcade,
        TaskKind::ThemePark,
        TaskKind::Game,
    ];

    /// Canonical snake_case key.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::R1d3 => "r1d3",
            TaskKind::GameDevelopment => "game_development",
            TaskKind::Education => "education",
            TaskKind::SocialMedia => "social_media",
            TaskKind::Arcade => "arcade",
            TaskKind::ThemePark => "theme_park",
            TaskKind::Game => "game",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Schema and dispatch data for one registered kind.
#[derive(Debug, Clone)]
pub struct KindSpec {
    /// Canonical kind
    pub kind: TaskKind,
    /// Human-readable section name
    pub display_name: &'static str,
    /// Storage partition (SQLite table) for this kind
    pub table: &'static str,
    /// Accepted legacy/alternate spellings, already lowercase
    pub aliases: &'static [&'static str],
}

impl KindSpec {
    /// Statuses accepted by this kind.
    ///
    /// All kinds share the core status enum; per-kind differences live in
    /// the extension payload, not the schema.
    pub fn statuses(&self) -> &'static [TaskStatus] {
        &TaskStatus::ALL
    }

    /// Priorities accepted by this kind.
    pub fn priorities(&self) -> &'static [TaskPriority] {
        &TaskPriority::ALL
    }
}

/// Registry mapping kind keys to their specs.
///
/// Built once at startup; lookup only, no side effects.
#[derive(Debug)]
pub struct TaskKindRegistry {
    specs: Vec<KindSpec>,
}

impl TaskKindRegistry {
    /// Build the registry with every known kind registered.
    pub fn new() -> Self {
        let specs = vec![
            KindSpec {
                kind: TaskKind::R1d3,
                display_name: "R1D3 Task",
                table: "tasks_r1d3",
                aliases: &["r1d3task"],
            },
            KindSpec {
                kind: TaskKind::GameDevelopment,
                display_name: "Game Development Task",
                table: "tasks_game_development",
                aliases: &["gamedevelopmenttask", "games", "game_dev"],
            },
            KindSpec {
                kind: TaskKind::Education,
                display_name: "Education Task",
                table: "tasks_education",
                aliases: &["educationtask"],
            },
            KindSpec {
                kind: TaskKind::SocialMedia,
                display_name: "Social Media Task",
                table: "tasks_social_media",
                aliases: &["socialmediatask"],
            },
            KindSpec {
                kind: TaskKind::Arcade,
                display_name: "Arcade Task",
                table: "tasks_arcade",
                aliases: &["arcadetask"],
            },
            KindSpec {
                kind: TaskKind::ThemePark,
                display_name: "Theme Park Task",
                table: "tasks_theme_park",
                aliases: &["themeparktask"],
            },
            KindSpec {
                kind: TaskKind::Game,
                display_name: "Game Task (legacy)",
                table: "tasks_game",
                aliases: &["gametask"],
            },
        ];
        Self { specs }
    }

    /// Resolve an inbound kind key to its canonical kind.
    ///
    /// Input is trimmed and lowercased, then matched against the canonical
    /// key and every registered alias. Returns [`Error::UnknownKind`] when
    /// nothing matches.
    pub fn resolve(&self, key: &str) -> Result<TaskKind> {
        let normalized = key.trim().to_lowercase();
        self.specs
            .iter()
            .find(|spec| {
                spec.kind.as_str() == normalized || spec.aliases.contains(&normalized.as_str())
            })
            .map(|spec| spec.kind)
            .ok_or_else(|| Error::UnknownKind(key.to_string()))
    }

    /// Schema and dispatch data for a kind.
    pub fn spec(&self, kind: TaskKind) -> &KindSpec {
        // Every TaskKind variant is registered in new(); the linear scan
        // over seven entries is not worth an index.
        self.specs
            .iter()
            .find(|spec| spec.kind == kind)
            .unwrap_or(&self.specs[0])
    }

    /// All registered kinds, in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = TaskKind> + '_ {
        self.specs.iter().map(|spec| spec.kind)
    }
}

impl Default for TaskKindRegistry {
    fn default() -> Self {
        Self::new()
    }
}
