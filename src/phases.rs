//! Company phase resolution.
//!
//! The company roadmap runs through three strategy phases. The current
//! phase is not stored anywhere - it is derived from the title of the
//! active milestone by keyword matching. That heuristic used to be
//! duplicated with drifting keyword lists at every call site; it lives
//! here once, as a single injected table, and everything that needs a
//! phase calls [`PhaseResolver::resolve`].

use serde::{Deserialize, Serialize};

/// A coarse company strategy stage, derived from milestone titles.
///
/// Not a stored entity: there is no referential integrity between a phase
/// and the milestone it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    IndieDev,
    Arcade,
    ThemePark,
}

impl Phase {
    /// Stable identifier used in API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::IndieDev => "indie_dev",
            Phase::Arcade => "arcade",
            Phase::ThemePark => "theme_park",
        }
    }

    /// Display name shown in the phase banner.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::IndieDev => "Indie Game Development",
            Phase::Arcade => "Arcade Machines",
            Phase::ThemePark => "Theme Park Attractions",
        }
    }

    /// Position in the roadmap sequence.
    pub fn order(&self) -> u8 {
        match self {
            Phase::IndieDev => 1,
            Phase::Arcade => 2,
            Phase::ThemePark => 3,
        }
    }
}

/// One phase's catalog: the known milestone titles belonging to it.
struct PhaseCatalog {
    phase: Phase,
    titles: &'static [&'static str],
}

/// Maps a milestone title to a company phase.
///
/// Resolution order: exact title match against the per-phase catalogs,
/// then case-insensitive substring keywords, then the indie_dev default.
pub struct PhaseResolver {
    catalogs: Vec<PhaseCatalog>,
    keywords: Vec<(&'static str, Phase)>,
    default: Phase,
}

impl PhaseResolver {
    /// Build the resolver with the standard catalog and keyword table.
    pub fn new() -> Self {
        let catalogs = vec![
            PhaseCatalog {
                phase: Phase::IndieDev,
                titles: &[
                    "Release First Indie Game",
                    "Complete Game Development Course",
                    "Build Game Portfolio",
                ],
            },
            PhaseCatalog {
                phase: Phase::Arcade,
                titles: &[
                    "Open First Arcade Location",
                    "Prototype First Arcade Cabinet",
                    "Launch First Arcade Location",
                ],
            },
            PhaseCatalog {
                phase: Phase::ThemePark,
                titles: &[
                    "Theme Park Feasibility Study",
                    "Attraction Prototype",
                    "First Attraction Launch",
                ],
            },
        ];

        // Checked in order: the specific phases win before the broad
        // indie/game keywords get a chance.
        let keywords = vec![
            ("arcade", Phase::Arcade),
            ("cabinet", Phase::Arcade),
            ("theme park", Phase::ThemePark),
            ("attraction", Phase::ThemePark),
            ("indie", Phase::IndieDev),
            ("game", Phase::IndieDev),
        ];

        Self {
            catalogs,
            keywords,
            default: Phase::IndieDev,
        }
    }

    /// Resolve a milestone title to its phase.
    pub fn resolve(&self, milestone_title: &str) -> Phase {
        for catalog in &self.catalogs {
            if catalog.titles.contains(&milestone_title) {
                return catalog.phase;
            }
        }

        let lowered = milestone_title.to_lowercase();
        for (keyword, phase) in &self.keywords {
            if lowered.contains(keyword) {
                return *phase;
            }
        }

        self.default
    }
}

impl Default for PhaseResolver {
    fn default() -> Self {
        Self::new()
    }
}
