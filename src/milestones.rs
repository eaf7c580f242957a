//! Milestone state machine and phase banner.
//!
//! Milestones move through `not_started -> in_progress -> completed`, with
//! direct edges back to `not_started` and `completed` from `in_progress`.
//! The system-wide invariant is that at most one milestone is
//! `in_progress` at a time; promotion demotes every other active
//! milestone inside one transaction. The active milestone's title feeds
//! the phase banner shown on every page.

use serde::{Deserialize, Serialize};

use crate::models::{Milestone, MilestoneStatus};
use crate::phases::PhaseResolver;
use crate::storage::Storage;
use crate::Result;

/// Default banner milestone when nothing is in progress.
const DEFAULT_MILESTONE_TITLE: &str = "Release First Indie Game";

/// The phase banner consumed by every page render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseBanner {
    /// Title of the active (or default) milestone
    pub milestone_title: String,
    /// Display name of the derived phase
    pub phase_name: String,
    /// Stable phase identifier
    pub phase_type: String,
    /// Position in the roadmap sequence
    pub phase_order: u8,
}

/// Promote a milestone to `in_progress` by id.
///
/// Every other in-progress milestone is demoted to `completed` with a
/// completion stamp; if legacy data had several active milestones, this
/// call repairs the invariant.
pub fn set_in_progress(storage: &mut Storage, id: i64) -> Result<Milestone> {
    storage.set_milestone_in_progress(id)
}

/// Set a milestone's status by title.
///
/// `in_progress` routes through the promoting transition; the other
/// states apply directly (completion stamps `completion_date`, anything
/// else clears it).
pub fn set_status_by_title(
    storage: &mut Storage,
    title: &str,
    status: MilestoneStatus,
) -> Result<Milestone> {
    let milestone = storage.find_milestone_by_title(title)?;
    match status {
        MilestoneStatus::InProgress => storage.set_milestone_in_progress(milestone.id),
        other => storage.set_milestone_status(milestone.id, other),
    }
}

/// Make the named milestone the current one (promote to `in_progress`).
pub fn set_current_by_title(storage: &mut Storage, title: &str) -> Result<Milestone> {
    let milestone = storage.find_milestone_by_title(title)?;
    storage.set_milestone_in_progress(milestone.id)
}

/// The currently active milestone, if any.
///
/// More than one active milestone means the invariant was violated by
/// data written outside the state machine; that is reported as a warning,
/// the first one wins, and the next promotion repairs the rest.
pub fn current(storage: &Storage) -> Result<Option<Milestone>> {
    let mut active = storage.milestones_in_progress()?;
    if active.len() > 1 {
        eprintln!(
            "warning: {} milestones in progress (expected at most one); using \"{}\"",
            active.len(),
            active[0].title
        );
    }
    Ok(if active.is_empty() {
        None
    } else {
        Some(active.remove(0))
    })
}

/// Compute the phase banner from the active milestone.
///
/// Falls back to the default indie-dev milestone when nothing is in
/// progress.
pub fn current_phase(storage: &Storage, resolver: &PhaseResolver) -> Result<PhaseBanner> {
    let title = match current(storage)? {
        Some(milestone) => milestone.title,
        None => DEFAULT_MILESTONE_TITLE.to_string(),
    };
    let phase = resolver.resolve(&title);
    Ok(PhaseBanner {
        milestone_title: title,
        phase_name: phase.name().to_string(),
        phase_type: phase.as_str().to_string(),
        phase_order: phase.order(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;
    use crate::Error;

    #[test]
    fn test_promotion_sequence() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        let m1 = storage.create_milestone("Release First Indie Game", None).unwrap();
        let promoted = set_in_progress(&mut storage, m1.id).unwrap();
        assert_eq!(promoted.status, MilestoneStatus::InProgress);

        let m2 = storage.create_milestone("Open First Arcade Location", None).unwrap();
        set_in_progress(&mut storage, m2.id).unwrap();

        let m1 = storage.get_milestone(m1.id).unwrap();
        assert_eq!(m1.status, MilestoneStatus::Completed);
        assert!(m1.completion_date.is_some());

        let active = current(&storage).unwrap().unwrap();
        assert_eq!(active.id, m2.id);
        assert_eq!(active.completion_date, None);
    }

    #[test]
    fn test_at_most_one_active_after_any_sequence() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        let ids: Vec<i64> = (0..4)
            .map(|i| {
                storage
                    .create_milestone(&format!("milestone {}", i), None)
                    .unwrap()
                    .id
            })
            .collect();

        for &id in [ids[0], ids[2], ids[1], ids[2], ids[3]].iter() {
            set_in_progress(&mut storage, id).unwrap();
            assert_eq!(storage.milestones_in_progress().unwrap().len(), 1);
        }
    }

    #[test]
    fn test_set_status_by_title_routes_in_progress() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        storage.create_milestone("a", None).unwrap();
        let b = storage.create_milestone("b", None).unwrap();
        set_in_progress(&mut storage, b.id).unwrap();

        // Setting "a" in progress by title must demote "b".
        set_status_by_title(&mut storage, "a", MilestoneStatus::InProgress).unwrap();
        let active = storage.milestones_in_progress().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "a");
        assert_eq!(
            storage.get_milestone(b.id).unwrap().status,
            MilestoneStatus::Completed
        );
    }

    #[test]
    fn test_set_status_by_title_unknown_title() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let err =
            set_status_by_title(&mut storage, "ghost", MilestoneStatus::Completed).unwrap_err();
        assert!(matches!(err, Error::RecordNotFound(_)));
    }

    #[test]
    fn test_banner_from_active_milestone() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let resolver = PhaseResolver::new();

        let m = storage
            .create_milestone("Prototype First Arcade Cabinet", None)
            .unwrap();
        set_in_progress(&mut storage, m.id).unwrap();

        let banner = current_phase(&storage, &resolver).unwrap();
        assert_eq!(banner.milestone_title, "Prototype First Arcade Cabinet");
        assert_eq!(banner.phase_type, "arcade");
        assert_eq!(banner.phase_name, "Arcade Machines");
        assert_eq!(banner.phase_order, 2);
    }

    #[test]
    fn test_banner_default_when_nothing_active() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let resolver = PhaseResolver::new();

        let banner = current_phase(&storage, &resolver).unwrap();
        assert_eq!(banner.milestone_title, "Release First Indie Game");
        assert_eq!(banner.phase_type, "indie_dev");
        assert_eq!(banner.phase_order, 1);
    }
}
