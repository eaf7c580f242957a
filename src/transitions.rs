//! Status transition service.
//!
//! Validated status changes for task records of any kind. The kind key
//! comes in as a raw string (an alias or canonical name), the status as
//! its storage spelling; both are validated before anything is written,
//! so a rejected transition leaves the record untouched.

use crate::models::{TaskPatch, TaskRecord, TaskStatus};
use crate::storage::Storage;
use crate::{Error, Result};

/// Change a task's status, dispatching on a raw kind key.
///
/// Resolution failures map to the caller-facing taxonomy: an unknown
/// kind key is `UnknownKind`, a status outside the kind's vocabulary is
/// `InvalidStatus` (naming the allowed values), and a missing record is
/// `RecordNotFound`. The updated record is returned with its `updated_at`
/// refreshed.
pub fn set_status(
    storage: &mut Storage,
    kind_key: &str,
    id: i64,
    new_status: &str,
) -> Result<TaskRecord> {
    let kind = storage.registry().resolve(kind_key)?;

    let allowed = storage.registry().spec(kind).statuses();
    let status = TaskStatus::from_str(new_status)
        .filter(|s| allowed.contains(s))
        .ok_or_else(|| {
            Error::InvalidStatus(format!(
                "invalid status \"{}\" for {} (expected one of: {})",
                new_status,
                kind,
                allowed
                    .iter()
                    .map(TaskStatus::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

    let patch = TaskPatch {
        status: Some(status),
        ..TaskPatch::default()
    };
    storage.update_task(kind, id, &patch)
}
