//! Deckhand - a multi-department task registry and milestone tracker.
//!
//! This library provides the core functionality for the `dh` CLI tool:
//! a polymorphic registry of per-department task kinds, cross-kind
//! aggregation, generic subtasks, status transitions, and the
//! single-active-milestone state machine that drives the company
//! phase banner.

pub mod aggregator;
pub mod api;
pub mod cli;
pub mod milestones;
pub mod models;
pub mod phases;
pub mod registry;
pub mod storage;
pub mod transitions;


/// Library-level error type for Deckhand operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not initialized: run `dh system init` first")]
    NotInitialized,

    #[error("Unknown task kind: {0}")]
    UnknownKind(String),

    #[error("Not found: {0}")]
    RecordNotFound(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid priority: {0}")]
    InvalidPriority(String),

    #[error("Invalid numeric value: {0}")]
    InvalidNumericValue(String),

    #[error("Malformed request body: {0}")]
    MalformedRequestBody(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// HTTP status code for this error when surfaced at the API boundary.
    ///
    /// Validation failures map to 400, missing records and unknown kinds to
    /// 404, everything else to 500.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::UnknownKind(_) | Error::RecordNotFound(_) => 404,
            Error::InvalidStatus(_)
            | Error::InvalidPriority(_)
            | Error::InvalidNumericValue(_)
            | Error::MalformedRequestBody(_) => 400,
            _ => 500,
        }
    }
}

/// Result type alias for Deckhand operations.
pub type Result<T> = std::result::Result<T, Error>;
