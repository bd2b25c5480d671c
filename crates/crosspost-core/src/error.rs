//! Error types for Crosspost.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::job::JobStatus;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A guarded status transition was rejected; the job is unchanged.
    #[error("invalid transition: cannot {action} a {from} job")]
    InvalidTransition {
        from: JobStatus,
        action: &'static str,
    },

    /// Automatic dispatch attempted before the job's scheduled time.
    #[error("not due until {0}")]
    NotDue(DateTime<Utc>),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
