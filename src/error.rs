// src/error.rs
// Top-level error type for boundary-crossing failures.

use thiserror::Error;

/// Errors surfaced at component boundaries (scheduler loop, runners, bot
/// handlers). Internal plumbing uses `anyhow::Result`; this enum exists for
/// the handful of cases callers need to branch on.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("language agent continuation expired")]
    ContinuationExpired,

    #[error("language agent error: {0}")]
    Agent(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;
