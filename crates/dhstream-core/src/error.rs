//! Core domain errors.

use thiserror::Error;

use crate::TaskStatus;

/// Core domain errors for dhstream.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Task not found.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: TaskStatus, to: TaskStatus },

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A field the backend must return was missing or empty.
    #[error("Missing field in response: {0}")]
    MissingField(&'static str),
}
