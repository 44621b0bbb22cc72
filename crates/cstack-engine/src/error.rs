//! Error types for the execution engine

use cstack_model::StepKey;

/// Errors returned by engine operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// No step is selected
    #[error("no step selected")]
    NoSelection,

    /// A run is already in progress
    #[error("a run is already in progress")]
    AlreadyRunning,

    /// Step is not part of the stack
    #[error("unknown step: {0}")]
    UnknownStep(StepKey),
}

/// Errors from the command issuance service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssueError {
    /// Service refused the command
    #[error("{0}")]
    Rejected(String),

    /// Service could not be reached
    #[error("command service unavailable: {0}")]
    Unavailable(String),
}

impl IssueError {
    /// Create rejection error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
