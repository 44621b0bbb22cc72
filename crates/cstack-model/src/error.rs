//! Error types for the stack model

/// Errors raised when building model values from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Comparison operator is not one of eq, neq, lt, lte, gt, gte
    #[error("unknown comparison operator: '{0}'")]
    UnknownOperator(String),

    /// Step type tag is not one of command, check, text, verify
    #[error("unknown step type: '{0}'")]
    UnknownStepType(String),
}
