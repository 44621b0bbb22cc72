//! Error types for the stack codec
//!
//! Provides error handling for:
//! - Parse operations (file text → steps)
//! - Serialize operations (steps → file text)
//! - Command definition lookups

use cstack_model::{ModelError, StepType};

/// Errors while parsing a stack file
///
/// A parse error always rejects the whole file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Object name has no supported extension
    #[error("unsupported stack format: '{0}'")]
    UnsupportedFormat(String),

    /// XML is not well formed
    #[error("malformed xml: {0}")]
    MalformedXml(String),

    /// Required attribute missing on an XML element
    #[error("missing attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        /// Element name
        element: String,
        /// Attribute name
        attribute: String,
    },

    /// JSON is not well formed or does not match the stack schema
    #[error("malformed ycs: {0}")]
    MalformedJson(String),

    /// Step `type` tag not recognized
    #[error("unknown step type: '{0}'")]
    UnknownStepType(String),

    /// Verify comparison operator not recognized
    #[error("unknown comparison operator: '{0}'")]
    UnknownOperator(String),

    /// Option value does not fit the declared option type
    #[error("invalid value '{value}' for option '{id}'")]
    InvalidOptionValue {
        /// Option id
        id: String,
        /// Offending value
        value: String,
    },
}

impl ParseError {
    /// Create missing attribute error
    pub fn missing_attribute(element: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            element: element.into(),
            attribute: attribute.into(),
        }
    }

    /// Create invalid option value error
    pub fn invalid_option(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidOptionValue {
            id: id.into(),
            value: value.into(),
        }
    }
}

impl From<ModelError> for ParseError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnknownOperator(op) => Self::UnknownOperator(op),
            ModelError::UnknownStepType(ty) => Self::UnknownStepType(ty),
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedJson(err.to_string())
    }
}

/// Errors while serializing a stack
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SerializeError {
    /// Step type cannot be written in the target format
    #[error("step {index} ({step_type}) cannot be written as {format}")]
    UnsupportedStep {
        /// Position of the step
        index: usize,
        /// Its type
        step_type: StepType,
        /// Target format
        format: String,
    },

    /// JSON encoding failed
    #[error("json encoding failed: {0}")]
    Json(String),

    /// Formatting into the output buffer failed
    #[error("formatting failed")]
    Fmt,
}

impl From<std::fmt::Error> for SerializeError {
    fn from(_: std::fmt::Error) -> Self {
        Self::Fmt
    }
}

impl From<serde_json::Error> for SerializeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Errors from a command definition lookup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// Command is unknown to the mission database
    #[error("command not found: {0}")]
    NotFound(String),

    /// Lookup service failed
    #[error("lookup failed: {0}")]
    Service(String),
}

/// Combined codec error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Parse failure
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Serialize failure
    #[error("serialize error: {0}")]
    Serialize(#[from] SerializeError),
}

/// Result type alias for codec operations
pub type CodecResult<T> = Result<T, CodecError>;
