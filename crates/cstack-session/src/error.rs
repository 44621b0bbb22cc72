//! Error types for stack sessions

use cstack_codec::{ParseError, SerializeError};
use cstack_engine::EngineError;
use cstack_model::{StepKey, StepType};
use std::path::PathBuf;

/// Errors from object storage
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O failure on an object
    #[error("I/O error on {name}: {source}")]
    Io {
        /// Object name
        name: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Object name escapes its bucket or is empty
    #[error("invalid object name: {0}")]
    InvalidName(String),

    /// Storage service reported an error
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Create backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Errors from session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Stack file could not be parsed
    #[error("failed to parse stack: {0}")]
    Parse(#[from] ParseError),

    /// Stack could not be serialized
    #[error("failed to serialize stack: {0}")]
    Serialize(#[from] SerializeError),

    /// Engine refused the operation
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Object does not exist
    #[error("stack not found: {bucket}/{name}")]
    NotFound {
        /// Bucket searched
        bucket: String,
        /// Object name
        name: String,
    },

    /// Object is not UTF-8 text
    #[error("stack {0} is not valid UTF-8")]
    InvalidEncoding(String),

    /// No stack loaded
    #[error("no stack loaded")]
    NotLoaded,

    /// Operation needs a selected step
    #[error("no step selected")]
    NoSelection,

    /// Step is not part of the stack
    #[error("unknown step: {0}")]
    UnknownStep(StepKey),

    /// Paste with nothing cut or copied
    #[error("clipboard is empty")]
    ClipboardEmpty,

    /// Position outside the stack
    #[error("index {index} out of range for {len} steps")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of steps
        len: usize,
    },

    /// Stack-level advancement on a format that cannot store it
    #[error("stack advancement requires the YCS format")]
    AdvancementRequiresYcs,

    /// Step type the XML format cannot store
    #[error("{0} steps require the YCS format")]
    StepRequiresYcs(StepType),

    /// Conversion of a stack that is already YCS
    #[error("stack is already in YCS format")]
    AlreadyYcs,

    /// Edit attempted during a run
    #[error("a run is in progress")]
    RunInProgress,
}

/// Errors loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for the configuration
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_object() {
        let err = SessionError::NotFound {
            bucket: "stacks".into(),
            name: "pass.ycs".into(),
        };
        assert_eq!(err.to_string(), "stack not found: stacks/pass.ycs");
    }

    #[test]
    fn storage_errors_pass_through() {
        let err: SessionError = StorageError::backend("quota exceeded").into();
        assert_eq!(err.to_string(), "storage backend error: quota exceeded");
    }
}
