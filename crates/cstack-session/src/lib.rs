//! Command stack sessions
//!
//! The top-level owner of a loaded stack. A [`StackSession`] holds the steps
//! and their editing state and persists them through [`ObjectStorage`]; a
//! [`SessionRuntime`] connects it to command issuance, timers and the
//! acknowledgment and parameter feeds.
//!
//! # Example
//!
//! ```rust
//! use cstack_session::prelude::*;
//! use cstack_model::Step;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let storage = Arc::new(MemoryStorage::new());
//! let mut session = StackSession::new(SessionConfig::default(), storage.clone());
//!
//! session.create("ops/pass.ycs").unwrap();
//! session.insert(Step::text("# Power on")).unwrap();
//! session.save().await.unwrap();
//!
//! assert!(!session.is_dirty());
//! assert!(storage.object("stacks", "ops/pass.ycs").is_some());
//! # });
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod runtime;
pub mod session;
pub mod storage;

// Re-exports for convenience
pub use config::SessionConfig;
pub use error::{ConfigError, SessionError, SessionResult, StorageError};
pub use runtime::SessionRuntime;
pub use session::StackSession;
pub use storage::{FsStorage, MemoryStorage, ObjectStorage};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for opening, editing and running stacks
    pub use crate::config::SessionConfig;
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::runtime::SessionRuntime;
    pub use crate::session::StackSession;
    pub use crate::storage::{FsStorage, MemoryStorage, ObjectStorage};
}
