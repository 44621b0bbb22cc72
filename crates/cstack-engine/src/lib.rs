//! Command stack execution engine
//!
//! Runs stack steps and decides, from acknowledgment records and parameter
//! updates, when to move on to the next step.
//!
//! # Architecture
//!
//! ```text
//! EngineEvent ──► ExecutionEngine::handle(&mut StackState) ──► Vec<Effect>
//!      ▲                                                          │
//!      │        issue (CommandIssuer) / schedule (DelayScheduler) │
//!      └──────────────────────────── runtime ◄────────────────────┘
//! ```
//!
//! The engine itself is synchronous and deterministic; the runtime owns the
//! I/O and feeds results back as events, one at a time.
//!
//! # Example
//!
//! ```rust
//! use cstack_engine::prelude::*;
//! use cstack_model::{AdvancementParams, Step};
//!
//! let mut state = StackState::new(vec![Step::text("# Prepare")], AdvancementParams::default());
//! state.select_index(0);
//!
//! let mut engine = ExecutionEngine::new();
//! let effects = engine.run_selection(&mut state).unwrap();
//! assert!(matches!(effects[0], Effect::Schedule { .. }));
//! ```

// Core modules
pub mod advancement;
pub mod effect;
pub mod engine;
pub mod error;
pub mod issue;
pub mod state;
pub mod timer;

// Re-exports for convenience
pub use advancement::{classify, AckDecision, AckOutcome, AdvancementMachine, AdvancementState};
pub use effect::{Effect, EngineEvent, IssueRequest, TimerTicket};
pub use engine::{ExecutionEngine, RunMode};
pub use error::{EngineError, EngineResult, IssueError};
pub use issue::{issue, CommandIssuer};
pub use state::StackState;
pub use timer::{DelayScheduler, TimerHandle, TimerRegistry, TokioScheduler};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving stack runs
    pub use crate::effect::{Effect, EngineEvent, IssueRequest, TimerTicket};
    pub use crate::engine::{ExecutionEngine, RunMode};
    pub use crate::error::{EngineError, IssueError};
    pub use crate::issue::CommandIssuer;
    pub use crate::state::StackState;
    pub use crate::timer::{DelayScheduler, TimerRegistry, TokioScheduler};
}
