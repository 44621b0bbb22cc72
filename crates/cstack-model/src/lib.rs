//! Command stack model
//!
//! The in-memory representation of a command stack:
//! - **Steps**: the closed set of step variants (command, check, text, verify)
//!   together with their runtime output state
//! - **Acknowledgments**: command history records that accumulate by merge
//! - **Parameters**: the live parameter-value cache sampled by check steps
//! - **Outline**: positional numbering of headings inside text steps
//!
//! # Example
//!
//! ```rust
//! use cstack_model::prelude::*;
//!
//! let steps = vec![
//!     Step::text("# Power on"),
//!     Step::command(CommandStep::new("/YSS/SIMULATOR/SWITCH_VOLTAGE_ON")),
//!     Step::text("## Verify bus"),
//! ];
//!
//! let numbered = number_headings(&steps);
//! assert_eq!(numbered[0].as_deref(), Some("# 1 Power on"));
//! assert_eq!(numbered[2].as_deref(), Some("## 1.1 Verify bus"));
//! ```

// Core modules
pub mod ack;
pub mod advancement;
pub mod command_info;
pub mod error;
pub mod outline;
pub mod parameter;
pub mod step;
pub mod value;

// Re-exports for convenience
pub use ack::{AckStatus, Acknowledgment, CommandHistoryEntry, CommandHistoryRecord, CommandId, CommandRecords};
pub use advancement::{deserialize_millis, AdvancementOverride, AdvancementParams, DEFAULT_ACKNOWLEDGMENT};
pub use command_info::{ArgumentInfo, ArgumentType, CommandAlias, CommandInfo, EnumValue};
pub use error::ModelError;
pub use outline::{headings, number_headings, Heading};
pub use parameter::{NamedParameterValue, ParameterCache, ParameterValue};
pub use step::{
    CheckStep, CommandStep, Comparison, ComparisonOperator, ComparisonStatus, Step, StepBody,
    StepKey, StepOutput, StepType, TextStep, VerifyStep,
};
pub use value::OptionValue;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with stack steps
    pub use crate::ack::{AckStatus, Acknowledgment, CommandHistoryEntry, CommandId, CommandRecords};
    pub use crate::advancement::{AdvancementOverride, AdvancementParams};
    pub use crate::outline::number_headings;
    pub use crate::parameter::{ParameterCache, ParameterValue};
    pub use crate::step::{CheckStep, CommandStep, Step, StepBody, StepKey, StepType, TextStep, VerifyStep};
    pub use crate::value::OptionValue;
}
