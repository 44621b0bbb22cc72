//! Engine inputs and outputs
//!
//! The engine never performs I/O. Operations return [`Effect`]s for a runtime
//! to carry out, and the runtime reports outcomes back as [`EngineEvent`]s.

use cstack_model::{CommandHistoryEntry, CommandId, OptionValue, ParameterValue, StepKey};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Identifies one scheduled delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerTicket(pub u64);

impl fmt::Display for TimerTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// A command to hand to the issuance service
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRequest {
    /// Step issuing the command
    pub key: StepKey,
    /// Execution number of this run of the step, sent as sequence number
    pub execution_number: u64,
    /// Alias namespace
    pub namespace: Option<String>,
    /// Command name
    pub name: String,
    /// Argument values
    pub args: IndexMap<String, Value>,
    /// Protocol options
    pub extra: IndexMap<String, OptionValue>,
}

/// Instruction for the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Issue a command and report the outcome
    Issue(IssueRequest),
    /// Deliver [`EngineEvent::TimerFired`] after the delay
    Schedule {
        /// Ticket to deliver
        ticket: TimerTicket,
        /// Delay
        delay: Duration,
    },
    /// Drop a scheduled delay
    Cancel(TimerTicket),
}

/// Input delivered to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Issuance call resolved
    IssueSucceeded {
        /// Step that issued
        key: StepKey,
        /// Execution number of the issuing run
        execution_number: u64,
        /// Returned command id
        id: CommandId,
    },
    /// Issuance call failed
    IssueFailed {
        /// Step that issued
        key: StepKey,
        /// Execution number of the issuing run
        execution_number: u64,
        /// Failure message
        message: String,
    },
    /// Command history update
    HistoryUpdated(CommandHistoryEntry),
    /// Batch of parameter values
    ParametersUpdated(Vec<(String, ParameterValue)>),
    /// Scheduled delay elapsed
    TimerFired(TimerTicket),
}
