//! Advancement state machine
//!
//! Decides whether and when a run moves past the current step. It is purely
//! reactive: the engine feeds it acknowledgment records and timer outcomes,
//! it never polls and never times out an acknowledgment wait.
//!
//! ```text
//! Idle ──► AwaitingAcknowledgment ──► Continuing ──► (next step) ...
//!   │               │
//!   │               └──► Stopped
//!   └────► AwaitingCondition ──► Continuing
//! ```

use crate::effect::TimerTicket;
use cstack_model::{AckStatus, AdvancementParams, CommandHistoryRecord, StepKey};

/// Classification of an acknowledgment status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    /// `OK` or `DISABLED`
    Continue,
    /// `NOK` or `CANCELLED`
    Stop,
    /// Anything else
    Pending,
}

/// Classify a status into the continue-set, the stop-set, or neither
#[must_use]
pub fn classify(status: &AckStatus) -> AckDecision {
    match status {
        AckStatus::Ok | AckStatus::Disabled => AckDecision::Continue,
        AckStatus::Nok | AckStatus::Cancelled => AckDecision::Stop,
        AckStatus::Pending | AckStatus::Other(_) => AckDecision::Pending,
    }
}

/// State of the machine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AdvancementState {
    /// Nothing in flight
    #[default]
    Idle,
    /// Command issued, waiting for the named acknowledgment
    AwaitingAcknowledgment {
        /// Step waiting
        key: StepKey,
        /// Effective criteria
        criteria: AdvancementParams,
    },
    /// Verify step waiting for its condition
    AwaitingCondition {
        /// Step waiting
        key: StepKey,
    },
    /// Advancement scheduled
    Continuing {
        /// Step being left
        key: StepKey,
        /// Pending delay
        ticket: TimerTicket,
    },
    /// Run halted by a stop acknowledgment or a failure
    Stopped,
}

/// Outcome of feeding a record to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// Record is not for the awaited step, or advancement is already scheduled
    Ignored,
    /// Awaited acknowledgment absent or not decisive yet
    Waiting,
    /// Continue after `wait` milliseconds
    Continue {
        /// Delay in milliseconds
        wait: u64,
    },
    /// Halt the run
    Stop {
        /// Acknowledgment that carried the stop status
        acknowledgment: String,
    },
}

/// The advancement state machine
#[derive(Debug, Clone, Default)]
pub struct AdvancementMachine {
    state: AdvancementState,
}

impl AdvancementMachine {
    /// Machine in `Idle`
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &AdvancementState {
        &self.state
    }

    /// True once advancement is scheduled
    #[inline]
    #[must_use]
    pub fn is_continuing(&self) -> bool {
        matches!(self.state, AdvancementState::Continuing { .. })
    }

    /// Wait for an acknowledgment of a command step
    pub fn await_acknowledgment(&mut self, key: StepKey, criteria: AdvancementParams) {
        self.state = AdvancementState::AwaitingAcknowledgment { key, criteria };
    }

    /// Wait for a verify condition
    pub fn await_condition(&mut self, key: StepKey) {
        self.state = AdvancementState::AwaitingCondition { key };
    }

    /// Evaluate a record for the awaited step
    ///
    /// On a stop status the machine moves to `Stopped`. On a continue status
    /// it stays put until [`continue_after`](Self::continue_after) records
    /// the scheduled delay.
    pub fn on_record(&mut self, key: StepKey, record: &CommandHistoryRecord) -> AckOutcome {
        let AdvancementState::AwaitingAcknowledgment {
            key: awaited,
            criteria,
        } = &self.state
        else {
            return AckOutcome::Ignored;
        };
        if *awaited != key {
            return AckOutcome::Ignored;
        }

        let Some(ack) = record.acknowledgment(&criteria.acknowledgment) else {
            return AckOutcome::Waiting;
        };
        match classify(&ack.status) {
            AckDecision::Continue => AckOutcome::Continue {
                wait: criteria.wait,
            },
            AckDecision::Stop => {
                let acknowledgment = criteria.acknowledgment.clone();
                self.state = AdvancementState::Stopped;
                AckOutcome::Stop { acknowledgment }
            }
            AckDecision::Pending => AckOutcome::Waiting,
        }
    }

    /// Record the delay scheduled before leaving `key`
    pub fn continue_after(&mut self, key: StepKey, ticket: TimerTicket) {
        self.state = AdvancementState::Continuing { key, ticket };
    }

    /// Scheduled delay, if advancement is pending
    #[must_use]
    pub fn pending_ticket(&self) -> Option<TimerTicket> {
        match self.state {
            AdvancementState::Continuing { ticket, .. } => Some(ticket),
            _ => None,
        }
    }

    /// Halt after a failure or a stop acknowledgment
    pub fn stop(&mut self) {
        self.state = AdvancementState::Stopped;
    }

    /// Return to `Idle`
    pub fn reset(&mut self) {
        self.state = AdvancementState::Idle;
    }
}
