//! Execution engine
//!
//! Runs steps against a [`StackState`]. Every operation is synchronous and
//! returns the [`Effect`]s the runtime must perform; outcomes come back
//! through [`ExecutionEngine::handle`].
//!
//! Step semantics:
//! - **command**: issue, then wait for the effective acknowledgment
//! - **check**: sample the listed parameters, then advance after the stack wait
//! - **text**: advance immediately
//! - **verify**: re-evaluate on every parameter update until the condition
//!   holds (advance) or the timeout elapses (fail and stop)

use crate::advancement::{AckOutcome, AdvancementMachine};
use crate::effect::{Effect, EngineEvent, IssueRequest, TimerTicket};
use crate::error::{EngineError, EngineResult};
use crate::state::StackState;
use cstack_model::{
    CommandHistoryEntry, CommandId, ComparisonStatus, ParameterValue, StepBody, StepKey,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How a run proceeds after the current step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// No run in progress
    #[default]
    Idle,
    /// Run the selected step, advance the selection, stop
    Single,
    /// Keep running until the end of the stack or a stop condition
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerPurpose {
    Advance { key: StepKey },
    VerifyDelay { key: StepKey },
    VerifyTimeout { key: StepKey, timeout: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    key: StepKey,
    execution_number: u64,
}

#[derive(Debug, Clone, Copy)]
struct VerifyWait {
    key: StepKey,
    armed: bool,
    timeout_ticket: Option<TimerTicket>,
}

/// Drives step execution and advancement
#[derive(Debug, Default)]
pub struct ExecutionEngine {
    machine: AdvancementMachine,
    execution_counter: u64,
    next_ticket: u64,
    timers: BTreeMap<TimerTicket, TimerPurpose>,
    mode: RunMode,
    in_flight: Option<InFlight>,
    verify: Option<VerifyWait>,
}

impl ExecutionEngine {
    /// Idle engine with a zero execution counter
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current run mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// True while a run is in progress
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.mode != RunMode::Idle
    }

    /// Advancement state machine
    #[inline]
    #[must_use]
    pub fn machine(&self) -> &AdvancementMachine {
        &self.machine
    }

    /// Number of step executions since the last reset
    #[inline]
    #[must_use]
    pub fn execution_counter(&self) -> u64 {
        self.execution_counter
    }

    /// Restart execution numbering
    pub fn reset_counter(&mut self) {
        self.execution_counter = 0;
    }

    /// Number of outstanding delays
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Run the selected step only
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyRunning`] while a run is active,
    /// [`EngineError::NoSelection`] when no step is selected.
    pub fn run_selection(&mut self, state: &mut StackState) -> EngineResult<Vec<Effect>> {
        self.start(state, RunMode::Single)
    }

    /// Run from the selected step to the end of the stack
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyRunning`] while a run is active,
    /// [`EngineError::NoSelection`] when no step is selected.
    pub fn run_from_selection(&mut self, state: &mut StackState) -> EngineResult<Vec<Effect>> {
        self.start(state, RunMode::Continuous)
    }

    fn start(&mut self, state: &mut StackState, mode: RunMode) -> EngineResult<Vec<Effect>> {
        if self.is_running() {
            return Err(EngineError::AlreadyRunning);
        }
        let key = state
            .selected()
            .map(cstack_model::Step::key)
            .ok_or(EngineError::NoSelection)?;

        info!(step = %key, ?mode, "Starting run");
        self.machine.reset();
        self.mode = mode;

        let mut effects = Vec::new();
        self.execute_step(state, key, &mut effects);
        Ok(effects)
    }

    /// Halt the run
    ///
    /// Cancels every pending delay, clears the executing flag of every step and
    /// marks pending verify comparisons as cancelled. Safe to call when idle.
    pub fn stop_run(&mut self, state: &mut StackState) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.is_running() {
            info!("Stopping run");
        }
        self.halt(state, &mut effects);
        self.machine.reset();
        effects
    }

    /// Apply an event from the runtime
    pub fn handle(&mut self, state: &mut StackState, event: EngineEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            EngineEvent::IssueSucceeded {
                key,
                execution_number,
                id,
            } => self.on_issue_succeeded(state, key, execution_number, id, &mut effects),
            EngineEvent::IssueFailed {
                key,
                execution_number,
                message,
            } => self.on_issue_failed(state, key, execution_number, message, &mut effects),
            EngineEvent::HistoryUpdated(entry) => self.on_history(state, entry, &mut effects),
            EngineEvent::ParametersUpdated(batch) => {
                self.on_parameters(state, batch, &mut effects);
            }
            EngineEvent::TimerFired(ticket) => self.on_timer(state, ticket, &mut effects),
        }
        effects
    }

    fn execute_step(&mut self, state: &mut StackState, key: StepKey, effects: &mut Vec<Effect>) {
        self.execution_counter += 1;
        let execution_number = self.execution_counter;

        let Some(step) = state.step_mut(key) else {
            warn!(step = %key, "Step vanished before execution");
            self.halt(state, effects);
            self.machine.reset();
            return;
        };
        step.clear_outputs();
        let output = step.output_mut();
        output.execution_number = Some(execution_number);
        output.executing = true;
        debug!(step = %key, execution_number, kind = %step.step_type(), "Executing step");
        let body = step.body().clone();

        match body {
            StepBody::Command(cmd) => {
                let criteria = state.advancement.resolve(cmd.advancement.as_ref());
                let request = IssueRequest {
                    key,
                    execution_number,
                    namespace: cmd.namespace,
                    name: cmd.name,
                    args: cmd.args,
                    extra: cmd.extra,
                };
                self.in_flight = Some(InFlight {
                    key,
                    execution_number,
                });
                self.machine.await_acknowledgment(key, criteria);
                effects.push(Effect::Issue(request));
            }
            StepBody::Check(check) => {
                let snapshot = state
                    .parameters
                    .snapshot(check.parameters.iter().map(String::as_str));
                if let Some(step) = state.step_mut(key) {
                    step.output_mut().snapshot = snapshot;
                }
                let wait = state.advancement.wait;
                self.continue_after(key, wait, effects);
            }
            StepBody::Text(_) => self.continue_after(key, 0, effects),
            StepBody::Verify(verify) => {
                let delay = verify.delay.unwrap_or(0);
                let timeout = verify.timeout.unwrap_or(0);
                if let Some(step) = state.step_mut(key) {
                    step.output_mut().verify_results =
                        vec![ComparisonStatus::Pending; verify.condition.len()];
                }

                self.machine.await_condition(key);
                let timeout_ticket = (timeout > 0).then(|| {
                    self.schedule(
                        TimerPurpose::VerifyTimeout { key, timeout },
                        delay.saturating_add(timeout),
                        effects,
                    )
                });
                self.verify = Some(VerifyWait {
                    key,
                    armed: false,
                    timeout_ticket,
                });
                if delay > 0 {
                    self.schedule(TimerPurpose::VerifyDelay { key }, delay, effects);
                } else {
                    self.arm_verify(state, effects);
                }
            }
        }
    }

    fn on_issue_succeeded(
        &mut self,
        state: &mut StackState,
        key: StepKey,
        execution_number: u64,
        id: CommandId,
        effects: &mut Vec<Effect>,
    ) {
        let record = state.records.get(&id).cloned();
        let Some(step) = state
            .step_mut(key)
            .filter(|s| s.output().execution_number == Some(execution_number))
        else {
            debug!(step = %key, execution_number, "Ignoring stale issue response");
            return;
        };

        debug!(step = %key, id = %id, "Command issued");
        let output = step.output_mut();
        output.id = Some(id);
        if record.is_some() {
            output.record = record;
        }

        if self.in_flight
            == Some(InFlight {
                key,
                execution_number,
            })
        {
            self.evaluate_record(state, key, effects);
        }
    }

    fn on_issue_failed(
        &mut self,
        state: &mut StackState,
        key: StepKey,
        execution_number: u64,
        message: String,
        effects: &mut Vec<Effect>,
    ) {
        let Some(step) = state
            .step_mut(key)
            .filter(|s| s.output().execution_number == Some(execution_number))
        else {
            debug!(step = %key, execution_number, "Ignoring stale issue failure");
            return;
        };

        warn!(step = %key, error = %message, "Command issuance failed");
        let output = step.output_mut();
        output.err = Some(message);
        output.executing = false;

        if self.in_flight
            == Some(InFlight {
                key,
                execution_number,
            })
        {
            self.machine.stop();
            self.halt(state, effects);
        }
    }

    fn on_history(
        &mut self,
        state: &mut StackState,
        entry: CommandHistoryEntry,
        effects: &mut Vec<Effect>,
    ) {
        let id = entry.id.clone();
        let record = state.records.merge(entry).clone();

        let Some(step) = state
            .steps
            .iter_mut()
            .find(|s| s.output().id.as_ref() == Some(&id))
        else {
            debug!(id = %id, "No step for command history update");
            return;
        };
        step.output_mut().record = Some(record);
        let key = step.key();

        if self.is_running() && self.in_flight.is_some_and(|f| f.key == key) {
            self.evaluate_record(state, key, effects);
        }
    }

    fn evaluate_record(&mut self, state: &mut StackState, key: StepKey, effects: &mut Vec<Effect>) {
        let Some(record) = state.step(key).and_then(|s| s.output().record.as_ref()) else {
            return;
        };

        match self.machine.on_record(key, record) {
            AckOutcome::Ignored | AckOutcome::Waiting => {}
            AckOutcome::Continue { wait } => {
                debug!(step = %key, wait, "Acknowledgment reached, continuing");
                self.continue_after(key, wait, effects);
            }
            AckOutcome::Stop { acknowledgment } => {
                warn!(step = %key, acknowledgment = %acknowledgment, "Stop acknowledgment, halting run");
                if let Some(step) = state.step_mut(key) {
                    step.output_mut().halted_on = Some(acknowledgment);
                }
                self.halt(state, effects);
            }
        }
    }

    fn on_parameters(
        &mut self,
        state: &mut StackState,
        batch: Vec<(String, ParameterValue)>,
        effects: &mut Vec<Effect>,
    ) {
        state.parameters.apply(batch);
        self.evaluate_verify(state, effects);
    }

    fn on_timer(&mut self, state: &mut StackState, ticket: TimerTicket, effects: &mut Vec<Effect>) {
        let Some(purpose) = self.timers.remove(&ticket) else {
            debug!(%ticket, "Ignoring stale timer");
            return;
        };

        match purpose {
            TimerPurpose::Advance { key } => {
                if let Some(step) = state.step_mut(key) {
                    step.output_mut().executing = false;
                }
                self.in_flight = None;
                let next = state.advance_selection(key);
                match (self.mode, next) {
                    (RunMode::Continuous, Some(next)) => self.execute_step(state, next, effects),
                    _ => {
                        info!("Run finished");
                        self.halt(state, effects);
                        self.machine.reset();
                    }
                }
            }
            TimerPurpose::VerifyDelay { key } => {
                if self.verify.is_some_and(|w| w.key == key) {
                    self.arm_verify(state, effects);
                }
            }
            TimerPurpose::VerifyTimeout { key, timeout } => {
                warn!(step = %key, timeout, "Verify condition timed out");
                self.verify = None;
                if let Some(step) = state.step_mut(key) {
                    let output = step.output_mut();
                    output.err = Some(format!("condition not satisfied within {timeout} ms"));
                    output.executing = false;
                }
                self.machine.stop();
                self.halt(state, effects);
            }
        }
    }

    fn arm_verify(&mut self, state: &mut StackState, effects: &mut Vec<Effect>) {
        if let Some(wait) = self.verify.as_mut() {
            wait.armed = true;
        }
        self.evaluate_verify(state, effects);
    }

    fn evaluate_verify(&mut self, state: &mut StackState, effects: &mut Vec<Effect>) {
        let Some(wait) = self.verify.filter(|w| w.armed) else {
            return;
        };
        let Some(index) = state.index_of(wait.key) else {
            return;
        };
        let StepBody::Verify(verify) = state.steps[index].body() else {
            return;
        };

        let parameters = &state.parameters;
        let results = verify.evaluate(|name| parameters.get(name));
        let satisfied = results.iter().all(|r| *r == ComparisonStatus::Satisfied);
        state.steps[index].output_mut().verify_results = results;

        if satisfied {
            debug!(step = %wait.key, "Verify condition satisfied");
            self.verify = None;
            if let Some(ticket) = wait.timeout_ticket {
                self.cancel(ticket, effects);
            }
            self.continue_after(wait.key, 0, effects);
        }
    }

    fn continue_after(&mut self, key: StepKey, wait: u64, effects: &mut Vec<Effect>) {
        let ticket = self.schedule(TimerPurpose::Advance { key }, wait, effects);
        self.machine.continue_after(key, ticket);
    }

    fn schedule(
        &mut self,
        purpose: TimerPurpose,
        delay_ms: u64,
        effects: &mut Vec<Effect>,
    ) -> TimerTicket {
        self.next_ticket += 1;
        let ticket = TimerTicket(self.next_ticket);
        self.timers.insert(ticket, purpose);
        effects.push(Effect::Schedule {
            ticket,
            delay: Duration::from_millis(delay_ms),
        });
        ticket
    }

    fn cancel(&mut self, ticket: TimerTicket, effects: &mut Vec<Effect>) {
        if self.timers.remove(&ticket).is_some() {
            effects.push(Effect::Cancel(ticket));
        }
    }

    /// Everything `stop_run` does except resetting the machine
    fn halt(&mut self, state: &mut StackState, effects: &mut Vec<Effect>) {
        effects.extend(
            std::mem::take(&mut self.timers)
                .into_keys()
                .map(Effect::Cancel),
        );
        self.mode = RunMode::Idle;
        self.in_flight = None;
        self.verify = None;

        for step in &mut state.steps {
            let output = step.output_mut();
            output.executing = false;
            for result in &mut output.verify_results {
                if *result == ComparisonStatus::Pending {
                    *result = ComparisonStatus::Cancelled;
                }
            }
        }
    }
}
