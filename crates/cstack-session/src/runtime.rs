//! Async run loop
//!
//! Performs the engine's effects and funnels every outcome back through one
//! channel, so events reach the session strictly one at a time:
//! - issuance calls run as spawned tasks and report `IssueSucceeded`/`IssueFailed`
//! - delays run as tokio timers and report `TimerFired`
//! - acknowledgment and parameter feeds push through [`SessionRuntime::sender`]

use crate::error::SessionResult;
use crate::session::StackSession;
use cstack_engine::{issue, CommandIssuer, Effect, EngineEvent, TimerRegistry, TokioScheduler};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Drives a session against live collaborators
pub struct SessionRuntime {
    session: StackSession,
    issuer: Arc<dyn CommandIssuer>,
    scheduler: TokioScheduler,
    timers: TimerRegistry,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl SessionRuntime {
    /// Runtime for a session
    #[must_use]
    pub fn new(session: StackSession, issuer: Arc<dyn CommandIssuer>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            session,
            issuer,
            scheduler: TokioScheduler::new(events_tx.clone()),
            timers: TimerRegistry::new(),
            events_tx,
            events_rx,
        }
    }

    /// Sender for acknowledgment and parameter updates
    #[must_use]
    pub fn sender(&self) -> mpsc::UnboundedSender<EngineEvent> {
        self.events_tx.clone()
    }

    /// The session
    #[inline]
    #[must_use]
    pub fn session(&self) -> &StackSession {
        &self.session
    }

    /// The session, for editing between runs
    #[inline]
    pub fn session_mut(&mut self) -> &mut StackSession {
        &mut self.session
    }

    /// Give the session back, cancelling outstanding delays
    #[must_use]
    pub fn into_session(mut self) -> StackSession {
        self.timers.cancel_all();
        let Self { session, .. } = self;
        session
    }

    /// Run the selected step
    ///
    /// # Errors
    ///
    /// Propagates the session's refusal to start.
    pub fn run_selection(&mut self) -> SessionResult<()> {
        let effects = self.session.run_selection()?;
        self.perform(effects);
        Ok(())
    }

    /// Run from the selected step
    ///
    /// # Errors
    ///
    /// Propagates the session's refusal to start.
    pub fn run_from_selection(&mut self) -> SessionResult<()> {
        let effects = self.session.run_from_selection()?;
        self.perform(effects);
        Ok(())
    }

    /// Halt the run
    pub fn stop_run(&mut self) {
        let effects = self.session.stop_run();
        self.perform(effects);
    }

    /// Apply one event
    pub fn dispatch(&mut self, event: EngineEvent) {
        trace!(?event, "Dispatching event");
        if let EngineEvent::TimerFired(ticket) = &event {
            self.timers.fired(*ticket);
        }
        let effects = self.session.handle(event);
        self.perform(effects);
    }

    /// Wait for the next event and apply it
    pub async fn next_event(&mut self) {
        // The runtime holds a sender, so the channel never closes.
        if let Some(event) = self.events_rx.recv().await {
            self.dispatch(event);
        }
    }

    /// Apply events until the run ends
    pub async fn run_until_idle(&mut self) {
        while self.session.engine().is_running() {
            self.next_event().await;
        }
        debug!("Run idle");
    }

    fn perform(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            if self.timers.apply(&effect, &self.scheduler) {
                continue;
            }
            if let Effect::Issue(request) = effect {
                let issuer = Arc::clone(&self.issuer);
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let event = issue(issuer.as_ref(), request).await;
                    let _ = events.send(event);
                });
            }
        }
    }
}

impl std::fmt::Debug for SessionRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRuntime")
            .field("session", &self.session)
            .field("pending_timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}
