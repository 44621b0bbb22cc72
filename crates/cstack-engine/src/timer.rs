//! Cancellable delays
//!
//! The engine asks for delays through [`Effect::Schedule`](crate::Effect) and
//! withdraws them through [`Effect::Cancel`](crate::Effect). A
//! [`DelayScheduler`] turns the former into a running timer; the
//! [`TimerRegistry`] keeps the handles so the latter can abort them.

use crate::effect::{Effect, EngineEvent, TimerTicket};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

/// Cancels a scheduled delay
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    /// Handle running `cancel` when cancelled
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Handle with nothing to cancel
    #[must_use]
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Cancel the delay
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Delivers [`EngineEvent::TimerFired`] after a delay
pub trait DelayScheduler: Send + Sync {
    /// Start a delay for `ticket`
    fn schedule(&self, ticket: TimerTicket, delay: Duration) -> TimerHandle;
}

/// Scheduler backed by tokio timers
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl TokioScheduler {
    /// Scheduler sending fired tickets to `events`
    #[must_use]
    pub fn new(events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { events }
    }
}

impl DelayScheduler for TokioScheduler {
    fn schedule(&self, ticket: TimerTicket, delay: Duration) -> TimerHandle {
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the session shut down.
            let _ = events.send(EngineEvent::TimerFired(ticket));
        });
        TimerHandle::new(move || task.abort())
    }
}

/// Outstanding delays by ticket
#[derive(Debug, Default)]
pub struct TimerRegistry {
    handles: HashMap<TimerTicket, TimerHandle>,
}

impl TimerRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a timer effect; other effects are ignored
    ///
    /// Returns true when the effect was a timer effect.
    pub fn apply(&mut self, effect: &Effect, scheduler: &dyn DelayScheduler) -> bool {
        match effect {
            Effect::Schedule { ticket, delay } => {
                trace!(%ticket, ?delay, "Scheduling delay");
                let handle = scheduler.schedule(*ticket, *delay);
                if let Some(previous) = self.handles.insert(*ticket, handle) {
                    previous.cancel();
                }
                true
            }
            Effect::Cancel(ticket) => {
                if let Some(handle) = self.handles.remove(ticket) {
                    trace!(%ticket, "Cancelling delay");
                    handle.cancel();
                }
                true
            }
            Effect::Issue(_) => false,
        }
    }

    /// Forget a ticket whose delay elapsed
    pub fn fired(&mut self, ticket: TimerTicket) {
        self.handles.remove(&ticket);
    }

    /// Cancel everything
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.cancel();
        }
    }

    /// Number of outstanding delays
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True when no delay is outstanding
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
