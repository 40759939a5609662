//! The three-state FSM shared by every discrete bot action.
//!
//! A step is polled cooperatively: the host calls [`Step::run`] once per tick
//! until [`Step::status`] reports [`Status::Completed`] or `run` returns an
//! error. `Completed` is terminal and idempotent - callers frequently poll
//! after completion, so further transitions are ignored rather than rejected.

use crate::errors::NavResult;
use crate::world::{Clock, InputSink, SystemClock, WorldView};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl Status {
    /// Apply a transition, preserving the FSM invariants: `Completed` is
    /// sticky, and an in-progress step cannot fall back to `NotStarted`.
    #[must_use]
    pub fn transition(self, to: Status) -> Status {
        match (self, to) {
            (Status::Completed, _) => Status::Completed,
            (Status::InProgress, Status::NotStarted) => Status::InProgress,
            _ => to,
        }
    }
}

/// A discrete bot action (movement, attack, pickup, interaction)
pub trait Step {
    fn status(&self) -> Status;

    /// Advance the action by one tick. Expected to be called repeatedly
    /// until the status reports `Completed` or an error is produced.
    fn run(&mut self, world: &dyn WorldView, input: &mut dyn InputSink) -> NavResult<()>;

    /// Return the step to `NotStarted` so it can be reused
    fn reset(&mut self);
}

/// The simplest [`Step`]: completes once a fixed duration has elapsed.
pub struct WaitStep {
    duration: Duration,
    started_at: Option<Duration>,
    status: Status,
    clock: Box<dyn Clock>,
}

impl WaitStep {
    pub fn new(duration: Duration) -> Self {
        Self::with_clock(duration, Box::new(SystemClock::default()))
    }

    pub fn with_clock(duration: Duration, clock: Box<dyn Clock>) -> Self {
        Self {
            duration,
            started_at: None,
            status: Status::NotStarted,
            clock,
        }
    }
}

impl Step for WaitStep {
    fn status(&self) -> Status {
        self.status
    }

    fn run(&mut self, _world: &dyn WorldView, _input: &mut dyn InputSink) -> NavResult<()> {
        if self.status == Status::Completed {
            return Ok(());
        }

        let now = self.clock.elapsed();
        let started_at = *self.started_at.get_or_insert(now);
        self.status = self.status.transition(Status::InProgress);

        if now - started_at >= self.duration {
            self.status = self.status.transition(Status::Completed);
        }

        Ok(())
    }

    fn reset(&mut self) {
        self.status = Status::NotStarted;
        self.started_at = None;
    }
}
