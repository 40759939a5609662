//! Collaborator seams for the movement core.
//!
//! The core never reads game memory or synthesizes input itself: a host
//! supplies the current world state through [`WorldView`] (pull-based, once
//! per tick) and receives commands through [`InputSink`]. Time is injected
//! through [`Clock`] so cadence and timeout logic can be tested without
//! sleeping.

use crate::grid::{Position, WalkabilityGrid};
use crate::screen::ScreenPoint;
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Identifier of a skill as reported by the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SkillId(pub u16);

/// Read-only snapshot of the live game state, refreshed by the host each tick
pub trait WorldView {
    /// Walkability grid for the active area
    fn grid(&self) -> &WalkabilityGrid;

    /// Player's current world position
    fn player_position(&self) -> Position;

    /// Whether the actor can currently teleport (skill known, not in town,
    /// area not exempted)
    fn can_teleport(&self) -> bool;

    /// Current teleport cast duration, used as the command cadence while
    /// teleporting
    fn cast_duration(&self) -> Duration;

    /// Skill currently armed on the action button
    fn armed_skill(&self) -> SkillId;

    /// Skill that must be armed before a teleport cast
    fn teleport_skill(&self) -> SkillId;
}

/// Destination for synthetic input commands
pub trait InputSink {
    /// Move the pointer to `target` and press the force-move binding
    fn force_move(&mut self, target: ScreenPoint);

    /// Right-click `target` to cast the armed teleport skill
    fn teleport_click(&mut self, target: ScreenPoint);

    /// Press the key binding that arms a skill
    fn press_skill_binding(&mut self, skill: SkillId);

    /// Random perturbation movement for stuck recovery
    fn nudge(&mut self, target: ScreenPoint);
}

/// Monotonic time source
pub trait Clock {
    /// Time elapsed since the clock was created
    fn elapsed(&self) -> Duration;
}

/// Wall-clock backed [`Clock`]
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Manually advanced [`Clock`] for tests and simulations. Clones share the
/// same underlying time, so a test can keep one handle and hand another to a
/// step.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.now.get()
    }
}
