//! The stateful loop that turns "move to X" into a sequence of input
//! commands over time.
//!
//! A [`MoveStep`] owns one in-flight move: it computes a path, caches it,
//! re-validates the player against it on a fixed cadence, recovers from
//! stuck states, and declares the move complete, failed or still in
//! progress. One `run` call is one tick; the host sleeps
//! [`BotConfig::tick_interval`] between calls.

use crate::config::BotConfig;
use crate::errors::{NavError, NavResult};
use crate::grid::Position;
use crate::pathing::{self, Path};
use crate::screen;
use crate::step::{Status, Step};
use crate::world::{Clock, InputSink, SystemClock, WorldView};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::time::Duration;
use tracing::{debug, warn};

/// A new destination further than this from the cached one invalidates the
/// cache instead of reusing it
const DESTINATION_DRIFT_TOLERANCE: f32 = 2.0;

/// A cached path stays valid while the player is within this distance of
/// some point along it
const PATH_DEVIATION_TOLERANCE: f32 = 3.0;

/// Consecutive unmoved re-checks tolerated while teleporting before the
/// cache is discarded
const MAX_TELEPORT_STUCK: u32 = 3;

/// Extra tolerance added to the finish distance when a replan fails but we
/// are nearly there anyway
const CLOSE_ENOUGH_SLACK: i32 = 5;

/// Tiles aimed ahead along the path per teleport cast
const TELEPORT_TILE_JUMP: usize = 25;

/// Approximate walking speed, used to size the walk aim-ahead to the
/// randomized command window
const WALK_TILES_PER_SECOND: f32 = 25.0;

/// Cached route state owned by one in-flight move operation
#[derive(Debug)]
pub struct PathCache {
    /// Remaining path; the traversed prefix is sliced off as the player
    /// progresses
    pub path: Path,
    /// Destination the path was computed for
    pub destination: Position,
    /// Player position when the path was computed
    pub start_position: Position,
    /// Finish tolerance the move was admitted with
    pub finish_distance: i32,
    /// Time of the last heavy re-check
    pub last_recheck: Duration,
    /// Time of the last movement command, `None` before the first
    pub last_command: Option<Duration>,
    /// Player position at the previous re-check, for stuck detection
    pub last_position: Option<Position>,
    /// Consecutive unmoved re-checks while teleporting
    pub stuck_count: u32,
}

/// Progress report from one [`MoveStep::run`] tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    InProgress,
    Arrived,
}

/// Moves the player to a destination, walking or teleporting depending on
/// capability. Implements the generic [`Step`] contract.
pub struct MoveStep {
    destination: Position,
    finish_distance: i32,
    config: BotConfig,
    status: Status,
    cache: Option<PathCache>,
    started_at: Option<Duration>,
    /// Cells that previously caused a stuck loop, avoided on replans
    blacklist: Vec<Position>,
    /// Current randomized walk command window
    next_walk_delay: Option<Duration>,
    clock: Box<dyn Clock>,
    rng: Box<dyn RngCore>,
}

impl MoveStep {
    pub fn new(destination: Position) -> Self {
        let config = BotConfig::default();
        Self {
            destination,
            finish_distance: config.finish_distance,
            config,
            status: Status::NotStarted,
            cache: None,
            started_at: None,
            blacklist: Vec::new(),
            next_walk_delay: None,
            clock: Box::new(SystemClock::default()),
            rng: Box::new(StdRng::from_entropy()),
        }
    }

    /// Replace the default config. Resets the finish distance to the
    /// configured one, so apply [`with_finish_distance`](Self::with_finish_distance)
    /// afterwards to override it per-move.
    pub fn with_config(mut self, config: BotConfig) -> Self {
        self.finish_distance = config.finish_distance;
        self.config = config;
        self
    }

    pub fn with_finish_distance(mut self, distance: i32) -> Self {
        self.finish_distance = distance;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rng(mut self, rng: Box<dyn RngCore>) -> Self {
        self.rng = rng;
        self
    }

    pub fn destination(&self) -> Position {
        self.destination
    }

    pub fn cache(&self) -> Option<&PathCache> {
        self.cache.as_ref()
    }

    /// Retarget the move. A destination within a couple of tiles of the
    /// cached one keeps the cache; anything further invalidates it.
    pub fn set_destination(&mut self, destination: Position) {
        if let Some(cache) = &self.cache {
            if cache.destination.euclidean_distance(&destination) > DESTINATION_DRIFT_TOLERANCE {
                debug!(old = %cache.destination, new = %destination, "destination moved, dropping cached path");
                self.cache = None;
            }
        }
        self.destination = destination;
    }

    /// Advance the move by one tick.
    pub fn run(&mut self, world: &dyn WorldView, input: &mut dyn InputSink) -> NavResult<MoveOutcome> {
        if self.status == Status::Completed {
            return Ok(MoveOutcome::Arrived);
        }

        let now = self.clock.elapsed();
        let started_at = *self.started_at.get_or_insert(now);
        self.status = self.status.transition(Status::InProgress);

        let elapsed = now.saturating_sub(started_at);
        if elapsed > self.config.move_timeout() {
            warn!(destination = %self.destination, ?elapsed, "move timed out");
            return Err(NavError::MovementTimeout { elapsed });
        }

        let player = world.player_position();
        let can_teleport = world.can_teleport();

        // A cache built for a materially different destination is useless
        if let Some(cache) = &self.cache {
            if cache.destination.euclidean_distance(&self.destination) > DESTINATION_DRIFT_TOLERANCE
            {
                self.cache = None;
            }
        }

        // Close enough by straight-line distance
        if player.euclidean_distance(&self.destination) <= self.finish_distance as f32 {
            self.status = self.status.transition(Status::Completed);
            return Ok(MoveOutcome::Arrived);
        }

        enum Recovery {
            Nudge { blocked: Option<Position> },
            Replan,
        }

        // Stuck detection runs on the re-check cadence, not every tick
        let mut recovery = None;
        if let Some(cache) = self.cache.as_mut() {
            if now.saturating_sub(cache.last_recheck) >= self.config.recheck_interval() {
                cache.last_recheck = now;
                let unmoved = cache.last_position == Some(player) && player != Position::default();
                if unmoved {
                    if can_teleport {
                        // Teleport travel is chunky and a brief apparent
                        // stall right after a cast is expected, so allow a
                        // few unmoved checks before giving up on the path.
                        cache.stuck_count += 1;
                        if cache.stuck_count >= MAX_TELEPORT_STUCK {
                            recovery = Some(Recovery::Replan);
                        }
                    } else {
                        // A walking actor pressed against geometry stays
                        // pinned until perturbed.
                        recovery = Some(Recovery::Nudge {
                            blocked: cache.path.points().get(1).copied(),
                        });
                    }
                } else {
                    cache.stuck_count = 0;
                }
                cache.last_position = Some(player);
            }
        }

        match recovery {
            Some(Recovery::Nudge { blocked }) => {
                warn!(position = %player, "stuck while walking, nudging and replanning");
                if let Some(blocked) = blocked {
                    self.blacklist.push(blocked);
                }
                let point = screen::random_nudge_point(self.rng.as_mut(), self.config.viewport);
                input.nudge(point);
                self.cache = None;
                return Ok(MoveOutcome::InProgress);
            }
            Some(Recovery::Replan) => {
                debug!(position = %player, "no teleport progress after {MAX_TELEPORT_STUCK} checks, replanning");
                self.cache = None;
            }
            None => {}
        }

        // Consume the traversed prefix, or drop the cache once the player
        // has drifted off the polyline
        if let Some(cache) = self.cache.as_mut() {
            match cache.path.nearest_index(player) {
                Some((index, deviation)) if deviation <= PATH_DEVIATION_TOLERANCE => {
                    cache.path.advance_to(index);
                }
                _ => {
                    debug!(position = %player, "player drifted off the cached path, replanning");
                    self.cache = None;
                }
            }
        }

        if self.cache.is_none() {
            match pathing::find_path_near(world.grid(), player, self.destination, &self.blacklist)
            {
                Some(path) => {
                    debug!(from = %player, to = %self.destination, tiles = path.len(), "path planned");
                    self.cache = Some(PathCache {
                        path,
                        destination: self.destination,
                        start_position: player,
                        finish_distance: self.finish_distance,
                        last_recheck: now,
                        last_command: None,
                        last_position: Some(player),
                        stuck_count: 0,
                    });
                }
                None => {
                    // Close enough that a missing route is not worth failing
                    // the whole move over
                    if player.euclidean_distance(&self.destination)
                        < (self.finish_distance + CLOSE_ENOUGH_SLACK) as f32
                    {
                        self.status = self.status.transition(Status::Completed);
                        return Ok(MoveOutcome::Arrived);
                    }
                    return Err(NavError::PathNotFound {
                        destination: self.destination,
                    });
                }
            }
        }

        let walk_delay = *self
            .next_walk_delay
            .get_or_insert_with(|| roll_walk_delay(self.rng.as_mut(), &self.config));

        let Some(cache) = self.cache.as_mut() else {
            return Ok(MoveOutcome::InProgress);
        };

        // Close enough by remaining path length
        if cache.path.len() <= self.finish_distance as usize {
            self.status = self.status.transition(Status::Completed);
            return Ok(MoveOutcome::Arrived);
        }

        // Command cadence: teleport at cast speed, walk inside the
        // randomized window
        if let Some(last) = cache.last_command {
            let since = now.saturating_sub(last);
            if can_teleport {
                if since < world.cast_duration() {
                    return Ok(MoveOutcome::InProgress);
                }
            } else if since < walk_delay {
                return Ok(MoveOutcome::InProgress);
            }
        }

        // Teleporting requires the skill to be armed before each cast
        if can_teleport && world.armed_skill() != world.teleport_skill() {
            input.press_skill_binding(world.teleport_skill());
            return Ok(MoveOutcome::InProgress);
        }

        let tiles_ahead = if can_teleport {
            TELEPORT_TILE_JUMP
        } else {
            (WALK_TILES_PER_SECOND * walk_delay.as_secs_f32()) as usize
        };
        let Some(target) = cache.path.aim_point(tiles_ahead) else {
            self.status = self.status.transition(Status::Completed);
            return Ok(MoveOutcome::Arrived);
        };

        let point = screen::screen_delta(player, target, self.config.viewport);
        if can_teleport {
            input.teleport_click(point);
        } else {
            input.force_move(point);
        }
        cache.last_command = Some(now);
        if !can_teleport {
            self.next_walk_delay = Some(roll_walk_delay(self.rng.as_mut(), &self.config));
        }

        Ok(MoveOutcome::InProgress)
    }
}

fn roll_walk_delay(rng: &mut dyn RngCore, config: &BotConfig) -> Duration {
    Duration::from_millis(rng.gen_range(config.walk_cadence_min_ms..=config.walk_cadence_max_ms))
}

impl Step for MoveStep {
    fn status(&self) -> Status {
        self.status
    }

    fn run(&mut self, world: &dyn WorldView, input: &mut dyn InputSink) -> NavResult<()> {
        MoveStep::run(self, world, input).map(|_| ())
    }

    fn reset(&mut self) {
        self.status = Status::NotStarted;
        self.cache = None;
        self.started_at = None;
        self.blacklist.clear();
        self.next_walk_delay = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::WalkabilityGrid;
    use crate::screen::ScreenPoint;
    use crate::world::{ManualClock, SkillId};
    use rand_pcg::Pcg32;
    use std::cell::Cell;

    const TELEPORT: SkillId = SkillId(54);

    struct FakeWorld {
        grid: WalkabilityGrid,
        player: Cell<Position>,
        can_teleport: Cell<bool>,
        cast_duration: Duration,
        armed: Cell<SkillId>,
    }

    impl FakeWorld {
        fn open(size: usize, player: Position) -> Self {
            let grid =
                WalkabilityGrid::new(Position::default(), size, size, vec![true; size * size])
                    .unwrap();
            Self::with_grid(grid, player)
        }

        fn with_grid(grid: WalkabilityGrid, player: Position) -> Self {
            Self {
                grid,
                player: Cell::new(player),
                can_teleport: Cell::new(false),
                cast_duration: Duration::from_millis(100),
                armed: Cell::new(TELEPORT),
            }
        }
    }

    impl WorldView for FakeWorld {
        fn grid(&self) -> &WalkabilityGrid {
            &self.grid
        }
        fn player_position(&self) -> Position {
            self.player.get()
        }
        fn can_teleport(&self) -> bool {
            self.can_teleport.get()
        }
        fn cast_duration(&self) -> Duration {
            self.cast_duration
        }
        fn armed_skill(&self) -> SkillId {
            self.armed.get()
        }
        fn teleport_skill(&self) -> SkillId {
            TELEPORT
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Command {
        ForceMove(ScreenPoint),
        Teleport(ScreenPoint),
        ArmSkill(SkillId),
        Nudge(ScreenPoint),
    }

    #[derive(Default)]
    struct RecordingInput {
        commands: Vec<Command>,
    }

    impl RecordingInput {
        fn count(&self, matcher: fn(&Command) -> bool) -> usize {
            self.commands.iter().filter(|c| matcher(c)).count()
        }
    }

    impl InputSink for RecordingInput {
        fn force_move(&mut self, target: ScreenPoint) {
            self.commands.push(Command::ForceMove(target));
        }
        fn teleport_click(&mut self, target: ScreenPoint) {
            self.commands.push(Command::Teleport(target));
        }
        fn press_skill_binding(&mut self, skill: SkillId) {
            self.commands.push(Command::ArmSkill(skill));
        }
        fn nudge(&mut self, target: ScreenPoint) {
            self.commands.push(Command::Nudge(target));
        }
    }

    fn test_step(destination: Position, clock: &ManualClock) -> MoveStep {
        MoveStep::new(destination)
            .with_clock(Box::new(clock.clone()))
            .with_rng(Box::new(Pcg32::seed_from_u64(1)))
    }

    /// Build a grid from rows of '.' (walkable) and 'X' (blocked)
    fn grid_from_rows(rows: &[&str]) -> WalkabilityGrid {
        let height = rows.len();
        let width = rows[0].len();
        let walkable = rows
            .iter()
            .flat_map(|row| row.bytes().map(|b| b == b'.'))
            .collect();
        WalkabilityGrid::new(Position::default(), width, height, walkable).unwrap()
    }

    /// Grid split in two by a wall thick enough that the blocked-tile heal
    /// cannot punch through it
    fn walled_world(player: Position) -> FakeWorld {
        let rows: Vec<String> = (0..11).map(|_| ".XXXXXXX........".to_string()).collect();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        FakeWorld::with_grid(grid_from_rows(&rows), player)
    }

    #[test]
    fn test_completes_at_finish_distance_without_commands() {
        let clock = ManualClock::new();
        let world = FakeWorld::open(20, Position::new(0, 0));
        let mut input = RecordingInput::default();
        let mut step = test_step(Position::new(4, 0), &clock);

        let outcome = step.run(&world, &mut input).unwrap();
        assert_eq!(outcome, MoveOutcome::Arrived);
        assert_eq!(step.status, Status::Completed);
        assert!(input.commands.is_empty());
    }

    #[test]
    fn test_walk_command_cadence() {
        let clock = ManualClock::new();
        let world = FakeWorld::open(20, Position::new(0, 0));
        let mut input = RecordingInput::default();
        let mut step = test_step(Position::new(15, 0), &clock);

        // First tick plans and issues a command immediately
        assert_eq!(step.run(&world, &mut input).unwrap(), MoveOutcome::InProgress);
        assert_eq!(input.count(|c| matches!(c, Command::ForceMove(_))), 1);

        // Within the randomized 700-1100ms window: no new command
        clock.advance(Duration::from_millis(50));
        step.run(&world, &mut input).unwrap();
        assert_eq!(input.count(|c| matches!(c, Command::ForceMove(_))), 1);

        // Past the window (and moving, so no stuck recovery fires)
        clock.advance(Duration::from_millis(1200));
        world.player.set(Position::new(2, 0));
        step.run(&world, &mut input).unwrap();
        assert_eq!(input.count(|c| matches!(c, Command::ForceMove(_))), 2);
        assert_eq!(input.count(|c| matches!(c, Command::Nudge(_))), 0);
    }

    #[test]
    fn test_stuck_walk_nudges_and_invalidates() {
        let clock = ManualClock::new();
        let world = FakeWorld::open(20, Position::new(1, 1));
        let mut input = RecordingInput::default();
        let mut step = test_step(Position::new(15, 1), &clock);

        step.run(&world, &mut input).unwrap();
        assert!(step.cache().is_some());

        // Two consecutive re-checks with an identical position
        clock.advance(Duration::from_millis(250));
        step.run(&world, &mut input).unwrap();

        assert!(matches!(input.commands.last(), Some(Command::Nudge(_))));
        assert!(step.cache().is_none());
    }

    #[test]
    fn test_stuck_teleport_grace_period() {
        let clock = ManualClock::new();
        let world = FakeWorld::open(40, Position::new(1, 1));
        world.can_teleport.set(true);
        let mut input = RecordingInput::default();
        let mut step = test_step(Position::new(30, 1), &clock);

        step.run(&world, &mut input).unwrap();
        assert_eq!(step.cache().unwrap().stuck_count, 0);

        // First two unmoved re-checks keep the cache
        clock.advance(Duration::from_millis(250));
        step.run(&world, &mut input).unwrap();
        assert_eq!(step.cache().unwrap().stuck_count, 1);

        clock.advance(Duration::from_millis(250));
        step.run(&world, &mut input).unwrap();
        assert_eq!(step.cache().unwrap().stuck_count, 2);

        // Third one discards the path and replans with a reset counter
        clock.advance(Duration::from_millis(250));
        step.run(&world, &mut input).unwrap();
        assert_eq!(step.cache().unwrap().stuck_count, 0);

        // Teleport stuck handling never nudges
        assert_eq!(input.count(|c| matches!(c, Command::Nudge(_))), 0);
        assert!(input.count(|c| matches!(c, Command::Teleport(_))) >= 3);
    }

    #[test]
    fn test_move_timeout() {
        let clock = ManualClock::new();
        let world = FakeWorld::open(20, Position::new(0, 0));
        let mut input = RecordingInput::default();
        let mut step = test_step(Position::new(15, 0), &clock);

        step.run(&world, &mut input).unwrap();

        clock.advance(Duration::from_secs(31));
        let err = step.run(&world, &mut input).unwrap_err();
        assert!(matches!(err, NavError::MovementTimeout { .. }));
    }

    #[test]
    fn test_unreachable_destination_is_path_not_found() {
        let clock = ManualClock::new();
        let world = walled_world(Position::new(0, 5));
        let mut input = RecordingInput::default();
        let mut step = test_step(Position::new(15, 5), &clock);

        let err = step.run(&world, &mut input).unwrap_err();
        assert!(matches!(err, NavError::PathNotFound { .. }));
    }

    #[test]
    fn test_unreachable_but_close_destination_succeeds() {
        let clock = ManualClock::new();
        let world = walled_world(Position::new(0, 5));
        let mut input = RecordingInput::default();
        // Distance 8, inside finish_distance + 5
        let mut step = test_step(Position::new(8, 5), &clock);

        let outcome = step.run(&world, &mut input).unwrap();
        assert_eq!(outcome, MoveOutcome::Arrived);
        assert_eq!(step.status, Status::Completed);
    }

    #[test]
    fn test_teleport_arms_skill_before_casting() {
        let clock = ManualClock::new();
        let world = FakeWorld::open(40, Position::new(0, 0));
        world.can_teleport.set(true);
        world.armed.set(SkillId(2));
        let mut input = RecordingInput::default();
        let mut step = test_step(Position::new(30, 0), &clock);

        // Wrong skill armed: press the binding, defer the cast
        step.run(&world, &mut input).unwrap();
        assert_eq!(input.commands, vec![Command::ArmSkill(TELEPORT)]);

        // Armed now: the next tick casts
        world.armed.set(TELEPORT);
        step.run(&world, &mut input).unwrap();
        assert!(matches!(input.commands.last(), Some(Command::Teleport(_))));
    }

    #[test]
    fn test_destination_drift_invalidates_cache() {
        let clock = ManualClock::new();
        let world = FakeWorld::open(30, Position::new(0, 0));
        let mut input = RecordingInput::default();
        let mut step = test_step(Position::new(15, 0), &clock);

        step.run(&world, &mut input).unwrap();
        assert!(step.cache().is_some());

        // Nearby retarget keeps the cache
        step.set_destination(Position::new(16, 0));
        assert!(step.cache().is_some());

        // Material retarget drops it
        step.set_destination(Position::new(15, 10));
        assert!(step.cache().is_none());
    }

    #[test]
    fn test_completed_step_is_idempotent() {
        let clock = ManualClock::new();
        let world = FakeWorld::open(20, Position::new(0, 0));
        let mut input = RecordingInput::default();
        let mut step = test_step(Position::new(3, 0), &clock);

        let step: &mut dyn Step = &mut step;
        step.run(&world, &mut input).unwrap();
        assert_eq!(step.status(), Status::Completed);

        for _ in 0..5 {
            clock.advance(Duration::from_secs(60));
            step.run(&world, &mut input).unwrap();
            assert_eq!(step.status(), Status::Completed);
        }
        assert!(input.commands.is_empty());
    }

    #[test]
    fn test_reset_returns_to_not_started() {
        let clock = ManualClock::new();
        let world = FakeWorld::open(20, Position::new(0, 0));
        let mut input = RecordingInput::default();
        let mut step = test_step(Position::new(3, 0), &clock);

        MoveStep::run(&mut step, &world, &mut input).unwrap();
        assert_eq!(Step::status(&step), Status::Completed);

        Step::reset(&mut step);
        assert_eq!(Step::status(&step), Status::NotStarted);
        assert!(step.cache().is_none());
    }
}
