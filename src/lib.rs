//! Grid navigation and movement execution for an isometric action RPG bot.
//!
//! The crate turns a walkability snapshot of the active area into concrete
//! movement: A* pathfinding over a tile graph ([`pathing`]), a cached,
//! self-validating movement controller ([`movement`]), and the isometric
//! world-to-screen projection that produces input coordinates ([`screen`]).
//! Hosts integrate by implementing the [`world`] traits and polling steps
//! once per tick.

pub mod config;
pub mod errors;
pub mod grid;
pub mod movement;
pub mod pathing;
pub mod screen;
pub mod step;
pub mod world;

pub use config::{BotConfig, get_config_path, load_config, save_config};
pub use errors::{NavError, NavResult};
pub use grid::{Position, WalkabilityGrid};
pub use movement::{MoveOutcome, MoveStep, PathCache};
pub use pathing::{Path, TileGraph, TileKind, find_path, find_path_near, walkable_near};
pub use screen::{ScreenPoint, Viewport, clamp_to_hud, random_nudge_point, screen_delta};
pub use step::{Status, Step, WaitStep};
pub use world::{Clock, InputSink, ManualClock, SkillId, SystemClock, WorldView};
