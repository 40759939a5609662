//! World-delta to screen-pixel translation for the isometric projection.
//!
//! Every call site that turns a game position into a cursor position goes
//! through [`screen_delta`] so the projection stays bit-for-bit consistent
//! between movement, attack targeting and object interaction.

use crate::grid::Position;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Horizontal half-size of one tile in screen pixels
pub const HALF_TILE_WIDTH: f32 = 19.8;
/// Vertical half-size of one tile in screen pixels
pub const HALF_TILE_HEIGHT: f32 = 9.9;

/// Cursor positions below `height / HUD_CLAMP_DIVISOR` overlap the HUD
const HUD_CLAMP_DIVISOR: f32 = 1.21;

/// Size of the game render area in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// A pixel coordinate inside the game render area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

/// Project the world delta between `from` and `to` onto the screen, centered
/// on the viewport. Isometric math: https://clintbellanger.net/articles/isometric_math/
pub fn screen_delta(from: Position, to: Position, viewport: Viewport) -> ScreenPoint {
    let dx = (to.x - from.x) as f32;
    let dy = (to.y - from.y) as f32;

    let x = ((dx - dy) * HALF_TILE_WIDTH) as i32 + viewport.width / 2;
    let y = ((dx + dy) * HALF_TILE_HEIGHT) as i32 + viewport.height / 2;

    clamp_to_hud(ScreenPoint { x, y }, viewport)
}

/// Keep the cursor above the HUD band at the bottom of the screen
pub fn clamp_to_hud(point: ScreenPoint, viewport: Viewport) -> ScreenPoint {
    let max_y = (viewport.height as f32 / HUD_CLAMP_DIVISOR) as i32;
    ScreenPoint {
        x: point.x,
        y: point.y.min(max_y),
    }
}

/// A random point biased towards the viewport center, used to perturb a
/// walking actor that is stuck against geometry.
pub fn random_nudge_point(rng: &mut dyn RngCore, viewport: Viewport) -> ScreenPoint {
    let mid_x = viewport.width / 2;
    let mid_y = viewport.height / 2;
    ScreenPoint {
        x: mid_x + rng.gen_range(0..mid_x) - mid_x / 2,
        y: mid_y + rng.gen_range(0..mid_y) - mid_y / 2,
    }
}
