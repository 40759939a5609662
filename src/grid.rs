use crate::errors::{NavError, NavResult};
use std::fmt;
use tracing::debug;

/// Side length of the padded coordinate space used when a destination falls
/// outside the natively reported grid bounds.
pub const EXPANDED_GRID_SIZE: usize = 3000;

/// Offset applied to both axes when translating into the expanded space; the
/// native grid is embedded at this offset.
pub const EXPANDED_GRID_OFFSET: i32 = (EXPANDED_GRID_SIZE / 2) as i32;

/// A point in game coordinates. The same type is used for absolute world
/// positions and for positions relative to an area origin; the grid methods
/// translate between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another position (heuristic for A*)
    pub fn manhattan_distance(&self, other: &Position) -> u32 {
        ((self.x - other.x).abs() + (self.y - other.y).abs()) as u32
    }

    /// Euclidean distance to another position
    pub fn euclidean_distance(&self, other: &Position) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Walkability snapshot for the active area.
///
/// The grid is rebuilt fresh per area visit and treated as read-only during a
/// search; searches mutate their own tile graph copy, never this grid.
#[derive(Debug, Clone)]
pub struct WalkabilityGrid {
    /// World coordinates of the relative origin (0, 0)
    origin: Position,
    width: usize,
    height: usize,
    /// Walkability map - true if the cell is walkable, row-major
    walkable: Vec<bool>,
    /// Blocked cells become soft blockers (traversable at very high cost)
    /// instead of hard blockers. Used for platform areas whose native layout
    /// defeats 4-directional search.
    soften_blockers: bool,
}

impl WalkabilityGrid {
    pub fn new(
        origin: Position,
        width: usize,
        height: usize,
        walkable: Vec<bool>,
    ) -> NavResult<Self> {
        if width == 0 || height == 0 {
            return Err(NavError::InvalidGridDimensions { width, height });
        }
        if walkable.len() != width * height {
            return Err(NavError::GridSizeMismatch {
                expected: width * height,
                actual: walkable.len(),
            });
        }

        let blocked = walkable.iter().filter(|&&w| !w).count();
        debug!(
            width,
            height,
            blocked,
            %origin,
            "walkability grid constructed"
        );

        Ok(Self {
            origin,
            width,
            height,
            walkable,
            soften_blockers: false,
        })
    }

    /// Mark this grid as a soft-blocker area: blocked cells carry an extreme
    /// traversal cost instead of being impassable.
    pub fn soften_blockers(mut self, soften: bool) -> Self {
        self.soften_blockers = soften;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn origin(&self) -> Position {
        self.origin
    }

    pub fn is_softened(&self) -> bool {
        self.soften_blockers
    }

    /// Translate a world position into this grid's coordinate space. With
    /// `expanded` the result is shifted into the padded space used when the
    /// destination lies outside the native bounds.
    pub fn to_relative(&self, world: Position, expanded: bool) -> Position {
        let mut p = Position::new(world.x - self.origin.x, world.y - self.origin.y);
        if expanded {
            p.x += EXPANDED_GRID_OFFSET;
            p.y += EXPANDED_GRID_OFFSET;
        }
        p
    }

    /// Inverse of [`to_relative`](Self::to_relative).
    pub fn to_world(&self, relative: Position, expanded: bool) -> Position {
        let mut p = Position::new(relative.x + self.origin.x, relative.y + self.origin.y);
        if expanded {
            p.x -= EXPANDED_GRID_OFFSET;
            p.y -= EXPANDED_GRID_OFFSET;
        }
        p
    }

    /// Check if a world position falls inside the native grid bounds
    pub fn contains(&self, world: Position) -> bool {
        let p = self.to_relative(world, false);
        p.x >= 0 && p.y >= 0 && (p.x as usize) < self.width && (p.y as usize) < self.height
    }

    /// True if pathing to this destination requires the expanded grid
    pub fn should_expand(&self, world: Position) -> bool {
        !self.contains(world)
    }

    /// Check if a world position is walkable. Out-of-bounds positions are not.
    pub fn is_walkable(&self, world: Position) -> bool {
        let p = self.to_relative(world, false);
        self.is_walkable_relative(p)
    }

    /// Check if a native-grid-relative position is walkable
    pub fn is_walkable_relative(&self, relative: Position) -> bool {
        if relative.x < 0
            || relative.y < 0
            || relative.x as usize >= self.width
            || relative.y as usize >= self.height
        {
            return false;
        }
        let index = relative.y as usize * self.width + relative.x as usize;
        self.walkable.get(index).copied().unwrap_or(false)
    }
}
