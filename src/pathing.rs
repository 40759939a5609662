//! Tile graph construction and A* search over a walkability grid.
//!
//! Every search builds its own [`TileGraph`] from the shared
//! [`WalkabilityGrid`] snapshot, so marking origin/destination, healing and
//! blacklisting never contaminate other searches.

use crate::grid::{EXPANDED_GRID_SIZE, Position, WalkabilityGrid};
use pathfinding::prelude::astar;
use tracing::debug;

/// Cells healed around origin/destination when a search fails (7x7 block)
const HEAL_RADIUS: i32 = 3;

/// Maximum ring distance scanned by [`find_path_near`]
const NEAR_SEARCH_MAX_RANGE: i32 = 20;
/// Ring growth per iteration of [`find_path_near`]
const NEAR_SEARCH_STEP: i32 = 4;

/// Kind of a tile, potentially affecting movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    /// Walkable tile with a movement cost of 1
    Plain,
    /// Blocks movement entirely
    Blocker,
    /// Traversable but heavily penalized, used to steer the search away from
    /// geometrically valid but gameplay-problematic routes
    SoftBlocker,
    /// Marks where the path is calculated from (exactly one per search)
    From,
    /// Marks the goal of the path (exactly one per search)
    To,
}

impl TileKind {
    /// Movement cost of entering a tile of this kind. `Blocker` tiles are
    /// excluded from neighbor sets and never have their cost queried.
    fn cost(self) -> u32 {
        match self {
            TileKind::SoftBlocker => 1000,
            _ => 1,
        }
    }
}

/// Per-search tile arena addressed by relative coordinates.
///
/// Tiles carry no back-reference to their graph; neighbor lookup takes the
/// graph explicitly and nodes are plain coordinates.
pub struct TileGraph {
    width: usize,
    height: usize,
    tiles: Vec<TileKind>,
}

impl TileGraph {
    /// Build a graph from the grid. With `expanded` the graph covers the
    /// padded coordinate space with the native grid embedded at its offset;
    /// every cell outside the native bounds defaults to walkable. That
    /// favors reachability over precision when leaving mapped territory and
    /// can route through truly impassable unmapped terrain - kept for
    /// compatibility with the data source.
    pub fn from_grid(grid: &WalkabilityGrid, expanded: bool) -> Self {
        let (width, height) = if expanded {
            (EXPANDED_GRID_SIZE, EXPANDED_GRID_SIZE)
        } else {
            (grid.width(), grid.height())
        };

        let blocked_kind = if grid.is_softened() {
            TileKind::SoftBlocker
        } else {
            TileKind::Blocker
        };

        let mut tiles = vec![TileKind::Plain; width * height];
        for y in 0..grid.height() {
            for x in 0..grid.width() {
                let native = Position::new(x as i32, y as i32);
                if grid.is_walkable_relative(native) {
                    continue;
                }
                let p = if expanded {
                    let world = grid.to_world(native, false);
                    grid.to_relative(world, true)
                } else {
                    native
                };
                if p.x >= 0 && p.y >= 0 && (p.x as usize) < width && (p.y as usize) < height {
                    tiles[p.y as usize * width + p.x as usize] = blocked_kind;
                }
            }
        }

        Self {
            width,
            height,
            tiles,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, p: Position) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as usize) < self.width && (p.y as usize) < self.height
    }

    pub fn kind(&self, p: Position) -> Option<TileKind> {
        if !self.contains(p) {
            return None;
        }
        self.tiles.get(p.y as usize * self.width + p.x as usize).copied()
    }

    /// Set the kind of a tile; out-of-bounds coordinates are ignored
    pub fn set_kind(&mut self, p: Position, kind: TileKind) {
        if !self.contains(p) {
            return;
        }
        let index = p.y as usize * self.width + p.x as usize;
        if let Some(tile) = self.tiles.get_mut(index) {
            *tile = kind;
        }
    }

    /// Successors of a tile with their movement cost: up/down/left/right
    /// only, excluding blockers and tiles off the edge of the graph.
    pub fn neighbors(&self, p: Position) -> Vec<(Position, u32)> {
        let mut neighbors = Vec::with_capacity(4);
        for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
            let n = Position::new(p.x + dx, p.y + dy);
            match self.kind(n) {
                None | Some(TileKind::Blocker) => {}
                Some(kind) => neighbors.push((n, kind.cost())),
            }
        }
        neighbors
    }

    /// Force a block of tiles around `center` to `Plain`, regardless of
    /// their original kind. The walkability source sometimes reports the
    /// player's or destination's own tile as blocked due to transient state
    /// (standing on a corpse or object); over this small radius the healed
    /// paths stay close to reality.
    fn heal_around(&mut self, center: Position) {
        for dy in -HEAL_RADIUS..=HEAL_RADIUS {
            for dx in -HEAL_RADIUS..=HEAL_RADIUS {
                self.set_kind(Position::new(center.x + dx, center.y + dy), TileKind::Plain);
            }
        }
    }
}

/// A computed route: world-coordinate waypoints from origin to destination
/// inclusive, plus the resolved destination and total traversal cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    points: Vec<Position>,
    destination: Position,
    cost: f32,
}

impl Path {
    fn new(points: Vec<Position>, destination: Position, cost: f32) -> Self {
        Self {
            points,
            destination,
            cost,
        }
    }

    pub fn points(&self) -> &[Position] {
        &self.points
    }

    /// Remaining length in tiles
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Resolved destination in world coordinates
    pub fn destination(&self) -> Position {
        self.destination
    }

    /// Total traversal cost. Unit cost per plain tile, so this doubles as
    /// the path distance on soft-blocker-free graphs.
    pub fn cost(&self) -> f32 {
        self.cost
    }

    /// Index and distance of the waypoint closest to `pos`
    pub fn nearest_index(&self, pos: Position) -> Option<(usize, f32)> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.euclidean_distance(&pos)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Drop the already-traversed prefix up to (not including) `index`
    pub fn advance_to(&mut self, index: usize) {
        let index = index.min(self.points.len());
        self.points.drain(..index);
    }

    /// Waypoint `tiles_ahead` tiles along the remaining path, or the final
    /// waypoint when the path is shorter. Long paths are walked or
    /// teleported incrementally by aiming here instead of the destination.
    pub fn aim_point(&self, tiles_ahead: usize) -> Option<Position> {
        if self.points.len() > tiles_ahead {
            return Some(self.points[tiles_ahead]);
        }
        self.points.last().copied()
    }
}

fn run_astar(graph: &TileGraph, from: Position, to: Position) -> Option<(Vec<Position>, u32)> {
    astar(
        &from,
        |&node| graph.neighbors(node),
        |node| node.manhattan_distance(&to),
        |&node| node == to,
    )
}

/// Find a minimum-cost path between two world positions using A*.
///
/// `None` means no route exists. A same-cell request returns an empty path
/// with zero cost. When the plain search fails and no blacklist is in
/// effect, the search is retried once after healing a 7x7 block around both
/// origin and destination. `blacklist` cells (world coordinates) are
/// force-marked as blocked before the search and bypass the heal.
pub fn find_path(
    grid: &WalkabilityGrid,
    from: Position,
    to: Position,
    blacklist: &[Position],
) -> Option<Path> {
    let expanded = grid.should_expand(to);
    let from_rel = grid.to_relative(from, expanded);
    let to_rel = grid.to_relative(to, expanded);

    let mut graph = TileGraph::from_grid(grid, expanded);
    if !graph.contains(from_rel) || !graph.contains(to_rel) {
        return None;
    }

    // Origin and destination are the same cell
    if from_rel == to_rel {
        return Some(Path::new(Vec::new(), to, 0.0));
    }

    // Origin/destination markers override blacklisted cells, never the
    // other way around
    for cell in blacklist {
        graph.set_kind(grid.to_relative(*cell, expanded), TileKind::Blocker);
    }
    graph.set_kind(from_rel, TileKind::From);
    graph.set_kind(to_rel, TileKind::To);

    let mut result = run_astar(&graph, from_rel, to_rel);

    if result.is_none() && blacklist.is_empty() {
        debug!(%from, %to, "no path found, healing around origin and destination");
        graph.heal_around(from_rel);
        graph.heal_around(to_rel);
        graph.set_kind(from_rel, TileKind::From);
        graph.set_kind(to_rel, TileKind::To);
        result = run_astar(&graph, from_rel, to_rel);
    }

    let (cells, cost) = result?;
    let points = cells
        .into_iter()
        .map(|cell| grid.to_world(cell, expanded))
        .collect();

    Some(Path::new(points, to, cost as f32))
}

/// First walkable world position around an unwalkable target, scanning
/// squares of growing radius. Used before pathing to entrances and objects
/// that sit on blocked tiles.
pub fn walkable_near(grid: &WalkabilityGrid, target: Position, radius: i32) -> Option<Position> {
    for r in 1..=radius {
        for dx in -r..=r {
            for dy in -r..=r {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let pos = Position::new(target.x + dx, target.y + dy);
                if grid.is_walkable(pos) {
                    return Some(pos);
                }
            }
        }
    }
    None
}

/// Like [`find_path`], but when the destination tile itself is not walkable
/// the search is relaxed to walkable cells ringing it, growing the ring up
/// to a fixed range. The resolved destination of the returned path may
/// therefore differ from the requested one.
pub fn find_path_near(
    grid: &WalkabilityGrid,
    from: Position,
    to: Position,
    blacklist: &[Position],
) -> Option<Path> {
    if grid.is_walkable(to) || grid.should_expand(to) {
        if let Some(path) = find_path(grid, from, to, blacklist) {
            return Some(path);
        }
    }

    let mut dst = 1;
    while dst < NEAR_SEARCH_MAX_RANGE {
        for i in -dst..dst {
            for j in -dst..dst {
                if i.abs() >= dst || j.abs() >= dst {
                    let candidate = Position::new(to.x + i, to.y + j);
                    if grid.is_walkable(candidate) {
                        debug!(%to, %candidate, "destination not walkable, pathing to nearby cell");
                        return find_path(grid, from, candidate, blacklist);
                    }
                }
            }
        }
        dst += NEAR_SEARCH_STEP;
    }

    None
}
