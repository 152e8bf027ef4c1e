use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::config::{TILE_SIZE, TILE_SIZE_Z};
use crate::tile_map::ChunkGrid;
use crate::tiles::TileCatalog;
use crate::types::{Direction, TileCoord};

#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    pub tiles: Vec<TileCoord>,
    pub cost: f32,
}

#[derive(Clone, Copy, Debug)]
struct OpenEntry {
    estimate: f32,
    seq: u64,
    tile: TileCoord,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    // BinaryHeap is a max-heap: lowest estimate first, then earliest discovery.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .total_cmp(&self.estimate)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A* over 4-connected tiles in `[0, x_max] x [0, y_max]`.
///
/// `edge_cost` is only asked about adjacent tiles; an infinite cost marks the
/// edge impassable. `min_step_cost` must not exceed the cost of any finite
/// edge, otherwise the result may not be the cheapest path. Nodes with equal
/// estimates are expanded in discovery order.
pub fn a_star<F>(
    start: TileCoord,
    target: TileCoord,
    x_max: i32,
    y_max: i32,
    mut edge_cost: F,
    min_step_cost: f32,
) -> Option<Path>
where
    F: FnMut(TileCoord, TileCoord) -> f32,
{
    let in_bounds = |t: TileCoord| t.x >= 0 && t.y >= 0 && t.x <= x_max && t.y <= y_max;
    if !in_bounds(start) || !in_bounds(target) {
        return None;
    }
    let heuristic = |t: TileCoord| t.manhattan(target) as f32 * min_step_cost.max(0.0);

    let mut open = BinaryHeap::new();
    let mut best: HashMap<TileCoord, f32> = HashMap::new();
    let mut came_from: HashMap<TileCoord, TileCoord> = HashMap::new();
    let mut closed: HashSet<TileCoord> = HashSet::new();
    let mut seq = 0u64;

    best.insert(start, 0.0);
    open.push(OpenEntry {
        estimate: heuristic(start),
        seq,
        tile: start,
    });

    while let Some(OpenEntry { tile, .. }) = open.pop() {
        if !closed.insert(tile) {
            continue;
        }
        let cost_here = best[&tile];
        if tile == target {
            return Some(Path {
                tiles: rebuild(&came_from, start, target),
                cost: cost_here,
            });
        }

        for direction in Direction::ALL {
            let (dx, dy) = direction.delta();
            let next = TileCoord::new(tile.x + dx, tile.y + dy);
            if !in_bounds(next) || closed.contains(&next) {
                continue;
            }
            let step = edge_cost(tile, next);
            if !step.is_finite() {
                continue;
            }
            let cost = cost_here + step;
            if best.get(&next).map_or(true, |&known| cost < known) {
                best.insert(next, cost);
                came_from.insert(next, tile);
                seq += 1;
                open.push(OpenEntry {
                    estimate: cost + heuristic(next),
                    seq,
                    tile: next,
                });
            }
        }
    }
    None
}

fn rebuild(came_from: &HashMap<TileCoord, TileCoord>, start: TileCoord, target: TileCoord) -> Vec<TileCoord> {
    let mut tiles = vec![target];
    let mut current = target;
    while current != start {
        match came_from.get(&current) {
            Some(&prev) => {
                tiles.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    tiles.reverse();
    tiles
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainCost {
    pub walk_speed: f32,
    pub climb_speed: f32,
}

impl TerrainCost {
    pub fn new(walk_speed: f32, climb_speed: f32) -> Self {
        Self {
            walk_speed,
            climb_speed,
        }
    }

    pub fn flat_step_cost(&self) -> f32 {
        2.0 * self.walk_speed * TILE_SIZE
    }

    /// Lower bound of [`TerrainCost::edge_cost`] for any pair of shapes in `catalog`.
    pub fn min_step_cost(&self, catalog: &TileCatalog) -> f32 {
        let steepest = catalog.max_corner_magnitude() as f32 / (TILE_SIZE / 2.0);
        2.0 * (1.0 / hypot_length(steepest)) * self.walk_speed * TILE_SIZE
    }

    /// Cost of moving from `from` to the adjacent tile `to`. Non-adjacent pairs
    /// are not edges of the graph and cost infinity.
    pub fn edge_cost(&self, grid: &ChunkGrid, from: TileCoord, to: TileCoord) -> f32 {
        let Some(direction) = Direction::from_delta(to.x - from.x, to.y - from.y) else {
            log::warn!(
                "pathfinding asked for non-adjacent tiles ({}, {}) ({}, {})",
                from.x,
                from.y,
                to.x,
                to.y
            );
            return f32::INFINITY;
        };
        let (Some(from_tile), Some(to_tile)) = (grid.tile_at(from), grid.tile_at(to)) else {
            return f32::INFINITY;
        };

        let from_height = from_tile.height_of(direction);
        let to_height = to_tile.height_of(direction.inverse());

        let from_incline = (from_height - from_tile.height()) as f32 / (TILE_SIZE / 2.0);
        let to_incline = (to_height - to_tile.height()) as f32 / (TILE_SIZE / 2.0);

        let from_speed = (1.0 / hypot_length(from_incline)) * self.walk_speed;
        let to_speed = (1.0 / hypot_length(to_incline)) * self.walk_speed;

        let mut duration = (from_speed + to_speed) * TILE_SIZE;

        let cliff_height = (to_height - from_height) as f32 * TILE_SIZE_Z;
        if cliff_height > 0.0 {
            duration += cliff_height / self.climb_speed;
        }
        duration
    }
}

fn hypot_length(incline: f32) -> f32 {
    1.0f32.hypot(incline)
}
