use glam::{Vec2, Vec3};

use crate::config::TILE_SIZE;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: TileCoord) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::PositiveX,
        Direction::NegativeX,
        Direction::PositiveY,
        Direction::NegativeY,
    ];

    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx, dy) {
            (1, 0) => Some(Direction::PositiveX),
            (-1, 0) => Some(Direction::NegativeX),
            (0, 1) => Some(Direction::PositiveY),
            (0, -1) => Some(Direction::NegativeY),
            _ => None,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::PositiveX => (1, 0),
            Direction::NegativeX => (-1, 0),
            Direction::PositiveY => (0, 1),
            Direction::NegativeY => (0, -1),
        }
    }

    pub fn inverse(self) -> Self {
        match self {
            Direction::PositiveX => Direction::NegativeX,
            Direction::NegativeX => Direction::PositiveX,
            Direction::PositiveY => Direction::NegativeY,
            Direction::NegativeY => Direction::PositiveY,
        }
    }

    /// Corner indices (`x_pos | y_pos << 1`) of the tile edge facing this direction.
    pub fn edge_corners(self) -> [usize; 2] {
        match self {
            Direction::PositiveX => [1, 3],
            Direction::NegativeX => [0, 2],
            Direction::PositiveY => [2, 3],
            Direction::NegativeY => [0, 1],
        }
    }
}

#[inline]
fn floor_div(value: i32, divisor: i32) -> i32 {
    value.div_euclid(divisor)
}

#[inline]
fn floor_mod(value: i32, divisor: i32) -> i32 {
    value.rem_euclid(divisor)
}

#[inline]
fn signed_size(chunk_size: usize) -> i32 {
    i32::try_from(chunk_size).unwrap_or(i32::MAX).max(1)
}

pub fn tile_to_chunk(tile: TileCoord, chunk_size: usize) -> (ChunkCoord, [usize; 2]) {
    let size = signed_size(chunk_size);
    let chunk = ChunkCoord {
        x: floor_div(tile.x, size),
        y: floor_div(tile.y, size),
    };

    let local = [
        floor_mod(tile.x, size) as usize,
        floor_mod(tile.y, size) as usize,
    ];

    (chunk, local)
}

pub fn chunk_to_tile_min(chunk: ChunkCoord, chunk_size: usize) -> TileCoord {
    let size = signed_size(chunk_size);
    TileCoord {
        x: chunk.x.saturating_mul(size),
        y: chunk.y.saturating_mul(size),
    }
}

pub fn world_to_tile(position: Vec3) -> TileCoord {
    TileCoord {
        x: (position.x / TILE_SIZE).floor() as i32,
        y: (position.y / TILE_SIZE).floor() as i32,
    }
}

pub fn tile_center(tile: TileCoord) -> Vec2 {
    Vec2::new(
        (tile.x as f32 + 0.5) * TILE_SIZE,
        (tile.y as f32 + 0.5) * TILE_SIZE,
    )
}
