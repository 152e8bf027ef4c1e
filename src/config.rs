use serde::{Deserialize, Serialize};

use crate::error::MapError;

pub const TILE_SIZE: f32 = 2.0;
pub const TILE_SIZE_Z: f32 = 0.5;

pub const DEFAULT_CHUNK_SIZE: usize = 16;
pub const MAX_CHUNK_SIZE: usize = 1024;
const DEFAULT_WALK_SPEED: f32 = 1.0;
const DEFAULT_CLIMB_SPEED: f32 = 0.5;

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub fn check_chunk_size(chunk_size: usize) -> Result<(), MapError> {
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(MapError::InvalidChunkSize(
            i64::try_from(chunk_size).unwrap_or(i64::MAX),
        ));
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub chunk_size: usize,
    pub walk_speed: f32,
    pub climb_speed: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            walk_speed: DEFAULT_WALK_SPEED,
            climb_speed: DEFAULT_CLIMB_SPEED,
        }
    }
}

impl MapConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Defaults overridden by `TILE_MAP_CHUNK_SIZE`, `TILE_MAP_WALK_SPEED` and
    /// `TILE_MAP_CLIMB_SPEED` when they are set and parse.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chunk_size: env_parse("TILE_MAP_CHUNK_SIZE", defaults.chunk_size),
            walk_speed: env_parse("TILE_MAP_WALK_SPEED", defaults.walk_speed),
            climb_speed: env_parse("TILE_MAP_CLIMB_SPEED", defaults.climb_speed),
        }
    }

    pub fn validate(&self) -> Result<(), MapError> {
        check_chunk_size(self.chunk_size)
    }

    pub fn real_chunk_size(&self) -> f32 {
        self.chunk_size as f32 * TILE_SIZE
    }
}
