pub mod chunk;
pub mod codec;
pub mod config;
pub mod error;
pub mod generator;
pub mod pathfinding;
pub mod persistence;
pub mod tile_map;
pub mod tiles;
pub mod types;
pub mod visibility;

pub use chunk::{Chunk, Extremes};
pub use config::{MapConfig, TILE_SIZE, TILE_SIZE_Z};
pub use error::MapError;
pub use generator::{
    CornerCopyGenerator, FixedGenerator, HeightField, HeightFieldGenerator, ProceduralGenerator,
};
pub use pathfinding::{a_star, Path, TerrainCost};
pub use persistence::{default_save_path, load_map, read_map, save_map, write_map};
pub use tile_map::{ChunkGrid, ChunkRenderer, DrawStats, ListenerId, TileMap};
pub use tiles::{
    resolve, Orientation, Resolution, ShapeDefinition, SubstitutionReason, TileCatalog,
    TileInstance, TileShape,
};
pub use types::{
    chunk_to_tile_min, tile_to_chunk, world_to_tile, ChunkCoord, Direction, TileCoord,
};
pub use visibility::{aabb_in_view, VisibilitySelector};
