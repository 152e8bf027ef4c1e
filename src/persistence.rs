//! Binary map stream and compressed save files.
//!
//! Stream layout: the shape table (`[id][name][set or "null"][orientation]` per
//! shape, behind a count), then `[chunk size][x chunks][y chunks]`, then every
//! chunk body x outer, y inner. Chunks refer to shapes by table id only.

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use crate::chunk::Chunk;
use crate::codec::{read_i32, read_str, write_i32, write_str};
use crate::config::MAX_CHUNK_SIZE;
use crate::error::MapError;
use crate::tile_map::{ChunkGrid, TileMap};
use crate::tiles::{resolve, Resolution, SubstitutionReason, TileCatalog, TileShape, NO_SOURCE_SET};

pub fn default_save_path() -> PathBuf {
    PathBuf::from("saves").join("map.tmap")
}

pub fn write_map<W: Write>(out: &mut W, catalog: &TileCatalog, grid: &ChunkGrid) -> Result<(), MapError> {
    let count = i32::try_from(catalog.len()).map_err(|_| MapError::malformed("too many tile shapes"))?;
    write_i32(out, count)?;
    for shape in catalog.shapes() {
        write_i32(out, shape.id() as i32)?;
        write_str(out, shape.name())?;
        write_str(out, shape.source_set().unwrap_or(NO_SOURCE_SET))?;
        write_i32(out, shape.orientation().bits())?;
    }

    let dims = [grid.chunk_size(), grid.x_chunks(), grid.y_chunks()];
    for dim in dims {
        let dim = i32::try_from(dim).map_err(|_| MapError::malformed(format!("dimension {dim} out of range")))?;
        write_i32(out, dim)?;
    }
    for (_, chunk) in grid.chunks() {
        chunk.write_to(out)?;
    }
    Ok(())
}

/// Reads a complete grid. Shapes that no longer match `catalog` are replaced by
/// the plain shape of the stored orientation; see [`resolve`].
pub fn read_map<R: Read>(input: &mut R, catalog: &TileCatalog) -> Result<ChunkGrid, MapError> {
    let count = read_i32(input)?;
    if count < 0 {
        return Err(MapError::malformed(format!("negative tile type count {count}")));
    }

    let mut mapping: HashMap<i32, Arc<TileShape>> = HashMap::new();
    for _ in 0..count {
        let id = read_i32(input)?;
        let name = read_str(input)?;
        let set = read_str(input)?;
        let orientation = read_i32(input)?;

        if set != NO_SOURCE_SET && !catalog.has_source_set(&set) {
            log::warn!("tile `{}` comes from unknown source set `{}`", name, set);
        }
        match resolve(&name, orientation, catalog) {
            Resolution::Exact(shape) => {
                mapping.insert(id, shape);
            }
            Resolution::Substituted { shape, reason } => {
                match reason {
                    SubstitutionReason::GenericDefault => {}
                    SubstitutionReason::UnknownName => {
                        log::warn!("unknown tile `{}`, using `{}`", name, shape.name())
                    }
                    SubstitutionReason::OrientationMismatch { stored, found } => log::warn!(
                        "tile `{}` orientation changed from {} to {}, using `{}`",
                        name,
                        stored,
                        found,
                        shape.name()
                    ),
                }
                mapping.insert(id, shape);
            }
            Resolution::Missing => {
                log::warn!("no tile available for `{}` with orientation {}", name, orientation);
            }
        }
    }

    let chunk_size = read_i32(input)?;
    let x_chunks = read_i32(input)?;
    let y_chunks = read_i32(input)?;
    if chunk_size <= 0 || chunk_size as usize > MAX_CHUNK_SIZE || x_chunks < 0 || y_chunks < 0 {
        return Err(MapError::malformed(format!(
            "bad dimensions: chunk size {chunk_size}, {x_chunks} x {y_chunks} chunks"
        )));
    }
    let (chunk_size, x_chunks, y_chunks) = (chunk_size as usize, x_chunks as usize, y_chunks as usize);
    let total = x_chunks
        .checked_mul(y_chunks)
        .ok_or_else(|| MapError::malformed("chunk count overflows"))?;

    let mut chunks = Vec::new();
    for _ in 0..total {
        chunks.push(Chunk::read_from(chunk_size, input, &mapping)?);
    }
    log::debug!(
        "read tile map: {} x {} tiles, {} tile types",
        x_chunks * chunk_size,
        y_chunks * chunk_size,
        count
    );
    ChunkGrid::from_chunks(chunk_size, x_chunks, y_chunks, chunks)
}

pub fn save_map(path: &Path, map: &TileMap) -> anyhow::Result<()> {
    let mut bytes = Vec::new();
    map.write_to(&mut bytes).context("encoding tile map")?;
    let packed = compress_prepend_size(&bytes);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, packed).with_context(|| format!("writing {}", path.display()))?;
    log::info!("saved tile map to {}", path.display());
    Ok(())
}

pub fn load_map(path: &Path, map: &TileMap) -> anyhow::Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let unpacked = decompress_size_prepended(&bytes)?;
    map.load_from(&mut unpacked.as_slice())
        .with_context(|| format!("decoding {}", path.display()))?;
    log::info!("loaded tile map from {}", path.display());
    Ok(())
}
