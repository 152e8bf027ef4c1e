use std::collections::{BTreeSet, HashMap};
use std::io::{Read, Write};
use std::sync::Arc;

use crate::codec::{read_i32, write_i32};
use crate::error::MapError;
use crate::generator::{hash_u64, HeightField};
use crate::tiles::{Orientation, TileCatalog, TileInstance, TileShape};

const EMPTY_SHAPE_ID: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extremes {
    min: f32,
    max: f32,
}

impl Default for Extremes {
    fn default() -> Self {
        Self {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
        }
    }
}

impl Extremes {
    pub fn check(&mut self, value: f32) {
        if value > self.max {
            self.max = value;
        }
        if value < self.min {
            self.min = value;
        }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

#[derive(Clone, Debug)]
pub struct Chunk {
    size: usize,
    tiles: Vec<Option<TileInstance>>,
    extremes: Extremes,
    highlights: BTreeSet<(usize, usize)>,
    highlight_visible: bool,
}

impl Chunk {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            tiles: vec![None; size * size],
            extremes: Extremes::default(),
            highlights: BTreeSet::new(),
            highlight_visible: false,
        }
    }

    /// Builds the chunk whose first tile sits at sample (`from_x`, `from_y`) of
    /// `field`. Each tile reads the four samples at its corners.
    pub fn generate(
        size: usize,
        field: &HeightField,
        from_x: usize,
        from_y: usize,
        seed: u64,
        catalog: &TileCatalog,
    ) -> Self {
        let mut chunk = Self::new(size);
        for lx in 0..size {
            for ly in 0..size {
                let (x, y) = (from_x + lx, from_y + ly);
                let corners = [
                    field.get(x, y),
                    field.get(x + 1, y),
                    field.get(x, y + 1),
                    field.get(x + 1, y + 1),
                ]
                .map(|h| h.round() as i32);
                let base = corners.iter().copied().min().unwrap_or(0);
                let orientation = Orientation::from_corners(corners);

                let candidates: Vec<&Arc<TileShape>> = catalog.with_orientation(orientation).collect();
                if candidates.is_empty() {
                    continue;
                }
                let pick = if candidates.len() == 1 {
                    0
                } else {
                    (hash_u64(seed, x as i32, y as i32) % candidates.len() as u64) as usize
                };
                chunk.tiles[lx * size + ly] =
                    Some(TileInstance::new(Arc::clone(candidates[pick]), base));
            }
        }
        chunk.recompute_extremes();
        chunk
    }

    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.size && y < self.size).then_some(x * self.size + y)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&TileInstance> {
        self.index(x, y).and_then(|i| self.tiles[i].as_ref())
    }

    pub fn set(&mut self, x: usize, y: usize, tile: Option<TileInstance>) -> Option<TileInstance> {
        let idx = self.index(x, y)?;
        let mut tile = tile;
        if let Some(tile) = tile.as_mut() {
            tile.highlighted = self.highlights.contains(&(x, y));
        }
        let previous = std::mem::replace(&mut self.tiles[idx], tile);
        self.recompute_extremes();
        previous
    }

    pub fn height_at(&self, x: usize, y: usize) -> i32 {
        self.get(x, y).map_or(0, TileInstance::height)
    }

    pub fn min_max(&self) -> Extremes {
        self.extremes
    }

    fn recompute_extremes(&mut self) {
        let mut extremes = Extremes::default();
        for tile in self.tiles.iter().flatten() {
            extremes.check(tile.lowest_surface());
            extremes.check(tile.highest_surface());
        }
        self.extremes = extremes;
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &TileInstance)> + '_ {
        let size = self.size;
        self.tiles
            .iter()
            .enumerate()
            .filter_map(move |(i, t)| t.as_ref().map(|t| (i / size, i % size, t)))
    }

    pub fn highlight(&mut self, x: usize, y: usize) {
        let Some(idx) = self.index(x, y) else {
            return;
        };
        self.highlights.insert((x, y));
        if let Some(tile) = self.tiles[idx].as_mut() {
            tile.highlighted = true;
        }
    }

    pub fn set_highlight(&mut self, visible: bool) {
        self.highlight_visible = visible;
    }

    pub fn clear_highlight(&mut self) {
        for tile in self.tiles.iter_mut().flatten() {
            tile.highlighted = false;
        }
        self.highlights.clear();
    }

    pub fn highlighted(&self) -> &BTreeSet<(usize, usize)> {
        &self.highlights
    }

    pub fn visible_highlights(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.highlights
            .iter()
            .copied()
            .filter(move |_| self.highlight_visible)
    }

    /// Writes every slot as `[shape id or -1][offset]`, x outer, y inner. Shapes are
    /// stored by id only; the id table is written separately.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<(), MapError> {
        for tile in &self.tiles {
            match tile {
                Some(tile) => {
                    write_i32(out, tile.shape.id() as i32)?;
                    write_i32(out, tile.offset)?;
                }
                None => {
                    write_i32(out, EMPTY_SHAPE_ID)?;
                    write_i32(out, 0)?;
                }
            }
        }
        Ok(())
    }

    /// Inverse of [`Chunk::write_to`]. Ids absent from `mapping` leave their slot
    /// empty.
    pub fn read_from<R: Read>(
        size: usize,
        input: &mut R,
        mapping: &HashMap<i32, Arc<TileShape>>,
    ) -> Result<Self, MapError> {
        let mut chunk = Self::new(size);
        let mut unresolved = BTreeSet::new();
        for slot in chunk.tiles.iter_mut() {
            let id = read_i32(input)?;
            let offset = read_i32(input)?;
            if id == EMPTY_SHAPE_ID {
                continue;
            }
            match mapping.get(&id) {
                Some(shape) => *slot = Some(TileInstance::new(Arc::clone(shape), offset)),
                None => {
                    unresolved.insert(id);
                }
            }
        }
        if !unresolved.is_empty() {
            log::debug!("chunk references unresolved tile ids {:?}; slots left empty", unresolved);
        }
        chunk.recompute_extremes();
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TILE_SIZE_Z;
    use crate::tiles::ShapeDefinition;

    fn flat(catalog: &TileCatalog, offset: i32) -> TileInstance {
        TileInstance::new(Arc::clone(catalog.default_for(Orientation::FLAT).unwrap()), offset)
    }

    #[test]
    fn set_returns_previous_and_updates_extremes() {
        let catalog = TileCatalog::with_defaults();
        let mut chunk = Chunk::new(4);
        assert!(chunk.min_max().is_empty());

        assert!(chunk.set(1, 2, Some(flat(&catalog, 3))).is_none());
        assert_eq!(chunk.min_max().min(), 3.0 * TILE_SIZE_Z);
        assert_eq!(chunk.min_max().max(), 3.0 * TILE_SIZE_Z);

        let ramp = TileInstance::new(Arc::clone(catalog.default_for(Orientation(0b1111)).unwrap()), -2);
        chunk.set(0, 0, Some(ramp));
        assert_eq!(chunk.min_max().min(), -2.0 * TILE_SIZE_Z);

        let previous = chunk.set(0, 0, None).unwrap();
        assert_eq!(previous.offset, -2);
        assert_eq!(chunk.min_max().min(), 3.0 * TILE_SIZE_Z);
        assert_eq!(chunk.height_at(1, 2), 3);
    }

    #[test]
    fn out_of_range_access_is_inert() {
        let catalog = TileCatalog::with_defaults();
        let mut chunk = Chunk::new(2);
        assert!(chunk.set(2, 0, Some(flat(&catalog, 1))).is_none());
        assert!(chunk.get(2, 0).is_none());
        assert_eq!(chunk.height_at(5, 5), 0);
        assert_eq!(chunk.iter().count(), 0);
    }

    #[test]
    fn highlight_toggle_keeps_the_set() {
        let catalog = TileCatalog::with_defaults();
        let mut chunk = Chunk::new(4);
        chunk.set(1, 1, Some(flat(&catalog, 0)));
        chunk.highlight(1, 1);
        chunk.highlight(3, 0);
        assert!(chunk.get(1, 1).unwrap().highlighted);

        assert_eq!(chunk.visible_highlights().count(), 0);
        chunk.set_highlight(true);
        assert_eq!(chunk.visible_highlights().count(), 2);
        chunk.set_highlight(false);
        assert_eq!(chunk.highlighted().len(), 2);

        chunk.clear_highlight();
        assert!(chunk.highlighted().is_empty());
        assert!(!chunk.get(1, 1).unwrap().highlighted);
    }

    #[test]
    fn generation_picks_shapes_by_corner_orientation() {
        let catalog = TileCatalog::with_defaults();
        // 3x3 samples -> 2x2 tiles; only sample (2, 2) is raised
        let mut field = HeightField::new(3, 3);
        field.set(2, 2, 1.2);
        field.set(0, 0, -0.4);
        let chunk = Chunk::generate(2, &field, 0, 0, 7, &catalog);

        assert_eq!(chunk.get(0, 0).unwrap().shape.orientation(), Orientation::FLAT);
        assert_eq!(chunk.get(1, 1).unwrap().shape.orientation(), Orientation(0b1000));
        assert_eq!(chunk.get(1, 1).unwrap().offset, 0);
        assert_eq!(chunk.min_max().max(), TILE_SIZE_Z);
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let mut catalog = TileCatalog::with_defaults();
        for i in 0..4 {
            catalog
                .register(ShapeDefinition::new(format!("flat_variant_{i}"), [0; 4]))
                .unwrap();
        }
        let field = HeightField::new(9, 9);
        let a = Chunk::generate(8, &field, 0, 0, 42, &catalog);
        let b = Chunk::generate(8, &field, 0, 0, 42, &catalog);
        let ids = |c: &Chunk| c.iter().map(|(_, _, t)| t.shape.id()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(a.iter().count(), 64);
    }

    #[test]
    fn stream_body_round_trips_and_drops_unknown_ids() {
        let catalog = TileCatalog::with_defaults();
        let mut chunk = Chunk::new(3);
        chunk.set(0, 1, Some(flat(&catalog, 5)));
        chunk.set(2, 2, Some(TileInstance::new(Arc::clone(catalog.default_for(Orientation(6)).unwrap()), -1)));

        let mut bytes = Vec::new();
        chunk.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 3 * 3 * 8);

        let mapping: HashMap<i32, Arc<TileShape>> = catalog
            .shapes()
            .iter()
            .map(|s| (s.id() as i32, Arc::clone(s)))
            .collect();
        let back = Chunk::read_from(3, &mut bytes.as_slice(), &mapping).unwrap();
        assert_eq!(back.get(0, 1), chunk.get(0, 1));
        assert_eq!(back.get(2, 2), chunk.get(2, 2));
        assert_eq!(back.min_max(), chunk.min_max());

        let partial: HashMap<i32, Arc<TileShape>> = mapping
            .into_iter()
            .filter(|(id, _)| *id != 6)
            .collect();
        let back = Chunk::read_from(3, &mut bytes.as_slice(), &partial).unwrap();
        assert!(back.get(2, 2).is_none());
        assert!(back.get(0, 1).is_some());
    }

    #[test]
    fn truncated_body_is_an_error() {
        let mut bytes = Vec::new();
        Chunk::new(2).write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 1);
        let result = Chunk::read_from(2, &mut bytes.as_slice(), &HashMap::new());
        assert!(matches!(result, Err(MapError::Io(_))));
    }
}
