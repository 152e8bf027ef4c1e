use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[cfg(feature = "generation-profile")]
use std::time::Instant;

use glam::{Mat4, Vec3};
use rayon::prelude::*;

use crate::chunk::Chunk;
use crate::config::{check_chunk_size, MapConfig, TILE_SIZE, TILE_SIZE_Z};
use crate::error::MapError;
use crate::generator::{HeightField, HeightFieldGenerator};
use crate::pathfinding::{a_star, Path, TerrainCost};
use crate::persistence::{read_map, write_map};
use crate::tiles::{TileCatalog, TileInstance, TileShape};
use crate::types::{tile_center, tile_to_chunk, ChunkCoord, TileCoord};
use crate::visibility::VisibilitySelector;

pub trait ChunkRenderer {
    /// `origin` is the world position the chunk's local (0, 0) tile center maps to.
    fn draw_chunk(&mut self, origin: Vec3, chunk: &Chunk);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub drawn: usize,
    pub culled: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Debug)]
pub struct ChunkGrid {
    chunk_size: usize,
    x_chunks: usize,
    y_chunks: usize,
    seed: u64,
    chunks: Vec<Chunk>,
}

impl ChunkGrid {
    pub fn empty(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            x_chunks: 0,
            y_chunks: 0,
            seed: 0,
            chunks: Vec::new(),
        }
    }

    /// `chunks` must hold `x_chunks * y_chunks` chunks of `chunk_size`, x-major.
    pub fn from_chunks(
        chunk_size: usize,
        x_chunks: usize,
        y_chunks: usize,
        chunks: Vec<Chunk>,
    ) -> Result<Self, MapError> {
        check_chunk_size(chunk_size)?;
        if chunks.len() != x_chunks * y_chunks {
            return Err(MapError::malformed(format!(
                "expected {} chunks, got {}",
                x_chunks * y_chunks,
                chunks.len()
            )));
        }
        if chunks.iter().any(|c| c.size() != chunk_size) {
            return Err(MapError::malformed("chunk size mismatch"));
        }
        Ok(Self {
            chunk_size,
            x_chunks,
            y_chunks,
            seed: 0,
            chunks,
        })
    }

    /// Builds every chunk from its window of `field`. Trailing samples that do
    /// not fill a whole chunk are dropped.
    pub fn generate(
        chunk_size: usize,
        field: &HeightField,
        seed: u64,
        catalog: &TileCatalog,
    ) -> Result<Self, MapError> {
        check_chunk_size(chunk_size)?;
        if field.x_size() == 0 {
            return Err(MapError::EmptyHeightField);
        }
        let x_chunks = (field.x_size() - 1) / chunk_size;
        let y_chunks = field.y_size().saturating_sub(1) / chunk_size;

        let chunks: Vec<Chunk> = (0..x_chunks * y_chunks)
            .into_par_iter()
            .map(|i| {
                let (mx, my) = (i / y_chunks, i % y_chunks);
                Chunk::generate(
                    chunk_size,
                    field,
                    mx * chunk_size,
                    my * chunk_size,
                    seed,
                    catalog,
                )
            })
            .collect();

        Ok(Self {
            chunk_size,
            x_chunks,
            y_chunks,
            seed,
            chunks,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn x_chunks(&self) -> usize {
        self.x_chunks
    }

    pub fn y_chunks(&self) -> usize {
        self.y_chunks
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn size(&self) -> (usize, usize) {
        (
            self.x_chunks * self.chunk_size,
            self.y_chunks * self.chunk_size,
        )
    }

    pub fn real_chunk_size(&self) -> f32 {
        self.chunk_size as f32 * TILE_SIZE
    }

    #[inline]
    fn chunk_index(&self, chunk: ChunkCoord) -> Option<usize> {
        if chunk.x < 0 || chunk.y < 0 {
            return None;
        }
        let (cx, cy) = (chunk.x as usize, chunk.y as usize);
        (cx < self.x_chunks && cy < self.y_chunks).then_some(cx * self.y_chunks + cy)
    }

    pub fn chunk(&self, chunk: ChunkCoord) -> Option<&Chunk> {
        self.chunk_index(chunk).map(|i| &self.chunks[i])
    }

    fn chunk_mut(&mut self, chunk: ChunkCoord) -> Option<&mut Chunk> {
        self.chunk_index(chunk).map(move |i| &mut self.chunks[i])
    }

    pub fn chunks(&self) -> impl Iterator<Item = (ChunkCoord, &Chunk)> + '_ {
        let y_chunks = self.y_chunks.max(1);
        self.chunks.iter().enumerate().map(move |(i, c)| {
            (
                ChunkCoord {
                    x: (i / y_chunks) as i32,
                    y: (i % y_chunks) as i32,
                },
                c,
            )
        })
    }

    pub fn tile_at(&self, tile: TileCoord) -> Option<&TileInstance> {
        let (chunk, local) = tile_to_chunk(tile, self.chunk_size);
        self.chunk(chunk)?.get(local[0], local[1])
    }

    pub fn height_at(&self, tile: TileCoord) -> i32 {
        let (chunk, local) = tile_to_chunk(tile, self.chunk_size);
        self.chunk(chunk)
            .map_or(0, |c| c.height_at(local[0], local[1]))
    }

    /// Surface elevation under a world position, found by casting a ray down
    /// from just above the tile. 0 when there is no tile.
    pub fn height_at_world(&self, x: f32, y: f32) -> f32 {
        let tile = TileCoord::new(
            (x / TILE_SIZE).floor() as i32,
            (y / TILE_SIZE).floor() as i32,
        );
        let Some(instance) = self.tile_at(tile) else {
            return 0.0;
        };

        let ray_start = instance.highest_surface() + 1.0;
        match instance.intersect_fraction(
            tile_center(tile),
            Vec3::new(x, y, ray_start),
            Vec3::NEG_Z,
        ) {
            Some(t) => ray_start - t,
            None => instance.height() as f32 * TILE_SIZE_Z,
        }
    }

    pub fn position_of(&self, tile: TileCoord) -> Vec3 {
        let center = tile_center(tile);
        center.extend(self.height_at(tile) as f32 * TILE_SIZE_Z)
    }

    pub fn tile_intersect(&self, origin: Vec3, direction: Vec3, tile: TileCoord) -> Option<f32> {
        match self.tile_at(tile) {
            Some(instance) => instance.intersect_fraction(tile_center(tile), origin, direction),
            None => {
                log::warn!("({}, {}) is not on the map", tile.x, tile.y);
                None
            }
        }
    }

    pub fn set_tile(&mut self, tile: TileCoord, instance: Option<TileInstance>) -> Option<TileInstance> {
        let (chunk, local) = tile_to_chunk(tile, self.chunk_size);
        self.chunk_mut(chunk)?.set(local[0], local[1], instance)
    }

    pub fn chunk_origin(&self, chunk: ChunkCoord) -> Vec3 {
        let real = self.real_chunk_size();
        Vec3::new(
            chunk.x as f32 * real + TILE_SIZE * 0.5,
            chunk.y as f32 * real + TILE_SIZE * 0.5,
            0.0,
        )
    }
}

/// Shared map of tiles. One lock guards the chunk grid: regeneration swaps it
/// in under the write lock, drawing and queries hold the read lock.
pub struct TileMap {
    config: MapConfig,
    catalog: Arc<TileCatalog>,
    grid: RwLock<ChunkGrid>,
    highlighted_chunks: Mutex<BTreeSet<ChunkCoord>>,
    visibility: Mutex<VisibilitySelector>,
    listeners: Mutex<Vec<(ListenerId, ChangeListener)>>,
    next_listener: AtomicU64,
}

impl TileMap {
    pub fn new(config: MapConfig, catalog: Arc<TileCatalog>) -> Result<Self, MapError> {
        config.validate()?;
        Ok(Self::with_grid_state(config, catalog, ChunkGrid::empty(config.chunk_size)))
    }

    fn with_grid_state(config: MapConfig, catalog: Arc<TileCatalog>, grid: ChunkGrid) -> Self {
        Self {
            config,
            catalog,
            grid: RwLock::new(grid),
            highlighted_chunks: Mutex::new(BTreeSet::new()),
            visibility: Mutex::new(VisibilitySelector::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    pub fn read_from<R: Read>(
        config: MapConfig,
        catalog: Arc<TileCatalog>,
        input: &mut R,
    ) -> Result<Self, MapError> {
        config.validate()?;
        let grid = read_map(input, &catalog)?;
        Ok(Self::with_grid_state(config, catalog, grid))
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<TileCatalog> {
        &self.catalog
    }

    pub fn with_grid<R>(&self, f: impl FnOnce(&ChunkGrid) -> R) -> R {
        let grid = self.grid.read().unwrap_or_else(PoisonError::into_inner);
        f(&grid)
    }

    fn with_grid_mut<R>(&self, f: impl FnOnce(&mut ChunkGrid) -> R) -> R {
        let mut grid = self.grid.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut grid)
    }

    /// Replaces the whole map with one built from `generator`. Blocks until the
    /// new grid is installed; must not be called from inside [`TileMap::draw`].
    pub fn generate(&self, generator: &dyn HeightFieldGenerator) -> Result<(), MapError> {
        #[cfg(feature = "generation-profile")]
        let start = Instant::now();

        let field = generator.generate_height_field();
        let grid = ChunkGrid::generate(self.config.chunk_size, &field, generator.seed(), &self.catalog)?;
        log::debug!(
            "generated tile map: {} x {} tiles in {} x {} chunks",
            grid.size().0,
            grid.size().1,
            grid.x_chunks,
            grid.y_chunks
        );

        self.install(grid);

        #[cfg(feature = "generation-profile")]
        log::info!(
            "tile map generation {:.2}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    fn install(&self, grid: ChunkGrid) {
        self.with_grid_mut(|current| *current = grid);
        self.highlighted_chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.notify_listeners();
    }

    pub fn size(&self) -> (usize, usize) {
        self.with_grid(ChunkGrid::size)
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        let (x, y) = self.size();
        (
            Vec3::new(0.0, 0.0, -100.0),
            Vec3::new(x as f32, y as f32, 100.0),
        )
    }

    pub fn height_at(&self, tile: TileCoord) -> i32 {
        self.with_grid(|g| g.height_at(tile))
    }

    pub fn height_at_world(&self, x: f32, y: f32) -> f32 {
        self.with_grid(|g| g.height_at_world(x, y))
    }

    pub fn position_of(&self, tile: TileCoord) -> Vec3 {
        self.with_grid(|g| g.position_of(tile))
    }

    pub fn tile_at(&self, tile: TileCoord) -> Option<TileInstance> {
        self.with_grid(|g| g.tile_at(tile).cloned())
    }

    pub fn tile_intersect(&self, origin: Vec3, direction: Vec3, tile: TileCoord) -> Option<f32> {
        self.with_grid(|g| g.tile_intersect(origin, direction, tile))
    }

    /// Places `instance` and returns the tile it replaced. Off-map coordinates
    /// are a no-op and do not notify listeners.
    pub fn set_tile(&self, tile: TileCoord, instance: Option<TileInstance>) -> Option<TileInstance> {
        let (on_map, previous) = self.with_grid_mut(|g| {
            let (chunk, _) = tile_to_chunk(tile, g.chunk_size);
            if g.chunk(chunk).is_none() {
                return (false, None);
            }
            (true, g.set_tile(tile, instance))
        });
        if on_map {
            self.notify_listeners();
        }
        previous
    }

    pub fn replace_tile(&self, tile: TileCoord, shape: Arc<TileShape>) {
        let changed = self.with_grid_mut(|g| {
            let (chunk, _) = tile_to_chunk(tile, g.chunk_size);
            if g.chunk(chunk).is_none() {
                return false;
            }
            let replacement = match g.tile_at(tile) {
                Some(old) => old.replace_with(shape),
                None => TileInstance::new(shape, 0),
            };
            g.set_tile(tile, Some(replacement));
            true
        });
        if changed {
            self.notify_listeners();
        }
    }

    pub fn set_highlights(&self, tiles: &[TileCoord]) {
        let mut highlighted = self
            .highlighted_chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.with_grid_mut(|g| {
            for coord in highlighted.iter() {
                if let Some(chunk) = g.chunk_mut(*coord) {
                    chunk.clear_highlight();
                }
            }
            highlighted.clear();

            for &tile in tiles {
                let (coord, local) = tile_to_chunk(tile, g.chunk_size);
                let Some(chunk) = g.chunk_mut(coord) else {
                    continue;
                };
                chunk.highlight(local[0], local[1]);
                highlighted.insert(coord);
            }
        });
    }

    pub fn set_highlight_visible(&self, visible: bool) {
        self.with_grid_mut(|g| {
            for chunk in &mut g.chunks {
                chunk.set_highlight(visible);
            }
        });
    }

    pub fn draw(&self, view_proj: Mat4, renderer: &mut dyn ChunkRenderer) -> DrawStats {
        let grid = self.grid.read().unwrap_or_else(PoisonError::into_inner);
        let mut selector = self.visibility.lock().unwrap_or_else(PoisonError::into_inner);
        let visible = selector.select(&grid, view_proj);

        for &coord in &visible {
            if let Some(chunk) = grid.chunk(coord) {
                renderer.draw_chunk(grid.chunk_origin(coord), chunk);
            }
        }
        DrawStats {
            drawn: visible.len(),
            culled: grid.chunks.len() - visible.len(),
        }
    }

    pub fn culled_average(&self) -> f32 {
        self.visibility
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .culled_average()
    }

    pub fn find_path(&self, start: TileCoord, target: TileCoord) -> Option<Path> {
        let cost = TerrainCost::new(self.config.walk_speed, self.config.climb_speed);
        let min_step = cost.min_step_cost(&self.catalog);
        self.with_grid(|grid| {
            let (x, y) = grid.size();
            if x == 0 || y == 0 {
                return None;
            }
            a_star(
                start,
                target,
                x as i32 - 1,
                y as i32 - 1,
                |a, b| cost.edge_cost(grid, a, b),
                min_step,
            )
        })
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<(), MapError> {
        self.with_grid(|grid| write_map(out, &self.catalog, grid))
    }

    /// Replaces the map with one read from `input`. Nothing changes unless the
    /// whole stream reads successfully.
    pub fn load_from<R: Read>(&self, input: &mut R) -> Result<(), MapError> {
        let grid = read_map(input, &self.catalog)?;
        self.install(grid);
        Ok(())
    }

    pub fn add_change_listener(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    pub fn remove_change_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn notify_listeners(&self) {
        let listeners: Vec<ChangeListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::config::MAX_CHUNK_SIZE;
    use crate::generator::FixedGenerator;
    use crate::tiles::Orientation;

    fn map_with(chunk_size: usize, field: HeightField) -> TileMap {
        let map = TileMap::new(
            MapConfig::default().with_chunk_size(chunk_size),
            Arc::new(TileCatalog::with_defaults()),
        )
        .unwrap();
        map.generate(&FixedGenerator::new(field)).unwrap();
        map
    }

    fn stepped_field(size: usize) -> HeightField {
        let mut field = HeightField::new(size, size);
        for x in 0..size {
            for y in 0..size {
                field.set(x, y, (x / 3) as f32);
            }
        }
        field
    }

    #[test]
    fn nine_by_nine_field_truncates_to_two_by_two_chunks() {
        let map = map_with(4, stepped_field(9));
        map.with_grid(|g| {
            assert_eq!((g.x_chunks(), g.y_chunks()), (2, 2));
            assert_eq!(g.size(), (8, 8));
        });
        assert_eq!(map.height_at(TileCoord::new(10, 10)), 0);
        assert!(map.tile_at(TileCoord::new(7, 7)).is_some());
        assert!(map.tile_at(TileCoord::new(8, 0)).is_none());
    }

    #[test]
    fn empty_field_is_rejected_and_keeps_old_grid() {
        let map = map_with(4, stepped_field(9));
        let result = map.generate(&FixedGenerator::new(HeightField::new(0, 5)));
        assert!(matches!(result, Err(MapError::EmptyHeightField)));
        assert_eq!(map.size(), (8, 8));
    }

    #[test]
    fn off_map_queries_degrade_to_defaults() {
        let map = map_with(4, stepped_field(9));
        for tile in [
            TileCoord::new(-1, 0),
            TileCoord::new(0, -1),
            TileCoord::new(8, 3),
            TileCoord::new(3, 8),
        ] {
            assert_eq!(map.height_at(tile), 0);
            assert!(map.tile_at(tile).is_none());
            assert!(map.tile_intersect(Vec3::Z, Vec3::NEG_Z, tile).is_none());
        }
        assert_eq!(map.height_at_world(-3.0, 1.0), 0.0);
    }

    #[test]
    fn oversized_chunk_size_is_rejected_up_front() {
        let catalog = Arc::new(TileCatalog::with_defaults());
        let result = TileMap::new(MapConfig::default().with_chunk_size(1 << 32), Arc::clone(&catalog));
        assert!(matches!(result, Err(MapError::InvalidChunkSize(_))));
        assert!(matches!(
            ChunkGrid::generate(MAX_CHUNK_SIZE + 1, &stepped_field(9), 0, &catalog),
            Err(MapError::InvalidChunkSize(_))
        ));
    }

    #[test]
    fn whole_map_replacements_notify_listeners() {
        let map = TileMap::new(
            MapConfig::default().with_chunk_size(4),
            Arc::new(TileCatalog::with_defaults()),
        )
        .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        map.add_change_listener(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        map.generate(&FixedGenerator::new(stepped_field(9))).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let mut bytes = Vec::new();
        map.write_to(&mut bytes).unwrap();
        map.load_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let truncated = &bytes[..bytes.len() / 2];
        assert!(map.load_from(&mut &truncated[..]).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // an emptied on-map cell takes the replacement at offset 0
        let tile = TileCoord::new(5, 5);
        map.set_tile(tile, None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let ramp = Arc::clone(map.catalog().default_for(Orientation(0b0011)).unwrap());
        map.replace_tile(tile, Arc::clone(&ramp));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let placed = map.tile_at(tile).unwrap();
        assert!(Arc::ptr_eq(&placed.shape, &ramp));
        assert_eq!(placed.offset, 0);
    }

    #[test]
    fn off_map_writes_change_nothing() {
        let map = map_with(4, stepped_field(9));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        map.add_change_listener(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut before = Vec::new();
        map.write_to(&mut before).unwrap();

        let shape = Arc::clone(map.catalog().default_for(Orientation::FLAT).unwrap());
        assert!(map
            .set_tile(TileCoord::new(8, 0), Some(TileInstance::new(Arc::clone(&shape), 9)))
            .is_none());
        map.replace_tile(TileCoord::new(-1, 2), shape);

        let mut after = Vec::new();
        map.write_to(&mut after).unwrap();
        assert_eq!(before, after);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn set_tile_notifies_listeners_after_the_write() {
        let map = Arc::new(map_with(4, stepped_field(9)));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (map_ref, seen_ref) = (Arc::clone(&map), Arc::clone(&seen));
        let id = map.add_change_listener(move || {
            // the lock is free again and the new tile is visible
            let h = map_ref.height_at(TileCoord::new(1, 1));
            seen_ref.lock().unwrap().push(h);
        });

        let shape = Arc::clone(map.catalog().default_for(Orientation::FLAT).unwrap());
        let previous = map.set_tile(TileCoord::new(1, 1), Some(TileInstance::new(shape, 7)));
        assert_eq!(previous.unwrap().offset, 0);
        assert_eq!(*seen.lock().unwrap(), vec![7]);

        assert!(map.remove_change_listener(id));
        assert!(!map.remove_change_listener(id));
        map.set_tile(TileCoord::new(1, 1), None);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(map.height_at(TileCoord::new(1, 1)), 0);
    }

    #[test]
    fn replace_tile_keeps_offset() {
        let map = map_with(4, stepped_field(9));
        let tile = TileCoord::new(6, 2);
        let old = map.tile_at(tile).unwrap();
        let ramp = Arc::clone(map.catalog().default_for(Orientation(0b0011)).unwrap());
        map.replace_tile(tile, Arc::clone(&ramp));
        let new = map.tile_at(tile).unwrap();
        assert!(Arc::ptr_eq(&new.shape, &ramp));
        assert_eq!(new.offset, old.offset);
    }

    #[test]
    fn world_height_follows_the_tile_surface() {
        let map = map_with(4, stepped_field(9));
        // tile (2, y) rises from height 0 at x = 2 to 1 at x = 3
        let tile = TileCoord::new(2, 1);
        assert_eq!(map.tile_at(tile).unwrap().shape.orientation(), Orientation(0b1010));
        let low = map.height_at_world(2.0 * TILE_SIZE + 0.01, 1.5 * TILE_SIZE);
        let high = map.height_at_world(3.0 * TILE_SIZE - 0.01, 1.5 * TILE_SIZE);
        let mid = map.height_at_world(2.5 * TILE_SIZE, 1.5 * TILE_SIZE);
        assert!(low.abs() < 0.01);
        assert!((high - TILE_SIZE_Z).abs() < 0.01);
        assert!((mid - 0.5 * TILE_SIZE_Z).abs() < 0.01);

        let flat = map.height_at_world(4.5 * TILE_SIZE, 0.5 * TILE_SIZE);
        assert!((flat - TILE_SIZE_Z).abs() < 1e-4);
        assert_eq!(map.position_of(TileCoord::new(4, 0)).z, TILE_SIZE_Z);
    }

    #[test]
    fn highlights_replace_previous_set() {
        let map = map_with(4, stepped_field(9));
        map.set_highlights(&[TileCoord::new(0, 0), TileCoord::new(5, 5), TileCoord::new(40, 1)]);
        map.with_grid(|g| {
            assert!(g.tile_at(TileCoord::new(0, 0)).unwrap().highlighted);
            assert_eq!(g.chunk(ChunkCoord { x: 1, y: 1 }).unwrap().highlighted().len(), 1);
        });

        map.set_highlights(&[TileCoord::new(1, 1)]);
        map.with_grid(|g| {
            assert!(!g.tile_at(TileCoord::new(0, 0)).unwrap().highlighted);
            assert!(g.tile_at(TileCoord::new(1, 1)).unwrap().highlighted);
            assert!(g.chunk(ChunkCoord { x: 1, y: 1 }).unwrap().highlighted().is_empty());
        });

        map.set_highlight_visible(true);
        map.with_grid(|g| {
            let chunk = g.chunk(ChunkCoord { x: 0, y: 0 }).unwrap();
            assert_eq!(chunk.visible_highlights().collect::<Vec<_>>(), vec![(1, 1)]);
        });
    }

    struct Recorder(Vec<Vec3>);

    impl ChunkRenderer for Recorder {
        fn draw_chunk(&mut self, origin: Vec3, _chunk: &Chunk) {
            self.0.push(origin);
        }
    }

    #[test]
    fn draw_passes_translated_chunk_origins() {
        let map = map_with(4, stepped_field(9));
        let mut recorder = Recorder(Vec::new());

        // orthographic view over the whole map
        let view_proj = Mat4::orthographic_rh_gl(-1.0, 20.0, -1.0, 20.0, -50.0, 50.0);
        let stats = map.draw(view_proj, &mut recorder);
        assert_eq!(stats, DrawStats { drawn: 4, culled: 0 });
        let real = 4.0 * TILE_SIZE;
        assert!(recorder.0.contains(&Vec3::new(real + 1.0, 1.0, 0.0)));
        assert!(recorder.0.contains(&Vec3::new(1.0, real + 1.0, 0.0)));

        // only the x = 0 column of chunks
        let view_proj = Mat4::orthographic_rh_gl(-1.0, 7.0, -1.0, 20.0, -50.0, 50.0);
        let stats = map.draw(view_proj, &mut Recorder(Vec::new()));
        assert_eq!(stats, DrawStats { drawn: 2, culled: 2 });
        assert!((map.culled_average() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn regeneration_is_atomic_for_concurrent_readers() {
        let map = Arc::new(map_with(4, stepped_field(9)));
        let reader = {
            let map = Arc::clone(&map);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    map.with_grid(|g| {
                        let (x, y) = g.size();
                        assert_eq!(g.chunks().count() * 16, x * y);
                        assert!((x, y) == (8, 8) || (x, y) == (16, 16));
                    });
                }
            })
        };
        for i in 0..20 {
            let size = if i % 2 == 0 { 17 } else { 9 };
            map.generate(&FixedGenerator::new(stepped_field(size))).unwrap();
        }
        reader.join().unwrap();
    }

    #[test]
    fn generation_builds_chunks_in_row_major_windows() {
        let map = map_with(2, stepped_field(7));
        map.with_grid(|g| {
            let coords: Vec<_> = g.chunks().map(|(c, _)| (c.x, c.y)).collect();
            assert_eq!(coords, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2), (2, 0), (2, 1), (2, 2)]);
        });
        // x = 3 is the first sample at height 1
        assert_eq!(map.height_at(TileCoord::new(2, 0)), 0);
        assert_eq!(map.height_at(TileCoord::new(3, 0)), 1);
    }
}
