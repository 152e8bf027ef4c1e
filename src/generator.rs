use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::MapError;
use crate::tile_map::{ChunkGrid, TileMap};
use crate::types::TileCoord;

/// Elevation samples in tile-height units, indexed `[x][y]`.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    x_size: usize,
    y_size: usize,
    samples: Vec<f32>,
}

impl HeightField {
    pub fn new(x_size: usize, y_size: usize) -> Self {
        Self {
            x_size,
            y_size,
            samples: vec![0.0; x_size * y_size],
        }
    }

    /// Every column must be as long as the first one.
    pub fn from_columns(columns: Vec<Vec<f32>>) -> Result<Self, MapError> {
        let x_size = columns.len();
        let y_size = columns.first().map_or(0, Vec::len);
        if columns.iter().any(|c| c.len() != y_size) {
            return Err(MapError::malformed("height field columns differ in length"));
        }
        Ok(Self {
            x_size,
            y_size,
            samples: columns.into_iter().flatten().collect(),
        })
    }

    pub fn x_size(&self) -> usize {
        self.x_size
    }

    pub fn y_size(&self) -> usize {
        self.y_size
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.samples[x * self.y_size + y]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.samples[x * self.y_size + y] = value;
    }
}

pub trait HeightFieldGenerator {
    /// Tunable parameters in a stable order. The seed is not part of this list.
    fn properties(&self) -> Vec<(String, i32)>;

    fn set_property(&mut self, name: &str, value: i32) -> Result<(), MapError>;

    fn generate_height_field(&self) -> HeightField;

    fn seed(&self) -> u64;

    fn set_dimensions(&mut self, x: usize, y: usize) -> Result<(), MapError>;
}

#[derive(Clone, Debug)]
pub struct FixedGenerator {
    field: HeightField,
}

impl FixedGenerator {
    pub fn new(field: HeightField) -> Self {
        Self { field }
    }
}

impl HeightFieldGenerator for FixedGenerator {
    fn properties(&self) -> Vec<(String, i32)> {
        Vec::new()
    }

    fn set_property(&mut self, name: &str, _value: i32) -> Result<(), MapError> {
        Err(MapError::UnknownProperty(name.to_string()))
    }

    fn generate_height_field(&self) -> HeightField {
        self.field.clone()
    }

    fn seed(&self) -> u64 {
        0
    }

    fn set_dimensions(&mut self, _x: usize, _y: usize) -> Result<(), MapError> {
        Err(MapError::FixedSize {
            x: self.field.x_size,
            y: self.field.y_size,
        })
    }
}

const OCTAVES: &str = "octaves";
const FEATURE_SIZE: &str = "feature size (tiles)";
const AMPLITUDE: &str = "amplitude (tile heights)";

#[derive(Clone, Debug)]
pub struct ProceduralGenerator {
    seed: u64,
    x_size: usize,
    y_size: usize,
    octaves: i32,
    feature_size: i32,
    amplitude: i32,
}

impl ProceduralGenerator {
    pub fn new(seed: u64, x_size: usize, y_size: usize) -> Self {
        Self {
            seed,
            x_size,
            y_size,
            octaves: 4,
            feature_size: 24,
            amplitude: 12,
        }
    }
}

impl HeightFieldGenerator for ProceduralGenerator {
    fn properties(&self) -> Vec<(String, i32)> {
        vec![
            (OCTAVES.to_string(), self.octaves),
            (FEATURE_SIZE.to_string(), self.feature_size),
            (AMPLITUDE.to_string(), self.amplitude),
        ]
    }

    fn set_property(&mut self, name: &str, value: i32) -> Result<(), MapError> {
        match name {
            OCTAVES => self.octaves = value.max(1),
            FEATURE_SIZE => self.feature_size = value.max(1),
            AMPLITUDE => self.amplitude = value,
            _ => return Err(MapError::UnknownProperty(name.to_string())),
        }
        Ok(())
    }

    fn generate_height_field(&self) -> HeightField {
        let mut field = HeightField::new(self.x_size, self.y_size);
        let scale = 1.0 / self.feature_size.max(1) as f32;
        for x in 0..self.x_size {
            for y in 0..self.y_size {
                let n = fbm2(
                    self.seed,
                    x as f32 * scale,
                    y as f32 * scale,
                    self.octaves.max(1) as u32,
                );
                field.set(x, y, n * self.amplitude as f32);
            }
        }
        field
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn set_dimensions(&mut self, x: usize, y: usize) -> Result<(), MapError> {
        self.x_size = x;
        self.y_size = y;
        Ok(())
    }
}

/// Rebuilds a corner height field from the tiles of a live map, so an edited
/// map can be fed back into [`TileMap::generate`].
pub struct CornerCopyGenerator<'a> {
    map: &'a TileMap,
    progress: Arc<AtomicUsize>,
}

impl<'a> CornerCopyGenerator<'a> {
    pub fn new(map: &'a TileMap) -> Self {
        Self {
            map,
            progress: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }

    pub fn progress_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.progress)
    }

    pub fn total_steps(&self) -> usize {
        let (x, y) = self.map.size();
        x * y + x + y + 1
    }
}

impl HeightFieldGenerator for CornerCopyGenerator<'_> {
    fn properties(&self) -> Vec<(String, i32)> {
        Vec::new()
    }

    fn set_property(&mut self, name: &str, _value: i32) -> Result<(), MapError> {
        Err(MapError::UnknownProperty(name.to_string()))
    }

    fn generate_height_field(&self) -> HeightField {
        self.map
            .with_grid(|grid| extract_corners(grid, &self.progress))
    }

    fn seed(&self) -> u64 {
        self.map.with_grid(ChunkGrid::seed)
    }

    fn set_dimensions(&mut self, _x: usize, _y: usize) -> Result<(), MapError> {
        let (x, y) = self.map.size();
        Err(MapError::FixedSize { x: x + 1, y: y + 1 })
    }
}

fn extract_corners(grid: &ChunkGrid, progress: &AtomicUsize) -> HeightField {
    progress.store(0, Ordering::Relaxed);
    let (x_size, y_size) = grid.size();
    let corner = |x: usize, y: usize, x_pos: bool, y_pos: bool| {
        grid.tile_at(TileCoord::new(x as i32, y as i32))
            .map_or(0.0, |t| t.height_of_corner(x_pos, y_pos) as f32)
    };
    let mut field = HeightField::new(x_size + 1, y_size + 1);

    for x in 0..x_size {
        for y in 0..y_size {
            field.set(x, y, corner(x, y, false, false));
            progress.fetch_add(1, Ordering::Relaxed);
        }
        field.set(x, y_size, corner(x, y_size.wrapping_sub(1), false, true));
        progress.fetch_add(1, Ordering::Relaxed);
    }

    for y in 0..y_size {
        field.set(x_size, y, corner(x_size.wrapping_sub(1), y, true, false));
        progress.fetch_add(1, Ordering::Relaxed);
    }

    field.set(
        x_size,
        y_size,
        corner(x_size.wrapping_sub(1), y_size.wrapping_sub(1), true, true),
    );
    progress.fetch_add(1, Ordering::Relaxed);

    field
}

fn fbm2(seed: u64, mut x: f32, mut y: f32, octaves: u32) -> f32 {
    let mut amp = 0.5;
    let mut freq = 1.0;
    let mut sum = 0.0;
    let mut norm = 0.0;
    for _ in 0..octaves {
        sum += amp * value_noise_2d(seed, x * freq, y * freq);
        norm += amp;
        amp *= 0.5;
        freq *= 2.0;
        x += 17.0;
        y += 29.0;
    }
    (sum / norm).clamp(0.0, 1.0)
}

fn value_noise_2d(seed: u64, x: f32, y: f32) -> f32 {
    let xi = x.floor() as i32;
    let yi = y.floor() as i32;
    let tx = smoothstep(x - xi as f32);
    let ty = smoothstep(y - yi as f32);

    let v00 = hash01(seed, xi, yi);
    let v10 = hash01(seed, xi + 1, yi);
    let v01 = hash01(seed, xi, yi + 1);
    let v11 = hash01(seed, xi + 1, yi + 1);

    let a = lerp(v00, v10, tx);
    let b = lerp(v01, v11, tx);
    lerp(a, b, ty)
}

fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub(crate) fn hash_u64(seed: u64, x: i32, y: i32) -> u64 {
    let mut v = seed
        ^ (x as i64 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (y as i64 as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    v ^= v >> 30;
    v = v.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    v ^= v >> 27;
    v = v.wrapping_mul(0x94D0_49BB_1331_11EB);
    v ^ (v >> 31)
}

fn hash01(seed: u64, x: i32, y: i32) -> f32 {
    (hash_u64(seed, x, y) as f64 / u64::MAX as f64) as f32
}
