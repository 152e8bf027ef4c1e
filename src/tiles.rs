use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::config::{TILE_SIZE, TILE_SIZE_Z};
use crate::error::MapError;
use crate::types::Direction;

/// Name under which older maps stored a tile that had no specific shape.
pub const GENERIC_DEFAULT_NAME: &str = "default";
pub const NO_SOURCE_SET: &str = "null";

/// Bit `i` is set when corner `i` (`x_pos | y_pos << 1`) lies above the
/// lowest corner of the shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Orientation(pub u8);

impl Orientation {
    pub const FLAT: Orientation = Orientation(0);
    pub const COUNT: usize = 16;

    pub fn from_corners(corners: [i32; 4]) -> Self {
        let base = corners.iter().copied().min().unwrap_or(0);
        let mut bits = 0u8;
        for (i, &c) in corners.iter().enumerate() {
            if c > base {
                bits |= 1 << i;
            }
        }
        Orientation(bits)
    }

    /// Stored orientations come from an `i32`; anything outside the four
    /// corner bits has no default shape.
    pub fn from_stored(bits: i32) -> Option<Self> {
        if (0..Self::COUNT as i32).contains(&bits) {
            Some(Orientation(bits as u8))
        } else {
            None
        }
    }

    pub fn bits(self) -> i32 {
        i32::from(self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeDefinition {
    pub name: String,
    pub corner_heights: [i32; 4],
    pub source_set: Option<String>,
}

impl ShapeDefinition {
    pub fn new(name: impl Into<String>, corner_heights: [i32; 4]) -> Self {
        Self {
            name: name.into(),
            corner_heights,
            source_set: None,
        }
    }

    pub fn in_set(mut self, set: impl Into<String>) -> Self {
        self.source_set = Some(set.into());
        self
    }
}

#[derive(Debug, PartialEq)]
pub struct TileShape {
    id: u32,
    name: String,
    orientation: Orientation,
    corner_heights: [i32; 4],
    source_set: Option<String>,
    bounds_min: Vec3,
    bounds_max: Vec3,
}

impl TileShape {
    fn new(id: u32, def: ShapeDefinition) -> Self {
        let lowest = def.corner_heights.iter().copied().min().unwrap_or(0);
        let highest = def.corner_heights.iter().copied().max().unwrap_or(0);
        let half = TILE_SIZE * 0.5;
        Self {
            id,
            orientation: Orientation::from_corners(def.corner_heights),
            corner_heights: def.corner_heights,
            name: def.name,
            source_set: def.source_set,
            bounds_min: Vec3::new(-half, -half, lowest as f32 * TILE_SIZE_Z),
            bounds_max: Vec3::new(half, half, highest as f32 * TILE_SIZE_Z),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn source_set(&self) -> Option<&str> {
        self.source_set.as_deref()
    }

    pub fn corner_heights(&self) -> [i32; 4] {
        self.corner_heights
    }

    pub fn corner_height(&self, x_pos: bool, y_pos: bool) -> i32 {
        self.corner_heights[usize::from(x_pos) | (usize::from(y_pos) << 1)]
    }

    pub fn bounding_box(&self) -> (Vec3, Vec3) {
        (self.bounds_min, self.bounds_max)
    }

    pub fn lowest_corner(&self) -> i32 {
        self.corner_heights.iter().copied().min().unwrap_or(0)
    }

    pub fn highest_corner(&self) -> i32 {
        self.corner_heights.iter().copied().max().unwrap_or(0)
    }
}

impl fmt::Display for TileShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Default)]
pub struct TileCatalog {
    shapes: Vec<Arc<TileShape>>,
    by_name: HashMap<String, usize>,
    by_orientation: Vec<Vec<usize>>,
    defaults: [Option<usize>; Orientation::COUNT],
    source_sets: HashSet<String>,
}

impl TileCatalog {
    pub fn new() -> Self {
        Self {
            by_orientation: vec![Vec::new(); Orientation::COUNT],
            ..Self::default()
        }
    }

    /// Catalog holding one plain shape per orientation, named `plain_<bits>`.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        for bits in 0..Orientation::COUNT {
            let mut corners = [0; 4];
            for (i, corner) in corners.iter_mut().enumerate() {
                if bits & (1 << i) != 0 {
                    *corner = 1;
                }
            }
            let index = catalog.shapes.len();
            // names are unique by construction
            if catalog
                .register(ShapeDefinition::new(format!("plain_{bits}"), corners))
                .is_ok()
            {
                catalog.defaults[bits] = Some(index);
            }
        }
        catalog
    }

    pub fn register(&mut self, def: ShapeDefinition) -> Result<Arc<TileShape>, MapError> {
        if def.name == GENERIC_DEFAULT_NAME || self.by_name.contains_key(&def.name) {
            return Err(MapError::DuplicateShape(def.name));
        }
        if self.by_orientation.len() < Orientation::COUNT {
            self.by_orientation.resize(Orientation::COUNT, Vec::new());
        }
        let index = self.shapes.len();
        if let Some(set) = &def.source_set {
            self.source_sets.insert(set.clone());
        }
        let shape = Arc::new(TileShape::new(index as u32, def));
        self.by_name.insert(shape.name.clone(), index);
        self.by_orientation[usize::from(shape.orientation.0)].push(index);
        self.shapes.push(Arc::clone(&shape));
        Ok(shape)
    }

    pub fn register_source_set(
        &mut self,
        set: &str,
        defs: impl IntoIterator<Item = ShapeDefinition>,
    ) -> Result<Vec<Arc<TileShape>>, MapError> {
        self.source_sets.insert(set.to_string());
        defs.into_iter()
            .map(|def| self.register(def.in_set(set)))
            .collect()
    }

    pub fn has_source_set(&self, set: &str) -> bool {
        self.source_sets.contains(set)
    }

    pub fn shapes(&self) -> &[Arc<TileShape>] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn by_id(&self, id: u32) -> Option<&Arc<TileShape>> {
        self.shapes.get(id as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<TileShape>> {
        self.by_name.get(name).map(|&i| &self.shapes[i])
    }

    pub fn default_for(&self, orientation: Orientation) -> Option<&Arc<TileShape>> {
        self.defaults
            .get(usize::from(orientation.0))
            .copied()
            .flatten()
            .map(|i| &self.shapes[i])
    }

    pub fn with_orientation(&self, orientation: Orientation) -> impl Iterator<Item = &Arc<TileShape>> {
        self.by_orientation
            .get(usize::from(orientation.0))
            .into_iter()
            .flatten()
            .map(|&i| &self.shapes[i])
    }

    pub fn max_corner_magnitude(&self) -> i32 {
        self.shapes
            .iter()
            .flat_map(|s| s.corner_heights)
            .map(i32::abs)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubstitutionReason {
    GenericDefault,
    UnknownName,
    OrientationMismatch { stored: i32, found: i32 },
}

#[derive(Clone, Debug)]
pub enum Resolution {
    Exact(Arc<TileShape>),
    Substituted {
        shape: Arc<TileShape>,
        reason: SubstitutionReason,
    },
    Missing,
}

impl Resolution {
    pub fn shape(&self) -> Option<&Arc<TileShape>> {
        match self {
            Resolution::Exact(shape) | Resolution::Substituted { shape, .. } => Some(shape),
            Resolution::Missing => None,
        }
    }
}

/// Maps a stored (name, orientation) pair onto a shape of `catalog`, falling back
/// to the plain shape of the stored orientation when the name no longer fits.
pub fn resolve(name: &str, orientation: i32, catalog: &TileCatalog) -> Resolution {
    let fallback = |reason| match Orientation::from_stored(orientation)
        .and_then(|o| catalog.default_for(o))
    {
        Some(shape) => Resolution::Substituted {
            shape: Arc::clone(shape),
            reason,
        },
        None => Resolution::Missing,
    };

    if name == GENERIC_DEFAULT_NAME {
        return fallback(SubstitutionReason::GenericDefault);
    }
    match catalog.by_name(name) {
        None => fallback(SubstitutionReason::UnknownName),
        Some(shape) if shape.orientation.bits() == orientation => {
            Resolution::Exact(Arc::clone(shape))
        }
        Some(shape) => fallback(SubstitutionReason::OrientationMismatch {
            stored: orientation,
            found: shape.orientation.bits(),
        }),
    }
}

#[derive(Clone, Debug)]
pub struct TileInstance {
    pub shape: Arc<TileShape>,
    pub offset: i32,
    pub highlighted: bool,
}

impl PartialEq for TileInstance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shape, &other.shape) && self.offset == other.offset
    }
}

impl TileInstance {
    pub fn new(shape: Arc<TileShape>, offset: i32) -> Self {
        Self {
            shape,
            offset,
            highlighted: false,
        }
    }

    pub fn height(&self) -> i32 {
        self.offset
    }

    pub fn height_of_corner(&self, x_pos: bool, y_pos: bool) -> i32 {
        self.offset + self.shape.corner_height(x_pos, y_pos)
    }

    pub fn height_of(&self, direction: Direction) -> i32 {
        let [a, b] = direction.edge_corners();
        let corners = self.shape.corner_heights;
        self.offset + corners[a].max(corners[b])
    }

    pub fn lowest_surface(&self) -> f32 {
        (self.offset + self.shape.lowest_corner()) as f32 * TILE_SIZE_Z
    }

    pub fn highest_surface(&self) -> f32 {
        (self.offset + self.shape.highest_corner()) as f32 * TILE_SIZE_Z
    }

    pub fn replace_with(&self, shape: Arc<TileShape>) -> TileInstance {
        TileInstance::new(shape, self.offset)
    }

    /// Ray parameter of the nearest hit between the ray and this tile's
    /// surface, with the tile centered on `tile_center`.
    pub fn intersect_fraction(&self, tile_center: Vec2, origin: Vec3, direction: Vec3) -> Option<f32> {
        let half = TILE_SIZE * 0.5;
        let corner = |x_pos: bool, y_pos: bool| {
            Vec3::new(
                tile_center.x + if x_pos { half } else { -half },
                tile_center.y + if y_pos { half } else { -half },
                self.height_of_corner(x_pos, y_pos) as f32 * TILE_SIZE_Z,
            )
        };
        let v00 = corner(false, false);
        let v10 = corner(true, false);
        let v01 = corner(false, true);
        let v11 = corner(true, true);

        let mut best: Option<f32> = None;
        for (a, b, c) in [(v00, v10, v11), (v00, v11, v01)] {
            if let Some(t) = ray_triangle(origin, direction, a, b, c) {
                best = Some(best.map_or(t, |bt| bt.min(t)));
            }
        }
        best
    }
}

fn ray_triangle(origin: Vec3, dir: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let ab = b - a;
    let ac = c - a;
    let p = dir.cross(ac);
    let det = ab.dot(p);

    if det.abs() < 1e-10 {
        return None;
    }

    let inv = 1.0 / det;
    let tvec = origin - a;
    let u = tvec.dot(p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = tvec.cross(ab);
    let v = dir.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = ac.dot(q) * inv;
    if t >= 0.0 { Some(t) } else { None }
}
