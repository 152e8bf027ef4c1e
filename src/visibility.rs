use std::collections::VecDeque;

use glam::{Mat4, Vec3};

use crate::tile_map::ChunkGrid;
use crate::types::ChunkCoord;

const CULLED_WINDOW: usize = 30;

#[derive(Clone, Debug)]
pub struct AveragingQueue {
    samples: VecDeque<f32>,
    capacity: usize,
    sum: f32,
}

impl AveragingQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
        }
    }

    pub fn add(&mut self, value: f32) {
        if self.samples.len() == self.capacity {
            if let Some(old) = self.samples.pop_front() {
                self.sum -= old;
            }
        }
        self.samples.push_back(value);
        self.sum += value;
    }

    pub fn average(&self) -> f32 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f32
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct VisibilitySelector {
    culled: AveragingQueue,
}

impl Default for VisibilitySelector {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilitySelector {
    pub fn new() -> Self {
        Self {
            culled: AveragingQueue::new(CULLED_WINDOW),
        }
    }

    pub fn chunk_bounds(grid: &ChunkGrid, coord: ChunkCoord) -> Option<(Vec3, Vec3)> {
        let chunk = grid.chunk(coord)?;
        let real = grid.real_chunk_size();
        let extremes = chunk.min_max();
        // empty chunks still occupy their footprint at ground level
        let (min_z, max_z) = if extremes.is_empty() {
            (0.0, 0.0)
        } else {
            (extremes.min(), extremes.max())
        };
        Some((
            Vec3::new(coord.x as f32 * real, coord.y as f32 * real, min_z),
            Vec3::new(
                (coord.x + 1) as f32 * real,
                (coord.y + 1) as f32 * real,
                max_z,
            ),
        ))
    }

    pub fn select(&mut self, grid: &ChunkGrid, view_proj: Mat4) -> Vec<ChunkCoord> {
        let mut visible = Vec::new();
        let mut culled = 0usize;
        for (coord, _) in grid.chunks() {
            let Some((min, max)) = Self::chunk_bounds(grid, coord) else {
                continue;
            };
            if aabb_in_view(view_proj, min, max) {
                visible.push(coord);
            } else {
                culled += 1;
            }
        }
        self.culled.add(culled as f32);
        log::trace!("culled {} chunks, {} visible", culled, visible.len());
        visible
    }

    pub fn culled_average(&self) -> f32 {
        self.culled.average()
    }
}

/// False only when all eight corners of the box lie outside one clip plane.
pub fn aabb_in_view(vp: Mat4, min: Vec3, max: Vec3) -> bool {
    let corners = [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(min.x, max.y, max.z),
        Vec3::new(max.x, max.y, max.z),
    ];
    let clips = corners.map(|corner| vp * corner.extend(1.0));

    for plane in 0..6 {
        let mut outside = 0;
        for clip in clips {
            let v = match plane {
                0 => clip.x + clip.w,
                1 => -clip.x + clip.w,
                2 => clip.y + clip.w,
                3 => -clip.y + clip.w,
                4 => clip.z + clip.w,
                _ => -clip.z + clip.w,
            };
            if v < 0.0 {
                outside += 1;
            }
        }
        if outside == 8 {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TILE_SIZE_Z;
    use crate::generator::HeightField;
    use crate::tiles::TileCatalog;

    fn raised_grid() -> ChunkGrid {
        // 3 x 3 chunks of 2 tiles; the middle column sits 20 levels up
        let mut field = HeightField::new(7, 7);
        for x in 0..7 {
            for y in 0..7 {
                let h = if (2..=4).contains(&x) { 20.0 } else { 0.0 };
                field.set(x, y, h);
            }
        }
        ChunkGrid::generate(2, &field, 1, &TileCatalog::with_defaults()).unwrap()
    }

    #[test]
    fn averaging_queue_keeps_a_fixed_window() {
        let mut queue = AveragingQueue::new(3);
        assert_eq!(queue.average(), 0.0);
        for v in [3.0, 6.0, 9.0, 12.0] {
            queue.add(v);
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.average(), 9.0);
    }

    #[test]
    fn identity_view_keeps_only_unit_cube() {
        let vp = Mat4::IDENTITY;
        assert!(aabb_in_view(vp, Vec3::splat(-0.5), Vec3::splat(0.5)));
        // straddling a plane still counts
        assert!(aabb_in_view(vp, Vec3::new(0.9, 0.0, 0.0), Vec3::new(3.0, 0.5, 0.5)));
        assert!(!aabb_in_view(
            vp,
            Vec3::new(1000.0, 0.0, 0.0),
            Vec3::new(1001.0, 1.0, 1.0)
        ));
    }

    #[test]
    fn chunks_are_tested_with_their_elevation() {
        let grid = raised_grid();
        let (min, max) = VisibilitySelector::chunk_bounds(&grid, ChunkCoord { x: 1, y: 0 }).unwrap();
        assert_eq!(min.x, 4.0);
        assert_eq!(max.x, 8.0);
        assert!(max.z >= 20.0 * TILE_SIZE_Z);
        assert!(VisibilitySelector::chunk_bounds(&grid, ChunkCoord { x: 3, y: 0 }).is_none());

        // a thin horizontal slab high above the low ground only sees the raised column
        let view_proj = Mat4::orthographic_rh_gl(-1.0, 13.0, -1.0, 13.0, -11.0, -9.0);
        let mut selector = VisibilitySelector::new();
        let visible = selector.select(&grid, view_proj);
        assert_eq!(
            visible,
            vec![
                ChunkCoord { x: 1, y: 0 },
                ChunkCoord { x: 1, y: 1 },
                ChunkCoord { x: 1, y: 2 },
            ]
        );
        assert_eq!(selector.culled_average(), 6.0);
    }

    #[test]
    fn partially_overlapping_chunks_are_kept() {
        let grid = raised_grid();
        // x in [3, 5] straddles the boundary of chunks 0 and 1
        let view_proj = Mat4::orthographic_rh_gl(3.0, 5.0, -1.0, 13.0, -50.0, 50.0);
        let mut selector = VisibilitySelector::new();
        let visible = selector.select(&grid, view_proj);
        assert_eq!(visible.len(), 6);
        assert!(visible.iter().all(|c| c.x <= 1));
    }

    #[test]
    fn empty_grid_culls_nothing() {
        let grid = ChunkGrid::empty(4);
        let mut selector = VisibilitySelector::new();
        assert!(selector.select(&grid, Mat4::IDENTITY).is_empty());
        assert_eq!(selector.culled_average(), 0.0);
    }
}
