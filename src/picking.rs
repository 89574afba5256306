use bevy::{math::Ray, prelude::*};
use std::sync::Arc;

use crate::geometry::{GridGeometry, TRIANGLES_PER_CELL};

/// Maps positions on a tile layer to grid cells.
///
/// Works on the very geometry the tileset meshes are built from and uses the
/// same triangle -> cell mapping, so a pick names the cell whose state
/// currently drives that spot.
#[derive(Debug, Clone)]
pub struct PickingIndex {
    geometry: Arc<GridGeometry>,
}

impl PickingIndex {
    pub fn new(geometry: Arc<GridGeometry>) -> Self {
        Self { geometry }
    }

    /// Cell under `position`, given in layer-local units
    /// (origin at the top-left corner of cell (0, 0), y growing with the row).
    pub fn pick(&self, position: Vec2) -> Option<UVec2> {
        let extent = self.geometry.extent();
        if !position.is_finite()
            || position.x < 0.0
            || position.y < 0.0
            || position.x > extent.x
            || position.y > extent.y
        {
            return None;
        }

        let size = self.geometry.size();
        let candidate = (position / self.geometry.cell_size())
            .floor()
            .as_uvec2()
            .min(size - UVec2::ONE);
        let cell = (candidate.y * size.x + candidate.x) as usize;

        (cell * TRIANGLES_PER_CELL..(cell + 1) * TRIANGLES_PER_CELL)
            .find(|&triangle| contains(self.geometry.triangle(triangle), position))
            .map(|triangle| {
                let cell = (triangle / TRIANGLES_PER_CELL) as u32;
                UVec2::new(cell % size.x, cell / size.x)
            })
    } // fn pick

    /// Cell under `position`, given relative to the layer extent:
    /// `(0, 0)` is the top-left corner, `(1, 1)` the bottom-right one.
    pub fn pick_normalized(&self, position: Vec2) -> Option<UVec2> {
        if !(0.0..=1.0).contains(&position.x) || !(0.0..=1.0).contains(&position.y) {
            return None;
        }
        self.pick(position * self.geometry.extent())
    }

    /// Cell hit by `ray`, given in layer-local space. The layer lies in the
    /// `z = 0` plane.
    pub fn pick_ray(&self, ray: Ray) -> Option<UVec2> {
        let distance = ray.intersect_plane(Vec3::ZERO, Vec3::Z)?;
        self.pick(ray.get_point(distance).truncate())
    }
}

/// Point in triangle test, inclusive of the edges.
fn contains(triangle: [Vec2; 3], p: Vec2) -> bool {
    const EPS: f32 = 1e-4;
    let [a, b, c] = triangle;
    let cross = |o: Vec2, u: Vec2, v: Vec2| (u - o).perp_dot(v - o);

    let area = cross(a, b, c);
    if area.abs() < f32::EPSILON {
        return false;
    }
    let scale = EPS * area.abs();
    let d1 = cross(a, b, p) * area.signum();
    let d2 = cross(b, c, p) * area.signum();
    let d3 = cross(c, a, p) * area.signum();
    d1 >= -scale && d2 >= -scale && d3 >= -scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::vec2;

    fn index(cols: u32, rows: u32) -> PickingIndex {
        PickingIndex::new(Arc::new(GridGeometry::build(16.0, 8.0, cols, rows)))
    }

    #[test]
    fn picks_cell_under_position() {
        let index = index(3, 3);
        assert_eq!(index.pick(vec2(1.0, 1.0)), Some(UVec2::new(0, 0)));
        assert_eq!(index.pick(vec2(20.0, 12.0)), Some(UVec2::new(1, 1)));
        assert_eq!(index.pick(vec2(47.0, 23.0)), Some(UVec2::new(2, 2)));
        // both triangles of a cell map to the same cell
        assert_eq!(index.pick(vec2(30.0, 9.0)), Some(UVec2::new(1, 1)));
        assert_eq!(index.pick(vec2(17.0, 15.0)), Some(UVec2::new(1, 1)));
    }

    #[test]
    fn outside_positions_miss() {
        let index = index(3, 3);
        assert_eq!(index.pick(vec2(-0.1, 1.0)), None);
        assert_eq!(index.pick(vec2(1.0, 24.5)), None);
        assert_eq!(index.pick(vec2(48.1, 1.0)), None);
        assert_eq!(index.pick(vec2(f32::NAN, 1.0)), None);
    }

    #[test]
    fn far_edge_belongs_to_last_cell() {
        let index = index(2, 2);
        assert_eq!(index.pick(vec2(32.0, 16.0)), Some(UVec2::new(1, 1)));
    }

    #[test]
    fn normalized_positions() {
        let index = index(4, 2);
        assert_eq!(index.pick_normalized(vec2(0.0, 0.0)), Some(UVec2::new(0, 0)));
        assert_eq!(index.pick_normalized(vec2(0.6, 0.6)), Some(UVec2::new(2, 1)));
        assert_eq!(index.pick_normalized(vec2(1.2, 0.5)), None);
    }

    #[test]
    fn rays_hit_the_layer_plane() {
        let index = index(4, 4);
        let ray = Ray {
            origin: Vec3::new(40.0, 20.0, 10.0),
            direction: Vec3::NEG_Z,
        };
        assert_eq!(index.pick_ray(ray), Some(UVec2::new(2, 2)));

        let parallel = Ray {
            origin: Vec3::new(40.0, 20.0, 10.0),
            direction: Vec3::X,
        };
        assert_eq!(index.pick_ray(parallel), None);
    }
}
