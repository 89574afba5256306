use bevy::{
    math::vec2,
    prelude::*,
    render::{
        mesh::{Indices, MeshVertexAttribute},
        render_resource::{PrimitiveTopology, VertexFormat},
    },
};

/// Per-vertex opacity, written by the batcher alongside UVs and colors.
pub const ATTRIBUTE_OPACITY: MeshVertexAttribute =
    MeshVertexAttribute::new("Vertex_Opacity", 0x7d1e_5b0a, VertexFormat::Float32);

/// Number of triangles each grid cell is split into.
pub const TRIANGLES_PER_CELL: usize = 2;

/// Number of vertices each grid cell occupies in the vertex buffers.
/// Vertices are not shared between triangles since atlas UVs are
/// per triangle corner.
pub const VERTICES_PER_CELL: usize = TRIANGLES_PER_CELL * 3;

/// The four corners of a grid cell (or atlas tile).
/// "top" is the side with the smaller row index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad<T> {
    pub top_left: T,
    pub top_right: T,
    pub bottom_left: T,
    pub bottom_right: T,
}

/// Split a quad into its two triangles.
///
/// Triangle A is `[top-right, top-left, bottom-right]`,
/// triangle B is `[top-left, bottom-left, bottom-right]`.
/// Both the grid geometry and the atlas UVs go through here so vertex and
/// UV corners always line up.
pub fn split_quad<T: Copy>(quad: Quad<T>) -> [[T; 3]; 2] {
    [
        [quad.top_right, quad.top_left, quad.bottom_right],
        [quad.top_left, quad.bottom_left, quad.bottom_right],
    ]
}

/// Static geometry of a `cols` x `rows` tile grid.
///
/// Origin is at the top-left corner of cell (0, 0), x grows with the column
/// and y with the row. Cell `c` owns triangles `2c` and `2c + 1`, triangle `t`
/// owns vertices `3t..3t + 3`. The buffers carry no tile content, that is
/// written entirely through the per-triangle attributes of a tileset mesh.
#[derive(Debug, Clone)]
pub struct GridGeometry {
    cell_size: Vec2,
    cols: u32,
    rows: u32,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    opacity: Vec<f32>,
    indices: Vec<u32>,
}

impl GridGeometry {
    pub fn build(cell_width: f32, cell_height: f32, cols: u32, rows: u32) -> Self {
        let n_cells = cols as usize * rows as usize;
        let n_vertices = n_cells * VERTICES_PER_CELL;

        let mut positions = Vec::with_capacity(n_vertices);
        let mut uvs = Vec::with_capacity(n_vertices);

        for row in 0..rows {
            for col in 0..cols {
                let x0 = col as f32 * cell_width;
                let y0 = row as f32 * cell_height;
                let x1 = x0 + cell_width;
                let y1 = y0 + cell_height;

                let corners = Quad {
                    top_left: [x0, y0, 0.0],
                    top_right: [x1, y0, 0.0],
                    bottom_left: [x0, y1, 0.0],
                    bottom_right: [x1, y1, 0.0],
                };
                let grid_uv = |c: u32, r: u32| [c as f32 / cols as f32, r as f32 / rows as f32];
                let corner_uvs = Quad {
                    top_left: grid_uv(col, row),
                    top_right: grid_uv(col + 1, row),
                    bottom_left: grid_uv(col, row + 1),
                    bottom_right: grid_uv(col + 1, row + 1),
                };

                positions.extend(split_quad(corners).into_iter().flatten());
                uvs.extend(split_quad(corner_uvs).into_iter().flatten());
            }
        }

        Self {
            cell_size: vec2(cell_width, cell_height),
            cols,
            rows,
            positions,
            normals: vec![[0.0, 0.0, 1.0]; n_vertices],
            uvs,
            opacity: vec![1.0; n_vertices],
            indices: (0..n_vertices as u32).collect(),
        }
    } // fn build

    pub fn cell_size(&self) -> Vec2 {
        self.cell_size
    }

    /// Grid size in cells.
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.cols, self.rows)
    }

    /// Size of the whole grid in layer-local units.
    pub fn extent(&self) -> Vec2 {
        self.cell_size * self.size().as_vec2()
    }

    pub fn cell_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    pub fn triangle_count(&self) -> usize {
        self.cell_count() * TRIANGLES_PER_CELL
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// The 2d corners of triangle `triangle`, in vertex order.
    pub fn triangle(&self, triangle: usize) -> [Vec2; 3] {
        let base = triangle * 3;
        let corner = |i: usize| {
            let [x, y, _] = self.positions[base + i];
            vec2(x, y)
        };
        [corner(0), corner(1), corner(2)]
    }

    /// Build a bevy mesh from this geometry.
    /// UV, color and opacity start out as plain grid data and are expected
    /// to be overwritten by the owning tileset mesh.
    pub fn to_mesh(&self) -> Mesh {
        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList);
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, self.positions.clone());
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, self.normals.clone());
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, self.uvs.clone());
        mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, vec![[1.0f32; 4]; self.vertex_count()]);
        mesh.insert_attribute(ATTRIBUTE_OPACITY, self.opacity.clone());
        mesh.set_indices(Some(Indices::U32(self.indices.clone())));
        mesh
    }
} // impl GridGeometry

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sizes_follow_grid_size() {
        let geometry = GridGeometry::build(16.0, 8.0, 3, 2);
        assert_eq!(geometry.cell_count(), 6);
        assert_eq!(geometry.triangle_count(), 12);
        assert_eq!(geometry.vertex_count(), 36);
        assert_eq!(geometry.indices().len(), 36);
        assert_eq!(geometry.extent(), vec2(48.0, 16.0));
    }

    #[test]
    fn cells_are_split_along_the_fixed_diagonal() {
        let geometry = GridGeometry::build(10.0, 20.0, 2, 2);

        // cell (1, 1) -> index 3 -> triangles 6 and 7
        assert_eq!(
            geometry.triangle(6),
            [vec2(20.0, 20.0), vec2(10.0, 20.0), vec2(20.0, 40.0)]
        );
        assert_eq!(
            geometry.triangle(7),
            [vec2(10.0, 20.0), vec2(10.0, 40.0), vec2(20.0, 40.0)]
        );
    }

    #[test]
    fn mesh_carries_all_attributes() {
        let mesh = GridGeometry::build(1.0, 1.0, 4, 4).to_mesh();
        assert_eq!(mesh.count_vertices(), 96);
        assert!(mesh.attribute(Mesh::ATTRIBUTE_UV_0).is_some());
        assert!(mesh.attribute(Mesh::ATTRIBUTE_COLOR).is_some());
        assert!(mesh.attribute(ATTRIBUTE_OPACITY).is_some());
        assert_eq!(mesh.indices().map(|i| i.len()), Some(96));
    }
}
