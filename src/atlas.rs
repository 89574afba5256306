use bevy::{
    math::vec2,
    prelude::*,
    render::render_resource::{Extent3d, TextureDimension, TextureFormat},
};
use rand::Rng;
use std::collections::HashMap;

use crate::error::LayerError;
use crate::geometry::{split_quad, Quad};

/// UVs of one tile, split into the same two triangles as a grid cell.
pub type TileUvs = [[Vec2; 3]; 2];

/// UV value for "nothing here". Any UV with a negative component is
/// discarded by the tile layer shader and never sampled.
pub const SENTINEL_UV: Vec2 = Vec2::new(-1.0, -1.0);

/// UVs of an empty tile.
pub const SENTINEL_UVS: TileUvs = [[SENTINEL_UV; 3]; 2];

/// A loaded tileset texture, sliced into a grid of equally sized tiles.
/// Tile ids count row-major from the top-left tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureAtlas {
    pub texture: Handle<Image>,

    /// Size of the atlas image, in pixels.
    atlas_size: Vec2,

    /// Size of each tile, in pixels.
    tile_size: Vec2,
}

impl TextureAtlas {
    pub fn new(texture: Handle<Image>, atlas_size: Vec2, tile_size: Vec2) -> Result<Self, LayerError> {
        let valid = tile_size.cmpgt(Vec2::ZERO).all()
            && tile_size.is_finite()
            && atlas_size.cmpge(tile_size).all()
            && atlas_size.is_finite();
        if !valid {
            return Err(LayerError::InvalidAtlas { atlas_size, tile_size });
        }
        Ok(Self {
            texture,
            atlas_size,
            tile_size,
        })
    }

    /// Atlas for an already loaded image, the atlas size is taken from the image.
    pub fn from_image(texture: Handle<Image>, image: &Image, tile_size: Vec2) -> Result<Self, LayerError> {
        Self::new(texture, image.size(), tile_size)
    }

    pub fn atlas_size(&self) -> Vec2 {
        self.atlas_size
    }

    pub fn tile_size(&self) -> Vec2 {
        self.tile_size
    }

    /// Number of tile columns and rows in the atlas.
    pub fn grid_size(&self) -> UVec2 {
        (self.atlas_size / self.tile_size).floor().as_uvec2()
    }

    pub fn columns(&self) -> u32 {
        self.grid_size().x
    }

    pub fn tile_count(&self) -> u32 {
        let grid = self.grid_size();
        grid.x * grid.y
    }

    /// Whether `tile_id` addresses a tile inside this atlas.
    pub fn contains(&self, tile_id: i32) -> bool {
        tile_id >= 0 && (tile_id as u32) < self.tile_count()
    }

    /// UVs covering tile `tile_id`.
    ///
    /// Negative ids yield [`SENTINEL_UVS`].
    /// `tile_id` must otherwise be in range (see [`Self::contains`]): this
    /// is asserted in debug builds only, release builds will happily
    /// produce UVs outside of the atlas.
    pub fn tile_uvs(&self, tile_id: i32) -> TileUvs {
        if tile_id < 0 {
            return SENTINEL_UVS;
        }
        debug_assert!(
            self.contains(tile_id),
            "tile id {} outside of atlas with {} tiles",
            tile_id,
            self.tile_count()
        );

        let columns = self.columns().max(1) as i32;
        let (row, col) = num::integer::div_rem(tile_id, columns);

        // Grid rows grow downwards while texture v grows upwards, hence the flip.
        let corner = |dx: i32, dy: i32| {
            vec2(
                (col + dx) as f32 * self.tile_size.x / self.atlas_size.x,
                1.0 - (row + dy) as f32 * self.tile_size.y / self.atlas_size.y,
            )
        };

        split_quad(Quad {
            top_left: corner(0, 0),
            top_right: corner(1, 0),
            bottom_left: corner(0, 1),
            bottom_right: corner(1, 1),
        })
    }
} // impl TextureAtlas

/// Source of atlases by tileset id.
///
/// This is polled once per update pass, `None` means "not loaded (yet)" and
/// hides everything drawn with that tileset until a later pass finds it.
pub trait AtlasProvider {
    fn atlas(&self, tileset_id: i32) -> Option<&TextureAtlas>;
}

impl AtlasProvider for HashMap<i32, TextureAtlas> {
    fn atlas(&self, tileset_id: i32) -> Option<&TextureAtlas> {
        self.get(&tileset_id)
    }
}

/// Generate an atlas image of `columns` x `rows` tiles, each filled with a
/// random solid color. Handy as a placeholder tileset.
pub fn generate_test_atlas<R: Rng + ?Sized>(columns: u32, rows: u32, tile_size: UVec2, rng: &mut R) -> Image {
    let width = columns * tile_size.x;
    let height = rows * tile_size.y;
    let mut data = vec![0u8; (width * height * 4) as usize];

    let colors: Vec<[u8; 4]> = (0..columns * rows)
        .map(|_| [rng.gen(), rng.gen(), rng.gen(), 255])
        .collect();

    for (i, pixel) in data.chunks_exact_mut(4).enumerate() {
        let x = i as u32 % width;
        let y = i as u32 / width;
        let tile = (y / tile_size.y) * columns + x / tile_size.x;
        pixel.copy_from_slice(&colors[tile as usize]);
    }

    Image::new(
        Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        data,
        TextureFormat::Rgba8UnormSrgb,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn atlas_2x2() -> TextureAtlas {
        TextureAtlas::new(Handle::default(), vec2(32.0, 32.0), vec2(16.0, 16.0)).unwrap()
    }

    #[test]
    fn first_tile_is_top_left_and_flipped() {
        let uvs = atlas_2x2().tile_uvs(0);
        // triangle A: top-right, top-left, bottom-right
        assert_eq!(uvs[0], [vec2(0.5, 1.0), vec2(0.0, 1.0), vec2(0.5, 0.5)]);
        // triangle B: top-left, bottom-left, bottom-right
        assert_eq!(uvs[1], [vec2(0.0, 1.0), vec2(0.0, 0.5), vec2(0.5, 0.5)]);
    }

    #[test]
    fn ids_count_row_major() {
        let atlas = atlas_2x2();
        assert_eq!(atlas.tile_uvs(1)[1][0], vec2(0.5, 1.0));
        assert_eq!(atlas.tile_uvs(2)[1][0], vec2(0.0, 0.5));
        assert_eq!(atlas.tile_uvs(3)[0][2], vec2(1.0, 0.0));
    }

    #[test]
    fn every_valid_tile_stays_inside_the_atlas() {
        let atlas = TextureAtlas::new(Handle::default(), vec2(80.0, 48.0), vec2(16.0, 16.0)).unwrap();
        assert_eq!(atlas.tile_count(), 15);
        for id in 0..atlas.tile_count() as i32 {
            for uv in atlas.tile_uvs(id).into_iter().flatten() {
                assert!(uv.is_finite());
                assert!((0.0..=1.0).contains(&uv.x), "{id}: {uv}");
                assert!((0.0..=1.0).contains(&uv.y), "{id}: {uv}");
            }
        }
    }

    #[test]
    fn empty_tile_yields_sentinel() {
        assert_eq!(atlas_2x2().tile_uvs(-1), SENTINEL_UVS);
        assert!(SENTINEL_UVS.iter().flatten().all(|uv| *uv == vec2(-1.0, -1.0)));
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn out_of_range_id_panics_in_debug() {
        atlas_2x2().tile_uvs(4);
    }

    #[test]
    fn rejects_tiles_larger_than_the_atlas() {
        assert!(TextureAtlas::new(Handle::default(), vec2(8.0, 8.0), vec2(16.0, 16.0)).is_err());
        assert!(TextureAtlas::new(Handle::default(), vec2(8.0, 8.0), Vec2::ZERO).is_err());
    }

    #[test]
    fn test_atlas_fills_tiles_uniformly() {
        let mut rng = StdRng::seed_from_u64(7);
        let image = generate_test_atlas(3, 2, UVec2::new(4, 4), &mut rng);
        assert_eq!(image.size(), vec2(12.0, 8.0));

        let pixel = |x: usize, y: usize| &image.data[(y * 12 + x) * 4..(y * 12 + x) * 4 + 4];
        assert_eq!(pixel(0, 0), pixel(3, 3));
        assert_eq!(pixel(8, 4), pixel(11, 7));
        assert_eq!(pixel(0, 0)[3], 255);
    }
}
