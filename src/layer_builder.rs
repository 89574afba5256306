use bevy::prelude::*;
use std::ops::{Index, IndexMut};

use crate::batcher::TileLayerBatcher;
use crate::error::LayerError;
use crate::tile::{TileRef, DEFAULT_GHOST_OPACITY};

/// Size the larger side of a normalized tile is scaled to.
pub const TILE_BASE_SIZE: f32 = 16.0;

/// Width of the cell outline, in layer units.
pub const DEFAULT_OUTLINE_WIDTH: f32 = 0.5;

/// Dark grey drawn under the whole layer, see [`TileLayerBuilder::with_backdrop`].
pub const DEFAULT_BACKDROP_COLOR: Color = Color::rgb(0.13, 0.13, 0.13);

/// Scale `tile_size` so that its larger side becomes [`TILE_BASE_SIZE`],
/// keeping the aspect ratio. Maps with different tile sizes then cover
/// comparable areas.
pub fn normalized_tile_size(tile_size: Vec2) -> Vec2 {
    let max = tile_size.max_element();
    if max <= 0.0 {
        return Vec2::splat(TILE_BASE_SIZE);
    }
    tile_size / max * TILE_BASE_SIZE
}

/// Per-layer configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileLayerSettings {
    /// Opacity of ghost tiles that differ from the committed tile.
    pub ghost_opacity: f32,

    /// Draw an outline around every cell. This is per layer: with stacked
    /// layers, enable it on the topmost one only to get a single grid.
    pub outline: bool,

    /// Outline width, in layer units.
    pub outline_width: f32,

    /// Solid quad drawn under the full layer extent.
    pub backdrop: Option<Color>,
}

impl Default for TileLayerSettings {
    fn default() -> Self {
        Self {
            ghost_opacity: DEFAULT_GHOST_OPACITY,
            outline: false,
            outline_width: DEFAULT_OUTLINE_WIDTH,
            backdrop: None,
        }
    }
}

pub struct TileLayerBuilder {
    size: UVec2,
    cell_size: Vec2,
    settings: TileLayerSettings,
}

impl TileLayerBuilder {
    /// Layer of `size` cells, each `cell_size` layer units large.
    pub fn new(size: UVec2, cell_size: Vec2) -> Self {
        Self {
            size,
            cell_size,
            settings: default(),
        }
    } // fn new

    pub fn with_ghost_opacity(mut self, ghost_opacity: f32) -> Self {
        self.settings.ghost_opacity = ghost_opacity;
        self
    }

    pub fn with_outline(mut self, width: f32) -> Self {
        self.settings.outline = true;
        self.settings.outline_width = width;
        self
    }

    /// Draw a solid `color` quad under the layer, eg. to tell empty cells
    /// apart from the clear color.
    pub fn with_backdrop(mut self, color: Color) -> Self {
        self.settings.backdrop = Some(color);
        self
    }

    pub fn with_settings(mut self, settings: TileLayerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use the normalized variant of the atlas tile size as cell size,
    /// see [`normalized_tile_size`].
    pub fn with_normalized_cells(mut self, tile_size: Vec2) -> Self {
        self.cell_size = normalized_tile_size(tile_size);
        self
    }

    /// Build a layer with all cells empty.
    pub fn build(self) -> Result<TileLayerBatcher, LayerError> {
        self.build_and_initialize(|_| {})
    }

    /// Build a layer and initialize its cells with `initializer`.
    pub fn build_and_initialize<F>(self, initializer: F) -> Result<TileLayerBatcher, LayerError>
    where
        F: FnOnce(&mut TileIndexer),
    {
        let mut batcher = TileLayerBatcher::new(self.size, self.cell_size)?.with_settings(self.settings);

        let mut cells = vec![TileRef::EMPTY; batcher.len()];
        initializer(&mut TileIndexer {
            cells: &mut cells,
            size: self.size,
        });
        batcher.set_cells(cells)?;

        Ok(batcher)
    } // fn build_and_initialize

    /// Build a layer and set every cell to `f(position)`.
    pub fn build_and_set<F>(self, mut f: F) -> Result<TileLayerBatcher, LayerError>
    where
        F: FnMut(UVec2) -> TileRef,
    {
        self.build_and_initialize(|m| {
            for y in 0..m.size().y {
                for x in 0..m.size().x {
                    m.set(x, y, f(UVec2::new(x, y)));
                }
            }
        })
    }
}

/// Write access to the cells of a layer under construction.
pub struct TileIndexer<'a> {
    cells: &'a mut [TileRef],
    size: UVec2,
}

impl<'a> TileIndexer<'a> {
    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn get(&self, x: u32, y: u32) -> TileRef {
        self[UVec2::new(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, tile: TileRef) {
        self[UVec2::new(x, y)] = tile;
    }

    fn index_of(&self, i: UVec2) -> usize {
        assert!(
            i.x < self.size.x && i.y < self.size.y,
            "cell {} outside of {}",
            i,
            self.size
        );
        (i.y * self.size.x + i.x) as usize
    }
}

impl<'a> Index<UVec2> for TileIndexer<'a> {
    type Output = TileRef;
    fn index(&self, i: UVec2) -> &Self::Output {
        &self.cells[self.index_of(i)]
    }
}

impl<'a> IndexMut<UVec2> for TileIndexer<'a> {
    fn index_mut(&mut self, i: UVec2) -> &mut TileRef {
        let idx = self.index_of(i);
        &mut self.cells[idx]
    }
}
