//! Batched tile layer rendering for bevy.
//! Renders a grid of tiles with one mesh (and thus one draw call) per tileset in use,
//! rewriting only the vertex attributes of cells that actually changed.
//!
//! ## Features
//!
//! - One draw call per tileset and layer, regardless of the layer size.
//! - Incremental updates: steady-state frames touch only changed cells.
//! - Ghost tiles (eg. brush previews), per-cell tints and an optional cell outline.
//! - Picking of cells from world positions or rays.
//!
//! ## How it works
//!
//! Every layer owns a static grid geometry, two triangles per cell. For each tileset that is
//! referenced by at least one cell, a mesh over the full grid is kept whose UVs, colors and
//! opacities are written per triangle. Triangles of cells that show a different tileset (or
//! nothing) carry a sentinel UV which the shader discards. Tilesets whose textures are not
//! loaded yet simply keep their mesh hidden until the texture shows up.

pub mod atlas;
pub mod batcher;
pub mod bundle;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod layer_builder;
pub mod material;
pub mod picking;
pub mod plugin;
pub mod shader;
pub mod tile;
pub mod tileset;

pub mod prelude {
    pub use crate::atlas::{generate_test_atlas, AtlasProvider, TextureAtlas};
    pub use crate::batcher::{TileLayerBatcher, UpdateStats};
    pub use crate::bundle::TileLayerBundle;
    pub use crate::error::LayerError;
    pub use crate::layer::{LayerBackdrop, TileLayer, TilesetMeshEntity};
    pub use crate::layer_builder::{
        normalized_tile_size, TileIndexer, TileLayerBuilder, TileLayerSettings, DEFAULT_BACKDROP_COLOR,
    };
    pub use crate::plugin::TileBatcherPlugin;
    pub use crate::tile::{TileRef, TileState};
    pub use crate::tileset::{TilesetReadyEvent, Tilesets};
}

pub use crate::batcher::TileLayerBatcher;
pub use crate::bundle::TileLayerBundle;
pub use crate::error::LayerError;
pub use crate::layer::TileLayer;
pub use crate::layer_builder::TileLayerBuilder;
pub use crate::plugin::TileBatcherPlugin;
pub use crate::tile::TileRef;
pub use crate::tileset::Tilesets;
