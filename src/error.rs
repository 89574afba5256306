use bevy::prelude::*;
use thiserror::Error;

/// Errors raised by misuse of a tile layer.
///
/// A tileset whose atlas has not been loaded yet is *not* an error, the
/// affected mesh simply stays hidden until the atlas shows up.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayerError {
    #[error("expected {expected} entries (one per cell), got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("cell ({x}, {y}) lies outside of the {width}x{height} grid")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("cell index {index} lies outside of a grid with {len} cells")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("a tile layer needs at least one cell, got {0}x{1}")]
    EmptyGrid(u32, u32),

    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(Vec2),

    #[error("tile size {tile_size} does not fit into an atlas of size {atlas_size}")]
    InvalidAtlas { atlas_size: Vec2, tile_size: Vec2 },
}
