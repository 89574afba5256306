use crate::batcher::TileLayerBatcher;
use crate::layer::TileLayer;
use bevy::prelude::*;

// Bundle of components you should typically have for a tile layer.
// Tileset meshes get spawned as children, so the layer itself needs the
// spatial components for them to inherit.
#[derive(Bundle)]
pub struct TileLayerBundle {
    pub layer: TileLayer,

    pub transform: Transform,
    pub global_transform: GlobalTransform,
    pub visibility: Visibility,
    pub computed_visibility: ComputedVisibility,
}

impl TileLayerBundle {
    pub fn new(batcher: TileLayerBatcher) -> Self {
        Self {
            layer: TileLayer::new(batcher),
            transform: default(),
            global_transform: default(),
            visibility: default(),
            computed_visibility: default(),
        }
    }

    /// Place the top-left corner of the layer at `transform`.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}
