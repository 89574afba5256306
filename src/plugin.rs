use crate::layer::{cleanup_orphaned_meshes, update_tile_layers};
use crate::material::TileLayerMaterial;
use crate::shader::TILE_LAYER_SHADER_HANDLE;
use crate::tileset::{resolve_tilesets, TilesetReadyEvent, Tilesets};
use bevy::{asset::load_internal_asset, prelude::*, sprite::Material2dPlugin};

/// Plugin for batched tile layers.
/// Add this to your app, register tilesets in [`Tilesets`] and spawn one or
/// multiple layers using [`crate::layer_builder::TileLayerBuilder`] and
/// [`crate::bundle::TileLayerBundle`].
#[derive(Default)]
pub struct TileBatcherPlugin;

impl Plugin for TileBatcherPlugin {
    fn build(&self, app: &mut App) {
        load_internal_asset!(
            app,
            TILE_LAYER_SHADER_HANDLE,
            "tile_layer.wgsl",
            Shader::from_wgsl
        );

        app.add_plugins(Material2dPlugin::<TileLayerMaterial>::default());
        app.init_resource::<Tilesets>()
            .add_event::<TilesetReadyEvent>()
            // After Update so edits made this frame show up this frame
            .add_systems(
                PostUpdate,
                (resolve_tilesets, update_tile_layers, cleanup_orphaned_meshes).chain(),
            );
    }
}
