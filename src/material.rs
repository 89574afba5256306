use bevy::{
    prelude::*,
    reflect::{TypePath, TypeUuid},
    render::{
        mesh::MeshVertexBufferLayout,
        render_resource::{
            AsBindGroup, RenderPipelineDescriptor, ShaderRef, ShaderType,
            SpecializedMeshPipelineError,
        },
    },
    sprite::{Material2d, Material2dKey},
};

use crate::geometry::ATTRIBUTE_OPACITY;
use crate::layer_builder::TileLayerSettings;
use crate::shader::TILE_LAYER_SHADER_HANDLE;

#[derive(ShaderType, Clone, Copy, Debug, Default, PartialEq)]
pub struct TileLayerParams {
    /// Size of a grid cell, in layer units.
    pub cell_size: Vec2,

    /// Outline width in layer units, 0 for no outline.
    pub outline_width: f32,
}

impl TileLayerParams {
    pub fn new(cell_size: Vec2, settings: &TileLayerSettings) -> Self {
        Self {
            cell_size,
            outline_width: if settings.outline { settings.outline_width } else { 0.0 },
        }
    }
}

/// Material of a single tileset mesh: samples the tileset atlas and applies
/// per-vertex tint and opacity.
#[derive(AsBindGroup, TypeUuid, TypePath, Debug, Clone)]
#[uuid = "5e4b7c1a-93f2-4d0e-8a61-2c7f0b9d3e14"]
pub struct TileLayerMaterial {
    #[uniform(0)]
    pub params: TileLayerParams,

    #[texture(1)]
    #[sampler(2)]
    pub atlas: Option<Handle<Image>>,
}

impl TileLayerMaterial {
    pub fn new(atlas: Option<Handle<Image>>, params: TileLayerParams) -> Self {
        Self { params, atlas }
    }
}

impl Material2d for TileLayerMaterial {
    fn vertex_shader() -> ShaderRef {
        TILE_LAYER_SHADER_HANDLE.typed::<Shader>().into()
    }

    fn fragment_shader() -> ShaderRef {
        TILE_LAYER_SHADER_HANDLE.typed::<Shader>().into()
    }

    fn specialize(
        descriptor: &mut RenderPipelineDescriptor,
        layout: &MeshVertexBufferLayout,
        _key: Material2dKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        let vertex_layout = layout.get_layout(&[
            Mesh::ATTRIBUTE_POSITION.at_shader_location(0),
            Mesh::ATTRIBUTE_UV_0.at_shader_location(1),
            Mesh::ATTRIBUTE_COLOR.at_shader_location(2),
            ATTRIBUTE_OPACITY.at_shader_location(3),
        ])?;
        descriptor.vertex.buffers = vec![vertex_layout];
        // Layers are drawn with a flipped y axis, which flips the winding too
        descriptor.primitive.cull_mode = None;
        Ok(())
    }
} // impl Material2d for TileLayerMaterial

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::vec2;

    #[test]
    fn outline_only_when_enabled() {
        let mut settings = TileLayerSettings::default();
        assert_eq!(TileLayerParams::new(vec2(16.0, 16.0), &settings).outline_width, 0.0);

        settings.outline = true;
        settings.outline_width = 2.0;
        let params = TileLayerParams::new(vec2(16.0, 8.0), &settings);
        assert_eq!(params.outline_width, 2.0);
        assert_eq!(params.cell_size, vec2(16.0, 8.0));
    }
}
