use bevy::{
    log::debug,
    math::{vec2, vec3, Vec3Swizzles},
    prelude::*,
    sprite::{Anchor, MaterialMesh2dBundle, Mesh2dHandle},
};
use std::collections::BTreeMap;

use crate::batcher::{TileLayerBatcher, UpdateStats};
use crate::layer_builder::TileLayerSettings;
use crate::material::{TileLayerMaterial, TileLayerParams};
use crate::tileset::{TilesetReadyEvent, Tilesets};

/// Scale applied to tileset mesh entities: grid rows grow downwards while
/// bevy's world y axis points up.
pub const LAYER_FLIP: Vec3 = vec3(1.0, -1.0, 1.0);

/// Depth of the backdrop relative to its layer, just below the tile meshes.
pub const BACKDROP_Z: f32 = -0.01;

/// Child entity drawing the tiles of one tileset of a layer.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilesetMeshEntity {
    pub layer: Entity,
    pub tileset_id: i32,
}

/// Child sprite drawing the backdrop of a layer.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerBackdrop {
    pub layer: Entity,
}

#[derive(Debug)]
struct RenderedMesh {
    entity: Entity,
    mesh: Handle<Mesh>,
    material: Handle<TileLayerMaterial>,
}

/// A tile layer living in the bevy world.
///
/// Once per frame the layer is updated against the [`Tilesets`] resource and
/// every tileset mesh is mirrored into a child entity. The top-left corner of
/// the grid sits at the layer's transform, rows extend towards -y.
#[derive(Component, Debug)]
pub struct TileLayer {
    batcher: TileLayerBatcher,
    rendered: BTreeMap<i32, RenderedMesh>,
    backdrop: Option<Entity>,
    last_stats: UpdateStats,
    material_stale: bool,
}

impl TileLayer {
    pub fn new(batcher: TileLayerBatcher) -> Self {
        Self {
            batcher,
            rendered: BTreeMap::new(),
            backdrop: None,
            last_stats: default(),
            material_stale: false,
        }
    }

    pub fn batcher(&self) -> &TileLayerBatcher {
        &self.batcher
    }

    /// Mutable access for changing cells, ghosts and tints.
    /// Changes show up with the next frame's update.
    pub fn batcher_mut(&mut self) -> &mut TileLayerBatcher {
        &mut self.batcher
    }

    /// Statistics of the most recent update.
    pub fn last_stats(&self) -> UpdateStats {
        self.last_stats
    }

    pub fn set_settings(&mut self, settings: TileLayerSettings) {
        let previous = *self.batcher.settings();
        self.batcher.set_settings(settings);
        if previous != *self.batcher.settings() {
            self.material_stale = true;
        }
    }

    pub fn set_outline(&mut self, outline: bool) {
        let settings = TileLayerSettings {
            outline,
            ..*self.batcher.settings()
        };
        self.set_settings(settings);
    }

    pub fn set_backdrop(&mut self, backdrop: Option<Color>) {
        let settings = TileLayerSettings {
            backdrop,
            ..*self.batcher.settings()
        };
        self.set_settings(settings);
    }

    /// Entity drawing the backdrop, if there is one.
    pub fn backdrop_entity(&self) -> Option<Entity> {
        self.backdrop
    }

    /// Entity drawing tileset `tileset_id`, if it is in use.
    pub fn mesh_entity(&self, tileset_id: i32) -> Option<Entity> {
        self.rendered.get(&tileset_id).map(|rendered| rendered.entity)
    }

    /// Convert a world position into layer-local units as used by
    /// [`TileLayerBatcher::pick`].
    pub fn world_to_local(&self, transform: &GlobalTransform, world: Vec2) -> Vec2 {
        let local = transform.compute_matrix().inverse().transform_point3(world.extend(0.0));
        local.xy() * LAYER_FLIP.xy()
    }

    /// Cell under the world position `world`.
    pub fn pick_world(&self, transform: &GlobalTransform, world: Vec2) -> Option<UVec2> {
        self.batcher.pick(self.world_to_local(transform, world))
    }

    /// World position of the center of cell `cell`.
    pub fn cell_center_world(&self, transform: &GlobalTransform, cell: UVec2) -> Vec3 {
        let local = (cell.as_vec2() + vec2(0.5, 0.5)) * self.batcher.cell_size() * LAYER_FLIP.xy();
        transform.transform_point(local.extend(0.0))
    }

    fn params(&self) -> TileLayerParams {
        TileLayerParams::new(self.batcher.cell_size(), self.batcher.settings())
    }
} // impl TileLayer

/// Advance every tile layer by one frame and mirror its tileset meshes into
/// child entities.
pub fn update_tile_layers(
    mut commands: Commands,
    tilesets: Res<Tilesets>,
    mut ev_ready: EventReader<TilesetReadyEvent>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<TileLayerMaterial>>,
    mut layers: Query<(Entity, &mut TileLayer)>,
    mut visibilities: Query<&mut Visibility, With<TilesetMeshEntity>>,
    mut backdrops: Query<&mut Sprite, With<LayerBackdrop>>,
) {
    // A fresh atlas may slice tiles differently than whatever the cells
    // resolved against before
    let ready: Vec<i32> = ev_ready.iter().map(|ev| ev.tileset_id).collect();

    for (layer_entity, mut layer) in layers.iter_mut() {
        let layer = layer.as_mut();

        for tileset_id in ready.iter() {
            layer.batcher.invalidate_tileset(*tileset_id);
        }

        sync_backdrop(&mut commands, layer_entity, layer, &mut backdrops);

        layer.last_stats = layer.batcher.update(tilesets.as_ref());
        let params = layer.params();

        // Meshes the batcher dropped
        let live: Vec<i32> = layer.batcher.meshes().map(|m| m.tileset_id()).collect();
        layer.rendered.retain(|tileset_id, rendered| {
            let keep = live.contains(tileset_id);
            if !keep {
                commands.entity(rendered.entity).despawn_recursive();
            }
            keep
        });

        for tileset_mesh in layer.batcher.meshes_mut() {
            let tileset_id = tileset_mesh.tileset_id();
            let visibility = if tileset_mesh.is_visible() {
                Visibility::Inherited
            } else {
                Visibility::Hidden
            };

            let Some(rendered) = layer.rendered.get(&tileset_id) else {
                // New mesh, everything goes up with it
                tileset_mesh.take_needs_upload();
                let mesh = meshes.add(tileset_mesh.to_mesh());
                let material = materials.add(TileLayerMaterial::new(tileset_mesh.texture().cloned(), params));
                let entity = commands
                    .spawn((
                        MaterialMesh2dBundle {
                            mesh: Mesh2dHandle(mesh.clone()),
                            material: material.clone(),
                            transform: Transform::from_scale(LAYER_FLIP),
                            visibility,
                            ..default()
                        },
                        TilesetMeshEntity {
                            layer: layer_entity,
                            tileset_id,
                        },
                    ))
                    .id();
                commands.entity(layer_entity).add_child(entity);
                debug!("spawned mesh entity {:?} for tileset {}", entity, tileset_id);

                layer.rendered.insert(
                    tileset_id,
                    RenderedMesh {
                        entity,
                        mesh,
                        material,
                    },
                );
                continue;
            };

            if tileset_mesh.take_needs_upload() {
                if let Some(mesh) = meshes.get_mut(&rendered.mesh) {
                    tileset_mesh.attributes().apply_to(mesh);
                }
            }

            let texture = tileset_mesh.texture().cloned();
            let material_outdated = materials
                .get(&rendered.material)
                .map_or(false, |m| m.atlas != texture || m.params != params);
            if material_outdated || layer.material_stale {
                if let Some(material) = materials.get_mut(&rendered.material) {
                    material.atlas = texture;
                    material.params = params;
                }
            }

            if let Ok(mut current) = visibilities.get_mut(rendered.entity) {
                if *current != visibility {
                    *current = visibility;
                }
            }
        } // for tileset_mesh

        layer.material_stale = false;
    } // for layer
} // fn update_tile_layers

fn sync_backdrop(
    commands: &mut Commands,
    layer_entity: Entity,
    layer: &mut TileLayer,
    backdrops: &mut Query<&mut Sprite, With<LayerBackdrop>>,
) {
    match (layer.batcher.settings().backdrop, layer.backdrop) {
        (Some(color), None) => {
            let entity = commands
                .spawn((
                    SpriteBundle {
                        sprite: Sprite {
                            color,
                            custom_size: Some(layer.batcher.geometry().extent()),
                            anchor: Anchor::TopLeft,
                            ..default()
                        },
                        transform: Transform::from_xyz(0.0, 0.0, BACKDROP_Z),
                        ..default()
                    },
                    LayerBackdrop { layer: layer_entity },
                ))
                .id();
            commands.entity(layer_entity).add_child(entity);
            layer.backdrop = Some(entity);
        }
        (Some(color), Some(entity)) => {
            if let Ok(mut sprite) = backdrops.get_mut(entity) {
                if sprite.color != color {
                    sprite.color = color;
                }
            }
        }
        (None, Some(entity)) => {
            commands.entity(entity).despawn_recursive();
            layer.backdrop = None;
        }
        (None, None) => {}
    }
} // fn sync_backdrop

/// Despawn mesh and backdrop entities left over by tile layers that were removed.
pub fn cleanup_orphaned_meshes(
    mut commands: Commands,
    mut removed: RemovedComponents<TileLayer>,
    mesh_entities: Query<(Entity, &TilesetMeshEntity)>,
    backdrop_entities: Query<(Entity, &LayerBackdrop)>,
) {
    let removed: Vec<Entity> = removed.iter().collect();
    if removed.is_empty() {
        return;
    }
    let orphans = mesh_entities
        .iter()
        .filter(|(_, mesh_entity)| removed.contains(&mesh_entity.layer))
        .map(|(entity, _)| entity)
        .chain(
            backdrop_entities
                .iter()
                .filter(|(_, backdrop)| removed.contains(&backdrop.layer))
                .map(|(entity, _)| entity),
        );
    for entity in orphans {
        if let Some(entity_commands) = commands.get_entity(entity) {
            entity_commands.despawn_recursive();
        }
    }
}
