use bevy::{
    log::{debug, warn},
    prelude::*,
    render::{
        render_resource::{FilterMode, SamplerDescriptor},
        texture::ImageSampler,
    },
};
use std::collections::HashMap;

use crate::atlas::{AtlasProvider, TextureAtlas};

#[derive(Debug, Clone)]
enum AtlasState {
    /// Waiting for the image to load (or to load again).
    Pending,
    Ready(TextureAtlas),
    /// The loaded image cannot be sliced into tiles. Not retried until the
    /// image changes size or the tileset is registered again.
    Failed { image_size: Vec2 },
}

#[derive(Debug, Clone)]
struct TilesetEntry {
    texture: Handle<Image>,
    tile_size: Vec2,
    state: AtlasState,
    /// An atlas has been built for this id before: the next one replaces it.
    had_atlas: bool,
}

/// All tilesets known to tile layers, by tileset id.
///
/// Register a tileset with [`Tilesets::insert`] as soon as its texture
/// handle exists; layers start showing its tiles once the image is loaded.
#[derive(Resource, Debug, Default)]
pub struct Tilesets {
    entries: HashMap<i32, TilesetEntry>,
}

impl Tilesets {
    /// Register (or replace) tileset `tileset_id`, sliced into tiles of
    /// `tile_size` pixels. Cells showing a replaced tileset are resolved
    /// against the new atlas once it is loaded.
    pub fn insert(&mut self, tileset_id: i32, texture: Handle<Image>, tile_size: Vec2) {
        let had_atlas = self.entries.get(&tileset_id).map_or(false, |entry| entry.had_atlas);
        self.entries.insert(
            tileset_id,
            TilesetEntry {
                texture,
                tile_size,
                state: AtlasState::Pending,
                had_atlas,
            },
        );
    }

    pub fn remove(&mut self, tileset_id: i32) -> Option<Handle<Image>> {
        self.entries.remove(&tileset_id).map(|entry| entry.texture)
    }

    pub fn texture(&self, tileset_id: i32) -> Option<&Handle<Image>> {
        self.entries.get(&tileset_id).map(|entry| &entry.texture)
    }

    /// True iff the atlas of `tileset_id` is loaded and usable.
    pub fn is_ready(&self, tileset_id: i32) -> bool {
        self.atlas(tileset_id).is_some()
    }

    /// True iff the image of `tileset_id` loaded but does not fit its tile size.
    pub fn is_failed(&self, tileset_id: i32) -> bool {
        matches!(
            self.entries.get(&tileset_id).map(|entry| &entry.state),
            Some(AtlasState::Failed { .. })
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AtlasProvider for Tilesets {
    fn atlas(&self, tileset_id: i32) -> Option<&TextureAtlas> {
        match &self.entries.get(&tileset_id)?.state {
            AtlasState::Ready(atlas) => Some(atlas),
            _ => None,
        }
    }
}

/// Signals that the atlas of `tileset_id` became available.
/// `reloaded` is set if it replaced a previous atlas of that tileset.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilesetReadyEvent {
    pub tileset_id: i32,
    pub reloaded: bool,
}

fn nearest_sampler() -> ImageSampler {
    ImageSampler::Descriptor(SamplerDescriptor {
        // min_filter of linear gives undesired grid lines when zooming out
        min_filter: FilterMode::Nearest,
        // mag_filter of linear gives mushy edges on tiles in closeup which is
        // usually not what we want
        mag_filter: FilterMode::Nearest,
        ..default()
    })
}

fn is_nearest(sampler: &ImageSampler) -> bool {
    matches!(
        sampler,
        ImageSampler::Descriptor(descriptor)
            if descriptor.min_filter == FilterMode::Nearest && descriptor.mag_filter == FilterMode::Nearest
    )
}

/// Resolve atlases of registered tilesets whose images finished loading,
/// configure their sampling and send out a [`TilesetReadyEvent`] for each.
pub fn resolve_tilesets(
    mut ev_asset: EventReader<AssetEvent<Image>>,
    mut images: ResMut<Assets<Image>>,
    mut tilesets: ResMut<Tilesets>,
    mut send_ready_event: EventWriter<TilesetReadyEvent>,
) {
    for ev in ev_asset.iter() {
        match ev {
            AssetEvent::Modified { handle } => {
                let Some(image) = images.get(handle) else {
                    continue;
                };
                let size = image.size();
                for (tileset_id, entry) in tilesets.entries.iter_mut() {
                    if entry.texture != *handle {
                        continue;
                    }
                    // Our own sampler change shows up as a modification too
                    let unchanged = match &entry.state {
                        AtlasState::Pending => true,
                        AtlasState::Ready(atlas) => atlas.atlas_size() == size,
                        AtlasState::Failed { image_size } => *image_size == size,
                    };
                    if !unchanged {
                        debug!("image of tileset {} changed size to {}", tileset_id, size);
                        entry.state = AtlasState::Pending;
                    }
                }
            } // AssetEvent::Modified
            AssetEvent::Removed { handle } => {
                for entry in tilesets.entries.values_mut() {
                    if entry.texture == *handle {
                        entry.state = AtlasState::Pending;
                    }
                }
            }
            AssetEvent::Created { .. } => {}
        } // match
    } // ev

    // Polling rather than waiting for `Created` also catches tilesets that
    // were registered after their image had been loaded
    for (tileset_id, entry) in tilesets.entries.iter_mut() {
        if !matches!(entry.state, AtlasState::Pending) {
            continue;
        }
        let Some(image) = images.get(&entry.texture) else {
            continue;
        };

        match TextureAtlas::from_image(entry.texture.clone(), image, entry.tile_size) {
            Ok(atlas) => {
                debug!(
                    "tileset {} ready: {} tiles of {}",
                    tileset_id,
                    atlas.tile_count(),
                    entry.tile_size
                );
                // Only touch the image if needed, every mutable access
                // makes bevy upload it again
                if !is_nearest(&image.sampler_descriptor) {
                    if let Some(image) = images.get_mut(&entry.texture) {
                        image.sampler_descriptor = nearest_sampler();
                    }
                }
                entry.state = AtlasState::Ready(atlas);
                send_ready_event.send(TilesetReadyEvent {
                    tileset_id: *tileset_id,
                    reloaded: entry.had_atlas,
                });
                entry.had_atlas = true;
            }
            Err(e) => {
                warn!("tileset {}: {}", tileset_id, e);
                entry.state = AtlasState::Failed {
                    image_size: image.size(),
                };
            }
        }
    }
} // fn resolve_tilesets
