//! Demo illustrating live updates on a large layer.
//! Random patches of a 512x512 layer are changed every frame. Only the cells of a patch are
//! rewritten, the per-frame statistics show how many triangles that amounts to.
//!
//! Compiling this with --release makes a huge difference.

use bevy::{
    diagnostic::{FrameTimeDiagnosticsPlugin, LogDiagnosticsPlugin},
    math::{uvec2, vec2},
    prelude::*,
    window::PresentMode,
};
use bevy_tile_batcher::prelude::*;
use rand::Rng;

#[path = "common/mouse_controls_camera.rs"]
mod mouse_controls_camera;
use mouse_controls_camera::MouseControlsCameraPlugin;

const TILESETS: i32 = 3;

fn main() {
    App::new()
        .add_plugins((
            DefaultPlugins.set(WindowPlugin {
                primary_window: Some(Window {
                    title: String::from("Tile batcher example"),
                    resolution: (1820., 920.).into(),
                    // disable vsync so we can see the raw FPS speed
                    present_mode: PresentMode::Immediate,
                    ..default()
                }),
                ..default()
            }),
            LogDiagnosticsPlugin::default(),
            FrameTimeDiagnosticsPlugin::default(),
            MouseControlsCameraPlugin::default(),
            TileBatcherPlugin::default(),
        ))
        .add_systems(Startup, startup)
        .add_systems(Update, (change_layer, report_stats))
        .run();
}

fn startup(mut commands: Commands, mut images: ResMut<Assets<Image>>, mut tilesets: ResMut<Tilesets>) {
    commands.spawn(Camera2dBundle::default());

    let mut rng = rand::thread_rng();
    for tileset_id in 0..TILESETS {
        let texture = images.add(generate_test_atlas(4, 4, uvec2(8, 8), &mut rng));
        tilesets.insert(tileset_id, texture, vec2(8., 8.));
    }

    let layer = TileLayerBuilder::new(uvec2(512, 512), vec2(8., 8.))
        .build_and_set(|_| TileRef::new(0, 2));

    match layer {
        Ok(layer) => {
            commands.spawn(
                TileLayerBundle::new(layer).with_transform(Transform::from_xyz(-2048., 2048., 0.)),
            );
        }
        Err(e) => error!("could not build layer: {}", e),
    }
}

/// Update random patches of tiles in the layer.
fn change_layer(mut layers: Query<&mut TileLayer>) {
    let mut rng = rand::thread_rng();

    for mut layer in layers.iter_mut() {
        let batcher = layer.batcher_mut();
        let size = batcher.size();

        let k = rng.gen_range(5..50);
        let x_min = rng.gen_range(0..size.x - k);
        let y_min = rng.gen_range(0..size.y - k);
        // Now and then a patch of nothing
        let tile = match rng.gen_range(0..10) {
            0 => TileRef::EMPTY,
            _ => TileRef::new(rng.gen_range(0..TILESETS), rng.gen_range(0..16)),
        };

        for y in y_min..y_min + k {
            for x in x_min..x_min + k {
                if let Err(e) = batcher.set_tile(x, y, tile) {
                    warn!("{}", e);
                }
            }
        }
    }
} // fn change_layer

fn report_stats(layers: Query<&TileLayer>, mut frames: Local<u32>) {
    *frames += 1;
    if *frames % 60 != 0 {
        return;
    }
    for layer in layers.iter() {
        let stats = layer.last_stats();
        info!(
            "{} meshes, last frame: {} tiles changed, {} triangles written, {} cleared",
            layer.batcher().mesh_count(),
            stats.tiles_changed,
            stats.triangles_written,
            stats.triangles_cleared,
        );
    }
}
