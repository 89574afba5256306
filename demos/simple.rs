//! Two tilesets on one layer, a ghost brush following the cursor.
//!
//! LMB commits the brush tile to the hovered cell, RMB pans, the scroll wheel zooms.
//! Press O to toggle the cell outline, T to tint the hovered cell.

use bevy::{
    diagnostic::{FrameTimeDiagnosticsPlugin, LogDiagnosticsPlugin},
    math::{uvec2, vec2},
    prelude::*,
    window::PresentMode,
};
use bevy_inspector_egui::quick::WorldInspectorPlugin;
use bevy_tile_batcher::prelude::*;

#[path = "common/mouse_controls_camera.rs"]
mod mouse_controls_camera;
use mouse_controls_camera::MouseControlsCameraPlugin;

const GROUND: i32 = 0;
const DECOR: i32 = 1;

/// Tile placed with the left mouse button.
const BRUSH: TileRef = TileRef::new(DECOR, 5);

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
            WorldInspectorPlugin::new(),
            MouseControlsCameraPlugin::default(),
            TileBatcherPlugin::default(),
        ))
        .add_systems(Startup, startup)
        .add_systems(Update, (brush_under_cursor, toggle_outline, log_ready_tilesets))
        .run();
}

fn startup(mut commands: Commands, mut images: ResMut<Assets<Image>>, mut tilesets: ResMut<Tilesets>) {
    commands.spawn(Camera2dBundle::default());

    let mut rng = rand::thread_rng();
    let tile_size = uvec2(16, 16);

    // Generated stand-ins for real tileset textures
    let ground = images.add(generate_test_atlas(4, 4, tile_size, &mut rng));
    let decor = images.add(generate_test_atlas(8, 2, tile_size, &mut rng));
    tilesets.insert(GROUND, ground, tile_size.as_vec2());
    tilesets.insert(DECOR, decor, tile_size.as_vec2());

    let layer = TileLayerBuilder::new(uvec2(64, 48), vec2(16., 16.))
        .with_ghost_opacity(0.6)
        .with_backdrop(DEFAULT_BACKDROP_COLOR)
        .build_and_set(|p| {
            if (p.x / 8 + p.y / 8) % 2 == 0 {
                TileRef::new(GROUND, ((p.x + p.y) % 4) as i32)
            } else if p.x % 5 == 0 && p.y % 3 == 0 {
                TileRef::new(DECOR, (p.x % 16) as i32)
            } else {
                TileRef::new(GROUND, 8)
            }
        });

    match layer {
        Ok(layer) => {
            commands.spawn(
                TileLayerBundle::new(layer).with_transform(Transform::from_xyz(-512., 384., 0.)),
            );
        }
        Err(e) => error!("could not build layer: {}", e),
    }
} // startup

/// Preview the brush tile under the cursor, commit it on click.
fn brush_under_cursor(
    windows: Query<&Window>,
    mouse_button: Res<Input<MouseButton>>,
    keyboard: Res<Input<KeyCode>>,
    camera_query: Query<(&GlobalTransform, &Camera)>,
    mut layers: Query<(&GlobalTransform, &mut TileLayer)>,
) {
    let Some(cursor) = windows.iter().next().and_then(|w| w.cursor_position()) else {
        return;
    };

    for (camera_transform, camera) in camera_query.iter() {
        // Translate viewport coordinates to world coordinates
        let Some(world) = camera
            .viewport_to_world(camera_transform, cursor)
            .map(|ray| ray.origin.truncate())
        else {
            continue;
        };

        for (layer_transform, mut layer) in layers.iter_mut() {
            let hovered = layer.pick_world(layer_transform, world);
            let batcher = layer.batcher_mut();
            batcher.clear_ghosts();

            let Some(cell) = hovered else {
                continue;
            };

            // Setting the same ghosts every frame is cheap: unchanged cells are not rewritten
            let result = if mouse_button.pressed(MouseButton::Left) {
                batcher.set_tile(cell.x, cell.y, BRUSH)
            } else if keyboard.just_pressed(KeyCode::T) {
                let tint = match batcher.get_tile(cell.x, cell.y).and_then(|t| t.tint()) {
                    Some(_) => None,
                    None => Some(Color::ORANGE_RED),
                };
                batcher.set_tint(cell.x, cell.y, tint)
            } else {
                batcher.set_ghost(cell.x, cell.y, Some(BRUSH))
            };

            if let Err(e) = result {
                warn!("{}", e);
            }
        } // for layer
    } // for camera
} // brush_under_cursor

fn toggle_outline(keyboard: Res<Input<KeyCode>>, mut layers: Query<&mut TileLayer>) {
    if !keyboard.just_pressed(KeyCode::O) {
        return;
    }
    for mut layer in layers.iter_mut() {
        let outline = !layer.batcher().settings().outline;
        layer.set_outline(outline);
    }
}

fn log_ready_tilesets(mut evs: EventReader<TilesetReadyEvent>) {
    for ev in evs.iter() {
        info!("tileset {} ready (reloaded: {})", ev.tileset_id, ev.reloaded);
    }
}
