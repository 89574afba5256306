//! Helper module for demos, allowing panning and zooming with the mouse.

use bevy::{
    input::mouse::{MouseMotion, MouseWheel},
    math::vec3,
    prelude::*,
};

#[derive(Default)]
pub struct MouseControlsCameraPlugin;

impl Plugin for MouseControlsCameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, mouse_controls_camera);
    }
}

/// Use RMB for panning
/// Use scroll wheel for zooming
fn mouse_controls_camera(
    mouse_button: Res<Input<MouseButton>>,
    mut mouse_motion_events: EventReader<MouseMotion>,
    mut mouse_wheel_events: EventReader<MouseWheel>,
    mut camera_query: Query<&mut Transform, With<Camera>>,
) {
    for event in mouse_motion_events.iter() {
        if mouse_button.pressed(MouseButton::Right) {
            for mut transform in camera_query.iter_mut() {
                transform.translation.x -= event.delta.x * transform.scale.x;
                transform.translation.y += event.delta.y * transform.scale.y;
            }
        }
    }

    let wheel_y: f32 = mouse_wheel_events.iter().map(|event| event.y).sum();

    if wheel_y != 0. {
        for mut transform in camera_query.iter_mut() {
            let factor = f32::powf(2., -wheel_y / 2.);
            transform.scale *= vec3(factor, factor, 1.0);
            transform.scale = transform.scale.max(Vec3::splat(1. / 128.)).min(Vec3::splat(128.));
        }
    }
}
