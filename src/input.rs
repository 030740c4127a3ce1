use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::input::{keyboard::KeyCode, ButtonInput};
use bevy::prelude::*;

use chasma_details::heightmap_data::{sample_height, ActiveTerrain};
use chasma_details::props::plugin::DetailVisibilityChanged;
use chasma_details::TerrainHost;

use crate::actions::{ActionState, PlayerAction};
use crate::setup::MainCamera;

pub const MOVE_SPEED: f32 = 25.0;
pub const ROTATE_SPEED: f32 = 0.2;
pub const MAX_CAMERA_DT: f32 = 0.05; // never use a dt larger than 50ms
pub const WIND_STEP: f32 = 0.1;

#[derive(Component)]
pub struct CameraOrbit {
    pub focus: Vec3,
    pub radius: f32,
    pub yaw: f32,
    pub pitch: f32,
}

pub fn input_mapping_system(keys: Res<ButtonInput<KeyCode>>, mut action_state: ResMut<ActionState>) {
    action_state.set(PlayerAction::MoveForward, keys.pressed(KeyCode::KeyW));
    action_state.set(PlayerAction::MoveBackward, keys.pressed(KeyCode::KeyS));
    action_state.set(PlayerAction::MoveLeft, keys.pressed(KeyCode::KeyA));
    action_state.set(PlayerAction::MoveRight, keys.pressed(KeyCode::KeyD));
    action_state.set_just_pressed(PlayerAction::ToggleDetails, keys.just_pressed(KeyCode::KeyV));
    action_state.set_just_pressed(PlayerAction::WindUp, keys.just_pressed(KeyCode::BracketRight));
    action_state.set_just_pressed(PlayerAction::WindDown, keys.just_pressed(KeyCode::BracketLeft));
    action_state.set_just_pressed(PlayerAction::ToggleTerrainLock, keys.just_pressed(KeyCode::KeyL));
}

/// V toggles detail layers, [ / ] change wind, L locks terrain data.
pub fn detail_hotkeys(
    action_state: Res<ActionState>,
    terrain: Option<Res<ActiveTerrain>>,
    mut visibility: EventWriter<DetailVisibilityChanged>,
    mut shown: Local<Option<bool>>,
    mut locked: Local<bool>,
) {
    if action_state.just_pressed(PlayerAction::ToggleDetails) {
        let next = !shown.unwrap_or(true);
        *shown = Some(next);
        visibility.write(DetailVisibilityChanged(next));
        info!("Details {}", if next { "shown" } else { "hidden" });
    }

    let Some(terrain) = terrain else { return };
    let data = &terrain.0;

    let mut wind = data.wind_strength();
    if action_state.just_pressed(PlayerAction::WindUp) {
        wind += WIND_STEP;
    }
    if action_state.just_pressed(PlayerAction::WindDown) {
        wind -= WIND_STEP;
    }
    if wind != data.wind_strength() {
        data.set_wind_strength(wind);
        info!("Wind strength {:.1}", data.wind_strength());
    }

    if action_state.just_pressed(PlayerAction::ToggleTerrainLock) {
        *locked = !*locked;
        if *locked {
            data.lock_data();
        } else {
            data.unlock_data();
        }
        info!("Terrain data {}", if *locked { "locked" } else { "unlocked" });
    }
}

pub fn camera_controller(
    time: Res<Time>,
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    mut motion_evr: EventReader<MouseMotion>,
    mut scroll_evr: EventReader<MouseWheel>,
    action_state: Res<ActionState>,
    terrain: Option<Res<ActiveTerrain>>,
    mut query: Query<(&mut Transform, &mut CameraOrbit), With<MainCamera>>,
) {
    // 0) Clamp delta
    let dt = time.delta_secs().min(MAX_CAMERA_DT);

    let Ok((mut tf, mut orbit)) = query.single_mut() else { return };
    let ground = |x: f32, z: f32| terrain.as_ref().and_then(|t| sample_height(x, z, &t.0)).unwrap_or(0.0);

    // 1) Camera-relative movement
    let forward = Vec2::new(-orbit.yaw.cos(), -orbit.yaw.sin());
    let right = Vec2::new(-forward.y, forward.x);

    let mut dir = Vec2::ZERO;
    if action_state.pressed(PlayerAction::MoveForward) { dir += forward; }
    if action_state.pressed(PlayerAction::MoveBackward) { dir -= forward; }
    if action_state.pressed(PlayerAction::MoveLeft) { dir -= right; }
    if action_state.pressed(PlayerAction::MoveRight) { dir += right; }

    if dir != Vec2::ZERO {
        let delta = dir.normalize() * MOVE_SPEED * dt;
        orbit.focus.x += delta.x;
        orbit.focus.z += delta.y;
    }

    // 2) Ground the focus Y
    orbit.focus.y = ground(orbit.focus.x, orbit.focus.z);

    // 3) Zoom
    for ev in scroll_evr.read() {
        let amount = match ev.unit {
            MouseScrollUnit::Line => ev.y * 1.0,
            MouseScrollUnit::Pixel => ev.y * 0.02,
        };
        orbit.radius = (orbit.radius - amount).clamp(2.0, 400.0);
    }

    // 4) Orbit
    if mouse_buttons.pressed(MouseButton::Middle) {
        for ev in motion_evr.read() {
            orbit.yaw += ev.delta.x * ROTATE_SPEED * dt;
            orbit.pitch += ev.delta.y * ROTATE_SPEED * dt;
        }
    }

    orbit.pitch = orbit.pitch.clamp(-std::f32::consts::FRAC_PI_2 + 0.01, std::f32::consts::FRAC_PI_2 - 0.01);

    // 5) Position camera
    let xz_radius = orbit.radius * orbit.pitch.cos();
    let offset = Vec3::new(
        xz_radius * orbit.yaw.cos(),
        orbit.radius * orbit.pitch.sin(),
        xz_radius * orbit.yaw.sin(),
    );
    tf.translation = orbit.focus + offset;

    // 6) Prevent underground camera
    let terrain_y = ground(tf.translation.x, tf.translation.z);
    if tf.translation.y < terrain_y + 2.5 {
        tf.translation.y = terrain_y + 2.5;
    }

    tf.look_at(orbit.focus, Vec3::Y);
}
