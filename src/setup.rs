use bevy::prelude::*;
use chasma_details::DetailViewer;

use crate::input::CameraOrbit;

#[derive(Component)]
pub struct MainCamera;

pub fn setup(mut commands: Commands) {
    // 1) Light
    commands.spawn((
        DirectionalLight {
            illuminance: 12_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(40.0, 80.0, 40.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // 2) Camera; its position drives detail streaming
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(-12.0, 18.0, 30.0).looking_at(Vec3::ZERO, Vec3::Y),
        MainCamera,
        DetailViewer,
        CameraOrbit {
            focus: Vec3::ZERO,
            radius: 30.0,
            yaw: 0.8,
            pitch: 0.5,
        },
    ));
}
