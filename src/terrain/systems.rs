use bevy::prelude::*;
use bevy::render::mesh::{Indices, Mesh};
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::PrimitiveTopology;
use std::sync::Arc;

use crate::heightmap_data::{ActiveTerrain, HeightmapData};
use crate::terrain::components::Terrain;
use crate::terrain::host::TerrainHost;

pub const HEIGHTMAP_PATH: &str = "assets/heightmaps/meadow.png";
/// Cells per side of the generated fallback terrain.
pub const FALLBACK_RES: u32 = 256;
pub const HEIGHT_SCALE: f32 = 24.0;
/// Detail maps handed to the terrain (one per detail layer slot).
pub const DETAIL_MAP_COUNT: usize = 2;

/// 1) Load the heightmap into the shared `ActiveTerrain` resource.
/// Falls back to rolling hills when the image is missing.
pub fn load_heightmap_data(mut commands: Commands, mut images: ResMut<Assets<Image>>) {
    let data = match image::open(HEIGHTMAP_PATH) {
        Ok(img) => {
            let gray = img.to_luma8();
            info!("Terrain: loaded {} ({}x{})", HEIGHTMAP_PATH, gray.width(), gray.height());
            HeightmapData::from_gray_image(&gray)
        }
        Err(e) => {
            warn!("Terrain: {} unavailable ({}), generating hills", HEIGHTMAP_PATH, e);
            rolling_hills(FALLBACK_RES)
        }
    };

    // center the map so (0,0) is in the middle
    let half = data.resolution() as f32 * 0.5;
    let detail_maps = (0..DETAIL_MAP_COUNT).map(|_| images.add(Image::default())).collect();
    let mut data = data
        .with_origin(Vec3::new(-half, 0.0, -half))
        .with_height_scale(HEIGHT_SCALE)
        .with_detail_maps(detail_maps)
        .with_wind_strength(0.35);
    // detail shaders ground their cards on this copy
    if let Some(heights) = data.height_image() {
        data = data.with_height_map(images.add(heights));
    }

    commands.insert_resource(ActiveTerrain(Arc::new(data)));
}

/// Raw heights in 0..1 from a couple of overlapping sine waves.
pub fn rolling_hills(resolution: u32) -> HeightmapData {
    let k = std::f32::consts::TAU / resolution.max(1) as f32;
    HeightmapData::from_fn(resolution, |x, z| {
        let (fx, fz) = (x as f32 * k, z as f32 * k);
        let h = (fx * 2.0).sin() * (fz * 3.0).cos() * 0.35 + (fx * 5.0 + fz * 4.0).sin() * 0.15;
        (h + 0.5).clamp(0.0, 1.0)
    })
}

/// 2) Spawn one mesh covering the whole heightmap.
pub fn spawn_terrain_mesh(
    mut commands: Commands,
    terrain: Res<ActiveTerrain>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let data = &*terrain.0;
    let Some(mesh) = build_terrain_mesh(data) else {
        warn!("Terrain: no heightmap data, nothing to spawn");
        return;
    };

    commands.spawn((
        Mesh3d(meshes.add(mesh)),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.32, 0.42, 0.22),
            perceptual_roughness: 0.95,
            ..default()
        })),
        Transform::from_translation(data.origin()),
        Terrain,
        Name::new("Terrain"),
    ));
}

/// Build a grid mesh with one vertex per cell, relative to the terrain origin.
/// Normals come from central differences of the scaled heights.
pub fn build_terrain_mesh(data: &HeightmapData) -> Option<Mesh> {
    let res = data.resolution();
    if res < 2 {
        return None;
    }
    let scale = data.horizontal_scale();
    let sy = data.vertical_scale();
    let height = |x: i64, z: i64| {
        let xi = x.clamp(0, res as i64 - 1) as u32;
        let zi = z.clamp(0, res as i64 - 1) as u32;
        data.raw_height(xi, zi) * sy
    };

    // 1) Positions, normals & UVs
    let count = (res * res) as usize;
    let mut positions = Vec::with_capacity(count);
    let mut normals = Vec::with_capacity(count);
    let mut uvs = Vec::with_capacity(count);
    let inv = 1.0 / (res - 1) as f32;
    for z in 0..res {
        for x in 0..res {
            let (xi, zi) = (x as i64, z as i64);
            positions.push([x as f32 * scale.x, height(xi, zi), z as f32 * scale.y]);

            let dx = (height(xi + 1, zi) - height(xi - 1, zi)) / (2.0 * scale.x);
            let dz = (height(xi, zi + 1) - height(xi, zi - 1)) / (2.0 * scale.y);
            normals.push(Vec3::new(-dx, 1.0, -dz).normalize().to_array());
            uvs.push([x as f32 * inv, z as f32 * inv]);
        }
    }

    // 2) Indices (two tris per quad)
    let mut indices = Vec::with_capacity(((res - 1) * (res - 1) * 6) as usize);
    for z in 0..res - 1 {
        for x in 0..res - 1 {
            let a = z * res + x;
            let c = a + res;
            indices.extend_from_slice(&[a, c, a + 1, a + 1, c, c + 1]);
        }
    }

    // 3) Assemble the mesh
    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(indices));
    Some(mesh)
}
