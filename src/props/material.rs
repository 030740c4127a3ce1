// src/props/material.rs
//! Shared detail material: `StandardMaterial` for albedo/alpha plus an
//! extension whose vertex stage grounds cards on the terrain heightmap, sways
//! them with the ambient wind, thins them by the density mask and fades them
//! out toward the view distance.

use bevy::pbr::{ExtendedMaterial, MaterialExtension};
use bevy::prelude::*;
use bevy::render::render_resource::{AsBindGroup, ShaderRef, ShaderType};

use crate::props::params::{DetailMaterialParams, MAX_CUSTOM_PARAMS};

pub const DETAIL_SHADER_PATH: &str = "shaders/detail.wgsl";

/// Horizontal tip travel per unit of card height at full wind (see `detail.wgsl`).
pub const SWAY_REACH: f32 = 0.3;

/// `DetailUniform::maps` bits.
pub const HAS_HEIGHTMAP: u32 = 1;
pub const HAS_DETAILMAP: u32 = 2;

pub type DetailMaterial = ExtendedMaterial<StandardMaterial, DetailExtension>;

/// Uniform block at binding 100. Field order matches `DetailSettings` in the shader.
#[derive(ShaderType, Reflect, Clone, Copy, Debug, Default, PartialEq)]
pub struct DetailUniform {
    /// World space to (cell x, raw height, cell z).
    pub terrain_inverse_transform: Mat4,
    /// (amplitude, phase)
    pub ambient_wind: Vec2,
    pub view_distance: f32,
    pub chunk_size: f32,
    /// x: terrain origin Y, y: vertical scale, z: resolution in cells.
    pub terrain: Vec3,
    pub maps: u32,
    /// Custom params in name order, see `ShaderParams::packed`.
    pub custom: [Vec4; MAX_CUSTOM_PARAMS],
    pub custom_count: u32,
}

impl DetailUniform {
    pub fn from_params(params: &DetailMaterialParams) -> Self {
        let t = params.terrain_transform;
        let (custom, custom_count) = params.custom.packed();

        let mut maps = 0;
        if params.height_map.is_some() {
            maps |= HAS_HEIGHTMAP;
        }
        if params.detail_map.is_some() {
            maps |= HAS_DETAILMAP;
        }

        Self {
            terrain_inverse_transform: cell_space_inverse(&t),
            ambient_wind: params.ambient_wind(),
            view_distance: params.view_distance,
            chunk_size: params.chunk_size,
            terrain: Vec3::new(t.translation.y, t.scale.y, params.terrain_resolution as f32),
            maps,
            custom,
            custom_count,
        }
    }
}

/// Inverse of the cell-to-world transform; a zero scale axis maps as 1 so the
/// matrix stays finite (only X/Z are read back).
fn cell_space_inverse(t: &Transform) -> Mat4 {
    let safe = |v: f32| if v.abs() < f32::EPSILON { 1.0 } else { v };
    let scale = Vec3::new(safe(t.scale.x), safe(t.scale.y), safe(t.scale.z));
    Mat4::from_scale_rotation_translation(scale, t.rotation, t.translation).inverse()
}

#[derive(Asset, AsBindGroup, Reflect, Clone, Debug, Default)]
pub struct DetailExtension {
    #[uniform(100)]
    pub settings: DetailUniform,

    /// Raw heights (R32Float), read with `textureLoad`.
    #[texture(101, sample_type = "float", filterable = false)]
    pub terrain_heightmap: Option<Handle<Image>>,

    /// Density mask of this layer.
    #[texture(102)]
    #[sampler(103)]
    pub terrain_detailmap: Option<Handle<Image>>,
}

impl DetailExtension {
    /// Copy one frame's layer state into the material.
    pub fn apply(&mut self, params: &DetailMaterialParams) {
        self.settings = DetailUniform::from_params(params);
        if self.terrain_heightmap != params.height_map {
            self.terrain_heightmap = params.height_map.clone();
        }
        if self.terrain_detailmap != params.detail_map {
            self.terrain_detailmap = params.detail_map.clone();
        }
    }
}

impl MaterialExtension for DetailExtension {
    fn vertex_shader() -> ShaderRef {
        DETAIL_SHADER_PATH.into()
    }
}
