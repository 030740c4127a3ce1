// src/props/params.rs
//! Shared material configuration for a detail layer.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::props::error::DetailError;
use crate::props::wind::WindSample;

/// Names the layer drives itself; custom params may not shadow them.
pub const RESERVED_PARAMS: &[&str] = &[
    "terrain_heightmap",
    "terrain_normalmap",
    "terrain_colormap",
    "terrain_detailmap",
    "terrain_inverse_transform",
    "terrain_normal_basis",
    "albedo_texture",
    "view_distance",
    "chunk_size",
    "ambient_wind",
];

/// Custom values the detail material has room for (one vec4 slot each).
pub const MAX_CUSTOM_PARAMS: usize = 8;

pub fn is_reserved(name: &str) -> bool {
    RESERVED_PARAMS.contains(&name)
}

/// A user-supplied uniform value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ShaderParamValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl ShaderParamValue {
    /// Uniform slot layout: scalars in `x`, unused lanes zero, bools as 0/1.
    pub fn to_vec4(&self) -> Vec4 {
        match *self {
            Self::Float(v) => Vec4::new(v, 0.0, 0.0, 0.0),
            Self::Int(v) => Vec4::new(v as f32, 0.0, 0.0, 0.0),
            Self::Bool(v) => Vec4::new(if v { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0),
            Self::Vec2([x, y]) => Vec4::new(x, y, 0.0, 0.0),
            Self::Vec3([x, y, z]) => Vec4::new(x, y, z, 0.0),
            Self::Vec4(v) => Vec4::from_array(v),
        }
    }
}

/// Custom shader params by name, kept sorted for stable upload order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderParams {
    values: BTreeMap<String, ShaderParamValue>,
}

impl ShaderParams {
    pub fn set(&mut self, name: &str, value: ShaderParamValue) -> Result<(), DetailError> {
        if is_reserved(name) {
            return Err(DetailError::ReservedParam(name.to_string()));
        }
        if self.values.len() >= MAX_CUSTOM_PARAMS && !self.values.contains_key(name) {
            return Err(DetailError::TooManyParams { max: MAX_CUSTOM_PARAMS });
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<ShaderParamValue> {
        self.values.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&ShaderParamValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ShaderParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values in name order as uniform slots, plus how many slots are used.
    pub fn packed(&self) -> ([Vec4; MAX_CUSTOM_PARAMS], u32) {
        let mut slots = [Vec4::ZERO; MAX_CUSTOM_PARAMS];
        for (slot, value) in slots.iter_mut().zip(self.values.values()) {
            *slot = value.to_vec4();
        }
        (slots, self.values.len().min(MAX_CUSTOM_PARAMS) as u32)
    }
}

/// Everything the shared detail material needs for one frame.
#[derive(Clone, Debug, Default)]
pub struct DetailMaterialParams {
    /// Albedo applied to every instance.
    pub albedo_texture: Option<Handle<Image>>,
    /// Density mask for this layer; `None` when the layer index has no map.
    pub detail_map: Option<Handle<Image>>,
    /// Raw heights on the GPU; without it cards stay at the chunk's base height.
    pub height_map: Option<Handle<Image>>,
    /// Cell space to world space, translated to where the terrain currently is.
    pub terrain_transform: Transform,
    /// Heightmap cells per side.
    pub terrain_resolution: u32,
    pub view_distance: f32,
    pub chunk_size: f32,
    pub wind: WindSample,
    pub custom: ShaderParams,
}

impl DetailMaterialParams {
    /// `(amplitude, phase)` as uploaded to `ambient_wind`.
    pub fn ambient_wind(&self) -> Vec2 {
        Vec2::new(self.wind.amplitude, self.wind.phase)
    }
}
