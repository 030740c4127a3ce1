// src/props/core.rs
//! Core types/traits for chunk-streamed detail layers.
//! Keep this file dependency-light; the streamer, pool and renderers all build on it.

use bevy::prelude::*; // Vec3, Quat, Transform, Color
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::props::instancing::template::InstanceBatchTemplate;
use crate::props::params::DetailMaterialParams;
use crate::terrain::components::ChunkKey;

// ---------- Seeds, worlds ----------

/// Seed for template generation; changing it reshuffles every chunk of a layer.
#[derive(Resource, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldSeed(pub u64);

impl Default for WorldSeed {
    fn default() -> Self {
        Self(1337)
    }
}

/// Render world a layer draws into (maps to a render layer in Bevy).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldHandle(pub u32);

// ---------- Instances ----------

/// One detail object inside the template, relative to the chunk corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetailInstance {
    pub translation: Vec3,
    /// Yaw (radians) around +Y.
    pub yaw: f32,
    /// Uniform scale.
    pub scale: f32,
    pub color: Color,
}

impl DetailInstance {
    pub fn transform(&self) -> Transform {
        Transform {
            translation: self.translation,
            rotation: Quat::from_rotation_y(self.yaw),
            scale: Vec3::splat(self.scale),
        }
    }
}

// ---------- Bounds ----------

/// Axis-aligned box, relative to whatever transform owns it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl ChunkBounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

// ---------- Rendering backend ----------

/// What a detail layer needs from the renderer: heavyweight per-chunk handles
/// bound to a shared template, plus one shared material.
pub trait DetailRenderer {
    type Handle: Clone + std::fmt::Debug;

    /// Create a hidden, unassigned chunk handle drawing `template`.
    fn create_chunk(&mut self, template: &Arc<InstanceBatchTemplate>) -> Self::Handle;

    /// Point an existing handle at a (re)generated template.
    fn rebind_template(&mut self, handle: &Self::Handle, template: &Arc<InstanceBatchTemplate>);

    fn assign_key(&mut self, handle: &Self::Handle, key: Option<ChunkKey>);

    fn set_transform(&mut self, handle: &Self::Handle, transform: Transform);

    /// Bounds relative to the handle's transform.
    fn set_bounds(&mut self, handle: &Self::Handle, bounds: ChunkBounds);

    fn set_visible(&mut self, handle: &Self::Handle, visible: bool);

    fn set_world(&mut self, handle: &Self::Handle, world: WorldHandle);

    /// Shared material update, pushed once per `advance`.
    fn update_material(&mut self, params: &DetailMaterialParams);
}
