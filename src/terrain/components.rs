// src/terrain/components.rs
use bevy::prelude::*;

/// Marker for all terrain-related entities (terrain mesh, debug quads, etc.)
#[derive(Component)]
pub struct Terrain;

/// Identifies a detail chunk by its lattice key in layer space.
#[derive(Component, Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct ChunkKey {
    pub cx: i32,
    pub cz: i32,
}

impl ChunkKey {
    #[inline]
    pub const fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }

    /// Layer-space corner of the chunk (Y is always 0; height lives in the AABB).
    #[inline]
    pub fn local_origin(self, chunk_size: f32) -> Vec3 {
        Vec3::new(self.cx as f32 * chunk_size, 0.0, self.cz as f32 * chunk_size)
    }
}
