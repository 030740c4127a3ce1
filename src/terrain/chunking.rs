// src/terrain/chunking.rs
//! Chunk-grid math shared by the detail streamer.

use bevy::prelude::*;

use crate::terrain::components::ChunkKey;

/// Extra ring of chunks scanned beyond the view distance.
pub const CANDIDATE_MARGIN: i32 = 1;

/// Number of chunks needed to cover `world_size` (per axis).
pub fn chunk_count(world_size: Vec2, chunk_size: f32) -> IVec2 {
    let cs = chunk_size.max(f32::EPSILON);
    IVec2::new(
        (world_size.x / cs).ceil().max(0.0) as i32,
        (world_size.y / cs).ceil().max(0.0) as i32,
    )
}

/// Chunk containing a layer-space XZ position (may be outside the grid).
pub fn chunk_at(local_xz: Vec2, chunk_size: f32) -> IVec2 {
    let cs = chunk_size.max(f32::EPSILON);
    IVec2::new(
        (local_xz.x / cs).floor() as i32,
        (local_xz.y / cs).floor() as i32,
    )
}

/// Inclusive-exclusive rectangle of chunk keys to scan around a viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkRect {
    pub min: IVec2,
    pub max: IVec2,
}

impl ChunkRect {
    pub fn is_empty(&self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y
    }

    pub fn keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        (self.min.y..self.max.y)
            .flat_map(move |cz| (self.min.x..self.max.x).map(move |cx| ChunkKey::new(cx, cz)))
    }
}

/// Candidate rectangle: `ceil(view_distance / chunk_size) + 1` chunks around the
/// viewer's chunk, clamped to `[0, count)`.
pub fn candidate_rect(
    viewer_local: Vec3,
    chunk_size: f32,
    view_distance: f32,
    count: IVec2,
) -> ChunkRect {
    let center = chunk_at(Vec2::new(viewer_local.x, viewer_local.z), chunk_size);
    let radius = (view_distance.max(0.0) / chunk_size.max(f32::EPSILON)).ceil() as i32 + CANDIDATE_MARGIN;

    let min = center.saturating_sub(IVec2::splat(radius)).max(IVec2::ZERO);
    let max = center
        .saturating_add(IVec2::splat(radius.saturating_add(1)))
        .min(count.max(IVec2::ZERO));
    ChunkRect { min, max }
}
