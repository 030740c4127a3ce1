// src/props/bounds.rs
//! Chunk bounds from terrain elevation.

use bevy::math::{UVec2, Vec2, Vec3};

use crate::props::core::ChunkBounds;
use crate::terrain::host::TerrainHost;

/// Cell rectangle `[min, max)` covering a layer-space XZ footprint.
///
/// Heights are corner samples, so the far corner row `ceil(end / scale)` is
/// part of the footprint: ground under the last strip interpolates into it.
pub fn footprint_cells(origin_xz: Vec2, size: f32, cell_scale: Vec2, resolution: u32) -> (UVec2, UVec2) {
    let scale = cell_scale.max(Vec2::splat(f32::EPSILON));
    let lo = (origin_xz / scale).floor().max(Vec2::ZERO);
    let hi = ((origin_xz + Vec2::splat(size)) / scale).ceil().max(Vec2::ZERO) + Vec2::ONE;
    let res = UVec2::splat(resolution);
    (lo.as_uvec2().min(res), hi.as_uvec2().min(res))
}

/// Local AABB of the chunk whose corner sits at `local_origin` (layer space).
///
/// Horizontal extents are exactly `chunk_size`; the vertical range is the
/// terrain's raw height range over the footprint times its vertical scale.
/// The result is relative to the chunk transform, so it carries no X/Z offset.
pub fn compute_chunk_aabb(terrain: &dyn TerrainHost, local_origin: Vec3, chunk_size: f32) -> ChunkBounds {
    let (min_cell, max_cell) = footprint_cells(
        Vec2::new(local_origin.x, local_origin.z),
        chunk_size,
        terrain.horizontal_scale(),
        terrain.resolution(),
    );
    let (lo, hi) = terrain.elevation_range(min_cell, max_cell).unwrap_or((0.0, 0.0));
    let sy = terrain.vertical_scale();
    let (y0, y1) = if sy >= 0.0 { (lo * sy, hi * sy) } else { (hi * sy, lo * sy) };

    ChunkBounds::new(Vec3::new(0.0, y0, 0.0), Vec3::new(chunk_size, y1, chunk_size))
}
