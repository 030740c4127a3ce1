// src/props/streaming/streamer.rs
//! Per-frame chunk load/unload decision for one detail layer.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::math::UVec2;
use bevy::prelude::*;

use crate::props::bounds::{compute_chunk_aabb, footprint_cells};
use crate::props::core::{ChunkBounds, DetailRenderer, WorldHandle};
use crate::props::instancing::pool::ChunkPool;
use crate::props::instancing::template::{InstanceBatchTemplate, TemplateParams};
use crate::terrain::chunking::{candidate_rect, chunk_count};
use crate::terrain::components::ChunkKey;
use crate::terrain::host::TerrainHost;

/// A loaded chunk.
#[derive(Clone, Debug)]
pub struct ActiveChunk<H> {
    pub handle: H,
    /// Layer-space corner.
    pub local_origin: Vec3,
    /// Relative to `local_origin`.
    pub bounds: ChunkBounds,
}

impl<H> ActiveChunk<H> {
    /// Distance from the AABB midpoint to a layer-space point.
    #[inline]
    pub fn distance_to(&self, viewer_local: Vec3) -> f32 {
        center_distance(self.local_origin, &self.bounds, viewer_local)
    }
}

#[inline]
fn center_distance(local_origin: Vec3, bounds: &ChunkBounds, viewer_local: Vec3) -> f32 {
    (local_origin + bounds.center()).distance(viewer_local)
}

/// Inputs for one streaming pass.
pub struct StreamFrame<'a> {
    pub terrain: &'a dyn TerrainHost,
    /// World position of the terrain's (0, 0) corner; chunks are placed relative to it.
    pub origin: Vec3,
    pub viewer_local: Vec3,
    pub view_distance: f32,
    pub chunk_size: f32,
    /// Layer visibility applied to newly loaded chunks.
    pub visible: bool,
    pub world: WorldHandle,
}

/// Load/unload counts of one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamReport {
    pub loaded: usize,
    pub unloaded: usize,
}

pub struct ChunkStreamer<H> {
    active: HashMap<ChunkKey, ActiveChunk<H>>,
    pool: ChunkPool<H>,
    peak_active: usize,
    /// Reused between frames for the unload pass.
    doomed: Vec<ChunkKey>,
}

impl<H: Clone + std::fmt::Debug> ChunkStreamer<H> {
    pub fn new(resolution: u32, params: TemplateParams) -> Self {
        Self {
            active: HashMap::new(),
            pool: ChunkPool::new(resolution, params),
            peak_active: 0,
            doomed: Vec::new(),
        }
    }

    /// Load chunks that came within `view_distance`, then unload the ones that left it.
    pub fn stream<R: DetailRenderer<Handle = H>>(&mut self, frame: &StreamFrame<'_>, renderer: &mut R) -> StreamReport {
        let mut report = StreamReport::default();
        let terrain = frame.terrain;

        let count = chunk_count(terrain.world_size(), frame.chunk_size);
        let rect = candidate_rect(frame.viewer_local, frame.chunk_size, frame.view_distance, count);

        // 1) Load newly visible candidates
        for key in rect.keys() {
            if self.active.contains_key(&key) {
                continue;
            }
            let local_origin = key.local_origin(frame.chunk_size);
            let bounds = compute_chunk_aabb(terrain, local_origin, frame.chunk_size);
            if center_distance(local_origin, &bounds, frame.viewer_local) >= frame.view_distance {
                continue;
            }

            let handle = self.pool.acquire(renderer);
            renderer.assign_key(&handle, Some(key));
            renderer.set_world(&handle, frame.world);
            renderer.set_transform(&handle, Transform::from_translation(frame.origin + local_origin));
            renderer.set_bounds(&handle, bounds);
            renderer.set_visible(&handle, frame.visible);

            self.active.insert(key, ActiveChunk { handle, local_origin, bounds });
            report.loaded += 1;
        }
        self.peak_active = self.peak_active.max(self.active.len());

        // 2) Mark out-of-range chunks, then unload after the scan
        self.doomed.clear();
        self.doomed.extend(
            self.active
                .iter()
                .filter(|(_, c)| c.distance_to(frame.viewer_local) > frame.view_distance)
                .map(|(k, _)| *k),
        );
        for key in self.doomed.drain(..) {
            if let Some(chunk) = self.active.remove(&key) {
                self.pool.release(chunk.handle, renderer);
                report.unloaded += 1;
            }
        }

        if report.loaded > 0 || report.unloaded > 0 {
            debug!(
                "details: +{} / -{} chunks (active {}, pooled {})",
                report.loaded,
                report.unloaded,
                self.active.len(),
                self.pool.pooled_count()
            );
        }
        report
    }

    /// Move every active chunk after the terrain moved.
    pub fn reposition<R: DetailRenderer<Handle = H>>(&self, terrain_origin: Vec3, renderer: &mut R) {
        for chunk in self.active.values() {
            renderer.set_transform(&chunk.handle, Transform::from_translation(terrain_origin + chunk.local_origin));
        }
    }

    /// Recompute bounds of active chunks overlapping the edited cells `[min, max)`.
    /// Returns how many chunks were refreshed.
    pub fn refresh_bounds<R: DetailRenderer<Handle = H>>(
        &mut self,
        terrain: &dyn TerrainHost,
        chunk_size: f32,
        min_cell: UVec2,
        max_cell: UVec2,
        renderer: &mut R,
    ) -> usize {
        let mut refreshed = 0;
        for chunk in self.active.values_mut() {
            let (lo, hi) = footprint_cells(
                Vec2::new(chunk.local_origin.x, chunk.local_origin.z),
                chunk_size,
                terrain.horizontal_scale(),
                terrain.resolution(),
            );
            let overlaps = lo.x < max_cell.x && min_cell.x < hi.x && lo.y < max_cell.y && min_cell.y < hi.y;
            if !overlaps {
                continue;
            }
            chunk.bounds = compute_chunk_aabb(terrain, chunk.local_origin, chunk_size);
            renderer.set_bounds(&chunk.handle, chunk.bounds);
            refreshed += 1;
        }
        refreshed
    }

    /// Show or hide active chunks; pooled handles stay hidden.
    pub fn set_visible<R: DetailRenderer<Handle = H>>(&self, visible: bool, renderer: &mut R) {
        for chunk in self.active.values() {
            renderer.set_visible(&chunk.handle, visible);
        }
    }

    /// Move active and pooled handles to another world.
    pub fn set_world<R: DetailRenderer<Handle = H>>(&self, world: WorldHandle, renderer: &mut R) {
        for chunk in self.active.values() {
            renderer.set_world(&chunk.handle, world);
        }
        for handle in self.pool.pooled() {
            renderer.set_world(handle, world);
        }
    }

    /// Rebuild the template with new parameters and rebind every handle.
    pub fn replace_template<R: DetailRenderer<Handle = H>>(
        &mut self,
        resolution: u32,
        params: TemplateParams,
        renderer: &mut R,
    ) -> Option<Arc<InstanceBatchTemplate>> {
        let template = self.pool.replace_template(resolution, params, renderer)?;
        for chunk in self.active.values() {
            renderer.rebind_template(&chunk.handle, &template);
        }
        Some(template)
    }

    /// Return every active chunk to the pool.
    pub fn unload_all<R: DetailRenderer<Handle = H>>(&mut self, renderer: &mut R) -> usize {
        let n = self.active.len();
        for (_, chunk) in self.active.drain() {
            self.pool.release(chunk.handle, renderer);
        }
        n
    }

    pub fn active(&self) -> &HashMap<ChunkKey, ActiveChunk<H>> {
        &self.active
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn pooled_count(&self) -> usize {
        self.pool.pooled_count()
    }

    pub fn constructed_count(&self) -> usize {
        self.pool.constructed()
    }

    pub fn peak_active(&self) -> usize {
        self.peak_active
    }

    pub fn pool(&self) -> &ChunkPool<H> {
        &self.pool
    }
}
