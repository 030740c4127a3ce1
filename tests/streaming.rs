use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use chasma_details::props::bounds::compute_chunk_aabb;
use chasma_details::props::instancing::{InstanceBatchTemplate, TemplateParams};
use chasma_details::props::params::DetailMaterialParams;
use chasma_details::props::streaming::StreamReport;
use chasma_details::terrain::systems::rolling_hills;
use chasma_details::{
    ChunkBounds, ChunkKey, DetailLayer, DetailRenderer, HeightmapData, MapChannel, TerrainHost, WorldHandle,
};

#[derive(Clone)]
struct Chunk {
    key: Option<ChunkKey>,
    translation: Vec3,
    bounds: Option<ChunkBounds>,
    visible: bool,
}

#[derive(Default)]
struct Recorder {
    chunks: HashMap<usize, Chunk>,
    phase: Vec<f32>,
}

impl Recorder {
    fn visible_keys(&self) -> BTreeSet<ChunkKey> {
        self.chunks.values().filter(|c| c.visible).filter_map(|c| c.key).collect()
    }
}

impl DetailRenderer for Recorder {
    type Handle = usize;

    fn create_chunk(&mut self, _template: &Arc<InstanceBatchTemplate>) -> usize {
        let id = self.chunks.len();
        self.chunks.insert(id, Chunk { key: None, translation: Vec3::ZERO, bounds: None, visible: false });
        id
    }

    fn rebind_template(&mut self, _handle: &usize, _template: &Arc<InstanceBatchTemplate>) {}

    fn assign_key(&mut self, handle: &usize, key: Option<ChunkKey>) {
        self.chunks.get_mut(handle).unwrap().key = key;
    }

    fn set_transform(&mut self, handle: &usize, transform: Transform) {
        self.chunks.get_mut(handle).unwrap().translation = transform.translation;
    }

    fn set_bounds(&mut self, handle: &usize, bounds: ChunkBounds) {
        self.chunks.get_mut(handle).unwrap().bounds = Some(bounds);
    }

    fn set_visible(&mut self, handle: &usize, visible: bool) {
        self.chunks.get_mut(handle).unwrap().visible = visible;
    }

    fn set_world(&mut self, _handle: &usize, _world: WorldHandle) {}

    fn update_material(&mut self, params: &DetailMaterialParams) {
        self.phase.push(params.wind.phase);
    }
}

fn layer(view_distance: f32) -> DetailLayer<usize> {
    let mut layer = DetailLayer::new("grass", 32, TemplateParams { density: 1.0, ..default() });
    layer.set_view_distance(view_distance);
    layer
}

/// Every chunk whose AABB midpoint is strictly inside the view distance.
fn expected_keys(terrain: &dyn TerrainHost, viewer_local: Vec3, view_distance: f32) -> BTreeSet<ChunkKey> {
    let count = (terrain.world_size().x / 32.0).ceil() as i32;
    let mut keys = BTreeSet::new();
    for cz in 0..count {
        for cx in 0..count {
            let key = ChunkKey::new(cx, cz);
            let origin = key.local_origin(32.0);
            let bounds = compute_chunk_aabb(terrain, origin, 32.0);
            if (origin + bounds.center()).distance(viewer_local) < view_distance {
                keys.insert(key);
            }
        }
    }
    keys
}

#[test]
fn ring_around_map_center() {
    let terrain = Arc::new(HeightmapData::flat(256, 0.0));
    let mut layer = layer(100.0);
    let mut r = Recorder::default();
    layer.attach(terrain.clone(), &mut r);

    let viewer = Vec3::new(128.0, 0.0, 128.0);
    let report = layer.advance(0.016, viewer, &mut r).unwrap();

    assert_eq!(report, StreamReport { loaded: 32, unloaded: 0 });
    let active: BTreeSet<ChunkKey> = layer.active_keys().into_iter().collect();
    assert_eq!(active, expected_keys(&*terrain, viewer, 100.0));
    assert_eq!(r.visible_keys(), active);
    assert_eq!(layer.constructed_count(), 32);

    // Second pass at the same spot does nothing
    let again = layer.advance(0.0, viewer, &mut r).unwrap();
    assert_eq!(again, StreamReport::default());
    assert_eq!(layer.active_count(), 32);
}

#[test]
fn viewer_at_corner_sees_clipped_ring() {
    let terrain = Arc::new(HeightmapData::flat(256, 0.0));
    let mut layer = layer(100.0);
    let mut r = Recorder::default();
    layer.attach(terrain.clone(), &mut r);

    layer.advance(0.0, Vec3::ZERO, &mut r).unwrap();
    let active: BTreeSet<ChunkKey> = layer.active_keys().into_iter().collect();
    assert_eq!(active, expected_keys(&*terrain, Vec3::ZERO, 100.0));
    // (2, 2) has its center at ~113 units, just outside
    assert_eq!(active.len(), 8);
    assert!(active.iter().all(|k| k.cx < 3 && k.cz < 3));
    assert!(!active.contains(&ChunkKey::new(2, 2)));
}

#[test]
fn long_jump_swaps_to_disjoint_set() {
    let terrain = Arc::new(HeightmapData::flat(2048, 0.0));
    let mut layer = layer(50.0);
    let mut r = Recorder::default();
    layer.attach(terrain.clone(), &mut r);

    layer.advance(0.0, Vec3::ZERO, &mut r).unwrap();
    let before: BTreeSet<ChunkKey> = layer.active_keys().into_iter().collect();
    assert!(!before.is_empty());

    let far = Vec3::new(1000.0, 0.0, 0.0);
    let report = layer.advance(0.0, far, &mut r).unwrap();
    let after: BTreeSet<ChunkKey> = layer.active_keys().into_iter().collect();

    assert_eq!(report.unloaded, before.len());
    assert_eq!(report.loaded, after.len());
    assert!(before.is_disjoint(&after));
    assert_eq!(after, expected_keys(&*terrain, far, 50.0));
    assert_eq!(layer.pooled_count(), before.len());
    assert_eq!(layer.constructed_count(), layer.active_count() + layer.pooled_count());
}

#[test]
fn chunk_transforms_follow_terrain_origin() {
    let origin = Vec3::new(-128.0, 3.0, -128.0);
    let terrain = Arc::new(HeightmapData::flat(256, 0.0).with_origin(origin));
    let mut layer = layer(100.0);
    let mut r = Recorder::default();
    layer.attach(terrain, &mut r);

    // World (0,0,0) is the map center in layer space.
    layer.advance(0.0, Vec3::new(0.0, 3.0, 0.0), &mut r).unwrap();
    assert_eq!(layer.active_count(), 32);
    for chunk in r.chunks.values() {
        let key = chunk.key.unwrap();
        assert_eq!(chunk.translation, origin + key.local_origin(32.0));
        let bounds = chunk.bounds.unwrap();
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, Vec3::new(32.0, 0.0, 32.0));
    }
}

#[test]
fn streaming_follows_a_moved_terrain() {
    let terrain = Arc::new(HeightmapData::flat(256, 0.0));
    let mut layer = layer(60.0);
    let mut r = Recorder::default();
    layer.attach(terrain.clone(), &mut r);
    layer.advance(0.0, Vec3::new(16.0, 0.0, 16.0), &mut r).unwrap();

    let moved = Vec3::new(100.0, 0.0, 0.0);
    layer.on_terrain_transform_changed(Transform::from_translation(moved), &mut r);

    let mut rng = ChaCha8Rng::seed_from_u64(5);
    for _ in 0..40 {
        let viewer = moved + Vec3::new(rng.random_range(0.0..256.0), 0.0, rng.random_range(0.0..256.0));
        layer.advance(0.0, viewer, &mut r).unwrap();

        let active: BTreeSet<ChunkKey> = layer.active_keys().into_iter().collect();
        assert_eq!(active, expected_keys(&*terrain, viewer - moved, 60.0));
        for chunk in r.chunks.values().filter(|c| c.key.is_some()) {
            assert_eq!(chunk.translation, moved + chunk.key.unwrap().local_origin(32.0));
        }
    }
}

#[test]
fn big_jump_loads_before_unloading() {
    let terrain = Arc::new(HeightmapData::flat(256, 0.0));
    let mut layer = layer(40.0);
    let mut r = Recorder::default();
    layer.attach(terrain, &mut r);

    let near = Vec3::new(16.0, 0.0, 16.0);
    let far = Vec3::new(240.0, 0.0, 240.0);

    let first = layer.advance(0.0, near, &mut r).unwrap();
    assert_eq!(first, StreamReport { loaded: 3, unloaded: 0 });

    let jump = layer.advance(0.0, far, &mut r).unwrap();
    assert_eq!(jump, StreamReport { loaded: 3, unloaded: 3 });
    // New chunks were acquired before the old ones were released
    assert_eq!(layer.constructed_count(), 6);
    assert_eq!(layer.peak_active(), 6);
    assert_eq!(layer.pooled_count(), 3);
    assert_eq!(
        r.visible_keys(),
        [ChunkKey::new(6, 7), ChunkKey::new(7, 6), ChunkKey::new(7, 7)].into_iter().collect()
    );

    // Coming back reuses the pool
    layer.advance(0.0, near, &mut r).unwrap();
    assert_eq!(layer.constructed_count(), 6);
    assert_eq!(layer.active_count(), 3);
    assert_eq!(layer.pooled_count(), 3);
}

#[test]
fn random_walk_keeps_exact_set_and_pool_peak() {
    let terrain = Arc::new(
        rolling_hills(256)
            .with_height_scale(20.0)
            .with_cell_size(Vec2::splat(1.5)),
    );
    let mut layer = layer(75.0);
    let mut r = Recorder::default();
    layer.attach(terrain.clone(), &mut r);

    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let extent = terrain.world_size().x;
    let mut viewer = Vec3::new(extent * 0.5, 10.0, extent * 0.5);
    for step in 0..200 {
        // mostly small steps with the occasional teleport
        if step % 37 == 0 {
            viewer.x = rng.random_range(-20.0..extent + 20.0);
            viewer.z = rng.random_range(-20.0..extent + 20.0);
        } else {
            viewer.x += rng.random_range(-12.0..12.0);
            viewer.z += rng.random_range(-12.0..12.0);
        }
        viewer.y = rng.random_range(0.0..30.0);

        layer.advance(0.016, viewer, &mut r).unwrap();

        let active: BTreeSet<ChunkKey> = layer.active_keys().into_iter().collect();
        assert_eq!(active, expected_keys(&*terrain, viewer, 75.0), "step {step}");
        assert_eq!(r.visible_keys(), active, "step {step}");
        assert_eq!(layer.constructed_count(), layer.peak_active(), "step {step}");
        assert_eq!(layer.constructed_count(), layer.active_count() + layer.pooled_count());
    }
}

#[test]
fn wind_phase_is_associative_across_frames() {
    let terrain = Arc::new(HeightmapData::flat(64, 0.0).with_wind_strength(0.6));
    let mut a = layer(50.0);
    let mut b = layer(50.0);
    let (mut ra, mut rb) = (Recorder::default(), Recorder::default());
    a.attach(terrain.clone(), &mut ra);
    b.attach(terrain, &mut rb);

    a.advance(0.3, Vec3::ZERO, &mut ra).unwrap();
    a.advance(0.2, Vec3::ZERO, &mut ra).unwrap();
    b.advance(0.5, Vec3::ZERO, &mut rb).unwrap();

    let pa = *ra.phase.last().unwrap();
    let pb = *rb.phase.last().unwrap();
    assert!((pa - pb).abs() < 1e-5);
    assert!((pb - 0.5 * (1.0 + 3.0 * 0.6)).abs() < 1e-5);
}

/// Terrain whose heights can change while layers hold it.
struct EditableTerrain(RwLock<HeightmapData>);

impl TerrainHost for EditableTerrain {
    fn origin(&self) -> Vec3 {
        self.0.read().unwrap().origin()
    }
    fn internal_transform(&self) -> Transform {
        self.0.read().unwrap().internal_transform()
    }
    fn horizontal_scale(&self) -> Vec2 {
        self.0.read().unwrap().horizontal_scale()
    }
    fn vertical_scale(&self) -> f32 {
        self.0.read().unwrap().vertical_scale()
    }
    fn elevation_range(&self, min: UVec2, max: UVec2) -> Option<(f32, f32)> {
        self.0.read().unwrap().elevation_range(min, max)
    }
    fn resolution(&self) -> u32 {
        self.0.read().unwrap().resolution()
    }
    fn map_count(&self, channel: MapChannel) -> usize {
        self.0.read().unwrap().map_count(channel)
    }
    fn texture(&self, channel: MapChannel, index: usize) -> Option<Handle<Image>> {
        self.0.read().unwrap().texture(channel, index)
    }
}

#[test]
fn edited_region_refreshes_only_overlapping_bounds() {
    let terrain = Arc::new(EditableTerrain(RwLock::new(HeightmapData::flat(128, 0.0))));
    let mut layer = layer(60.0);
    let mut r = Recorder::default();
    layer.attach(terrain.clone(), &mut r);
    layer.advance(0.0, Vec3::new(16.0, 0.0, 16.0), &mut r).unwrap();
    assert!(layer.active_keys().contains(&ChunkKey::new(0, 0)));

    let (min, max) = terrain
        .0
        .write()
        .unwrap()
        .edit_region(UVec2::new(4, 4), UVec2::new(8, 8), |_, _, _| 10.0)
        .unwrap();
    let refreshed = layer.on_heightmap_region_changed(min, max, &mut r);
    assert_eq!(refreshed, 1);

    let edited = r.chunks.values().find(|c| c.key == Some(ChunkKey::new(0, 0))).unwrap();
    assert_eq!(edited.bounds.unwrap().max.y, 10.0);
    let untouched = r.chunks.values().find(|c| c.key == Some(ChunkKey::new(1, 0))).unwrap();
    assert_eq!(untouched.bounds.unwrap().max.y, 0.0);
}
