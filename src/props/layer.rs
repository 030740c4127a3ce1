// src/props/layer.rs
//! One texture-driven scatter layer: the host-facing API around the streamer.

use std::sync::Arc;

use bevy::math::UVec2;
use bevy::prelude::*;

use crate::props::core::{DetailRenderer, WorldHandle};
use crate::props::error::DetailError;
use crate::props::instancing::template::TemplateParams;
use crate::props::params::{DetailMaterialParams, ShaderParamValue, ShaderParams};
use crate::props::registry::DetailLayerDef;
use crate::props::streaming::{ChunkStreamer, StreamFrame, StreamReport};
use crate::props::wind::WindPhaseClock;
use crate::terrain::components::ChunkKey;
use crate::terrain::host::{MapChannel, TerrainHost};

/// Degradations already reported, so the frame loop doesn't spam the log.
#[derive(Default)]
struct Warned {
    missing_host: bool,
    missing_data: bool,
    layer_index: bool,
}

pub struct DetailLayer<H> {
    name: String,
    /// Which detail map of the terrain this layer reads.
    layer_index: usize,
    view_distance: f32,
    /// World units per chunk side; also the template resolution.
    chunk_size: u32,
    albedo_texture: Option<Handle<Image>>,
    custom_params: ShaderParams,
    terrain: Option<Arc<dyn TerrainHost>>,
    /// Terrain translation reported by the host since attach; wins over `terrain.origin()`.
    moved_origin: Option<Vec3>,
    streamer: ChunkStreamer<H>,
    wind: WindPhaseClock,
    visible: bool,
    world: WorldHandle,
    warned: Warned,
}

impl<H: Clone + std::fmt::Debug> DetailLayer<H> {
    pub fn new(name: impl Into<String>, chunk_size: u32, template: TemplateParams) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            name: name.into(),
            layer_index: 0,
            view_distance: 100.0,
            chunk_size,
            albedo_texture: None,
            custom_params: ShaderParams::default(),
            terrain: None,
            moved_origin: None,
            streamer: ChunkStreamer::new(chunk_size, template),
            wind: WindPhaseClock::new(),
            visible: true,
            world: WorldHandle::default(),
            warned: Warned::default(),
        }
    }

    /// Build from a settings entry; `albedo` is the already-loaded texture if any.
    pub fn from_def(def: &DetailLayerDef, albedo: Option<Handle<Image>>) -> Result<Self, DetailError> {
        let mut layer = Self::new(def.name.clone(), def.chunk_size, def.template.clone());
        layer.layer_index = def.layer_index;
        layer.set_view_distance(def.view_distance);
        layer.albedo_texture = albedo;
        for (name, value) in &def.custom_params {
            layer.custom_params.set(name, value.clone())?;
        }
        Ok(layer)
    }

    // ---------- Lifecycle ----------

    /// Start decorating `terrain`. Chunks of a previous terrain go back to the pool.
    pub fn attach<R: DetailRenderer<Handle = H>>(&mut self, terrain: Arc<dyn TerrainHost>, renderer: &mut R) {
        self.streamer.unload_all(renderer);
        self.terrain = Some(terrain);
        self.moved_origin = None;
        self.warned = Warned::default();
        info!("details: layer '{}' attached", self.name);
    }

    /// Stop decorating; every chunk is pooled and the terrain handed back.
    pub fn detach<R: DetailRenderer<Handle = H>>(&mut self, renderer: &mut R) -> Option<Arc<dyn TerrainHost>> {
        let unloaded = self.streamer.unload_all(renderer);
        let terrain = self.terrain.take();
        self.moved_origin = None;
        if terrain.is_some() {
            info!("details: layer '{}' detached ({} chunks pooled)", self.name, unloaded);
        }
        terrain
    }

    pub fn is_attached(&self) -> bool {
        self.terrain.is_some()
    }

    // ---------- Frame ----------

    /// Per-frame update: push material params, then stream chunks around `viewer_world`.
    ///
    /// Every error is non-fatal; the layer just doesn't change this frame.
    pub fn advance<R: DetailRenderer<Handle = H>>(
        &mut self,
        dt: f32,
        viewer_world: Vec3,
        renderer: &mut R,
    ) -> Result<StreamReport, DetailError> {
        let Some(terrain) = self.terrain.clone() else {
            if !self.warned.missing_host {
                self.warned.missing_host = true;
                warn!("details: layer '{}': {}", self.name, DetailError::MissingHost);
            }
            return Err(DetailError::MissingHost);
        };
        if !terrain.has_data() {
            if !self.warned.missing_data {
                self.warned.missing_data = true;
                warn!("details: layer '{}': {}", self.name, DetailError::MissingData);
            }
            return Err(DetailError::MissingData);
        }
        self.warned.missing_data = false;

        // Material first, so wind keeps moving while terrain data is locked.
        let params = self.material_params(&*terrain, dt);
        renderer.update_material(&params);

        if terrain.is_data_locked() {
            debug!("details: layer '{}': {}", self.name, DetailError::DataLocked);
            return Err(DetailError::DataLocked);
        }

        let origin = self.terrain_origin(&*terrain);
        let frame = StreamFrame {
            terrain: &*terrain,
            origin,
            viewer_local: viewer_world - origin,
            view_distance: self.view_distance,
            chunk_size: self.chunk_size as f32,
            visible: self.visible,
            world: self.world,
        };
        Ok(self.streamer.stream(&frame, renderer))
    }

    /// Where the terrain's (0, 0) corner currently is in world space.
    fn terrain_origin(&self, terrain: &dyn TerrainHost) -> Vec3 {
        self.moved_origin.unwrap_or_else(|| terrain.origin())
    }

    fn material_params(&mut self, terrain: &dyn TerrainHost, dt: f32) -> DetailMaterialParams {
        let wind = self.wind.advance(dt, terrain.wind_strength());
        let detail_map = match resolve_detail_map(terrain, self.layer_index) {
            Ok(map) => {
                self.warned.layer_index = false;
                map
            }
            Err(e) => {
                if !self.warned.layer_index {
                    self.warned.layer_index = true;
                    warn!("details: layer '{}': {}", self.name, e);
                }
                None
            }
        };

        let mut terrain_transform = terrain.internal_transform();
        terrain_transform.translation = self.terrain_origin(terrain);

        DetailMaterialParams {
            albedo_texture: self.albedo_texture.clone(),
            detail_map,
            height_map: terrain.texture(MapChannel::Height, 0),
            terrain_transform,
            terrain_resolution: terrain.resolution(),
            view_distance: self.view_distance,
            chunk_size: self.chunk_size as f32,
            wind,
            custom: self.custom_params.clone(),
        }
    }

    // ---------- Host notifications ----------

    /// The terrain moved; `transform.translation` is the new world position of
    /// its (0, 0) corner. Active chunks follow now, later loads and the viewer
    /// mapping use it from the next `advance` on.
    pub fn on_terrain_transform_changed<R: DetailRenderer<Handle = H>>(&mut self, transform: Transform, renderer: &mut R) {
        self.moved_origin = Some(transform.translation);
        self.streamer.reposition(transform.translation, renderer);
    }

    /// Heights in cells `[min, max)` changed; refresh bounds of affected chunks.
    pub fn on_heightmap_region_changed<R: DetailRenderer<Handle = H>>(
        &mut self,
        min: UVec2,
        max: UVec2,
        renderer: &mut R,
    ) -> usize {
        let Some(terrain) = self.terrain.clone() else { return 0 };
        self.streamer.refresh_bounds(&*terrain, self.chunk_size as f32, min, max, renderer)
    }

    pub fn on_visibility_changed<R: DetailRenderer<Handle = H>>(&mut self, visible: bool, renderer: &mut R) {
        self.visible = visible;
        self.streamer.set_visible(visible, renderer);
    }

    pub fn on_world_changed<R: DetailRenderer<Handle = H>>(&mut self, world: WorldHandle, renderer: &mut R) {
        self.world = world;
        self.streamer.set_world(world, renderer);
    }

    // ---------- Setters ----------

    pub fn set_view_distance(&mut self, view_distance: f32) {
        self.view_distance = view_distance.max(0.0);
    }

    pub fn set_layer_index(&mut self, index: usize) {
        self.layer_index = index;
        self.warned.layer_index = false;
    }

    pub fn set_texture(&mut self, texture: Option<Handle<Image>>) {
        self.albedo_texture = texture;
    }

    pub fn set_custom_shader_param(&mut self, name: &str, value: ShaderParamValue) -> Result<(), DetailError> {
        self.custom_params.set(name, value)
    }

    pub fn remove_custom_shader_param(&mut self, name: &str) -> Option<ShaderParamValue> {
        self.custom_params.remove(name)
    }

    /// New template parameters; an existing template is rebuilt and every handle rebound.
    pub fn set_template_params<R: DetailRenderer<Handle = H>>(&mut self, params: TemplateParams, renderer: &mut R) {
        if self.streamer.replace_template(self.chunk_size, params, renderer).is_some() {
            debug!("details: layer '{}' template regenerated", self.name);
        }
    }

    // ---------- Inspection ----------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer_index(&self) -> usize {
        self.layer_index
    }

    pub fn view_distance(&self) -> f32 {
        self.view_distance
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn world(&self) -> WorldHandle {
        self.world
    }

    pub fn wind_phase(&self) -> f32 {
        self.wind.phase()
    }

    pub fn custom_params(&self) -> &ShaderParams {
        &self.custom_params
    }

    pub fn template_params(&self) -> &TemplateParams {
        self.streamer.pool().template_params()
    }

    pub fn active_keys(&self) -> Vec<ChunkKey> {
        let mut keys: Vec<ChunkKey> = self.streamer.active().keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn active_count(&self) -> usize {
        self.streamer.active_count()
    }

    pub fn pooled_count(&self) -> usize {
        self.streamer.pooled_count()
    }

    pub fn constructed_count(&self) -> usize {
        self.streamer.constructed_count()
    }

    pub fn peak_active(&self) -> usize {
        self.streamer.peak_active()
    }

    pub fn streamer(&self) -> &ChunkStreamer<H> {
        &self.streamer
    }
}

/// Detail map for `index`, or why there is none.
pub fn resolve_detail_map(terrain: &dyn TerrainHost, index: usize) -> Result<Option<Handle<Image>>, DetailError> {
    let available = terrain.map_count(MapChannel::Detail);
    if index >= available {
        return Err(DetailError::LayerIndexOutOfRange { index, available });
    }
    Ok(terrain.texture(MapChannel::Detail, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightmap_data::HeightmapData;
    use crate::props::testing::RecordingRenderer;

    fn layer() -> DetailLayer<u32> {
        let mut layer = DetailLayer::new("grass", 32, TemplateParams { density: 1.0, ..default() });
        layer.set_view_distance(60.0);
        layer
    }

    fn terrain() -> Arc<HeightmapData> {
        Arc::new(HeightmapData::flat(256, 0.0).with_detail_maps(vec![Handle::default()]))
    }

    #[test]
    fn unattached_layer_is_a_noop() {
        let mut layer = layer();
        let mut r = RecordingRenderer::default();
        assert_eq!(layer.advance(0.1, Vec3::ZERO, &mut r), Err(DetailError::MissingHost));
        assert_eq!(layer.advance(0.1, Vec3::ZERO, &mut r), Err(DetailError::MissingHost));
        assert_eq!(r.created, 0);
        assert_eq!(r.material_updates, 0);
    }

    #[test]
    fn empty_terrain_is_a_noop() {
        let mut layer = layer();
        let mut r = RecordingRenderer::default();
        layer.attach(Arc::new(HeightmapData::flat(0, 0.0)), &mut r);
        assert_eq!(layer.advance(0.1, Vec3::ZERO, &mut r), Err(DetailError::MissingData));
        assert_eq!(r.created, 0);
    }

    #[test]
    fn locked_terrain_defers_streaming_but_keeps_wind() {
        let t = terrain();
        t.set_wind_strength(0.5);
        let mut layer = layer();
        let mut r = RecordingRenderer::default();
        layer.attach(t.clone(), &mut r);

        t.lock_data();
        assert_eq!(layer.advance(1.0, Vec3::new(64.0, 0.0, 64.0), &mut r), Err(DetailError::DataLocked));
        assert_eq!(layer.active_count(), 0);
        assert!((layer.wind_phase() - 2.5).abs() < 1e-6);
        assert_eq!(r.material_updates, 1);

        t.unlock_data();
        let report = layer.advance(0.0, Vec3::new(64.0, 0.0, 64.0), &mut r).unwrap();
        assert!(report.loaded > 0);
        assert_eq!(layer.active_count(), report.loaded);
    }

    #[test]
    fn material_params_carry_wind_maps_and_custom_values() {
        let t = terrain();
        t.set_wind_strength(1.0);
        let mut layer = layer();
        let mut r = RecordingRenderer::default();
        layer.attach(t, &mut r);
        layer.set_custom_shader_param("bottom_shade", ShaderParamValue::Float(0.3)).unwrap();

        layer.advance(0.5, Vec3::ZERO, &mut r).unwrap();
        let m = r.material.clone().unwrap();
        assert_eq!(m.ambient_wind(), Vec2::new(1.0, 2.0));
        assert!(m.detail_map.is_some());
        assert_eq!(m.view_distance, 60.0);
        assert_eq!(m.chunk_size, 32.0);
        assert_eq!(m.custom.get("bottom_shade"), Some(&ShaderParamValue::Float(0.3)));
    }

    #[test]
    fn out_of_range_layer_index_renders_without_map() {
        let mut layer = layer();
        let mut r = RecordingRenderer::default();
        layer.attach(terrain(), &mut r);
        layer.set_layer_index(3);

        let report = layer.advance(0.1, Vec3::new(16.0, 0.0, 16.0), &mut r).unwrap();
        assert!(report.loaded > 0);
        assert!(r.material.as_ref().unwrap().detail_map.is_none());
        assert_eq!(
            resolve_detail_map(&*terrain(), 3),
            Err(DetailError::LayerIndexOutOfRange { index: 3, available: 1 })
        );
    }

    #[test]
    fn reserved_custom_param_is_refused() {
        let mut layer = layer();
        assert_eq!(
            layer.set_custom_shader_param("view_distance", ShaderParamValue::Float(1.0)),
            Err(DetailError::ReservedParam("view_distance".into()))
        );
        assert!(layer.custom_params().is_empty());
    }

    #[test]
    fn visibility_only_shows_active_chunks() {
        let mut layer = layer();
        let mut r = RecordingRenderer::default();
        layer.attach(terrain(), &mut r);
        layer.advance(0.0, Vec3::new(16.0, 0.0, 16.0), &mut r).unwrap();
        layer.advance(0.0, Vec3::new(240.0, 0.0, 240.0), &mut r).unwrap();
        assert!(layer.pooled_count() > 0);

        layer.on_visibility_changed(false, &mut r);
        assert!(r.visible_keys().is_empty());

        layer.on_visibility_changed(true, &mut r);
        assert_eq!(r.visible_keys(), layer.active_keys());
    }

    #[test]
    fn hidden_layer_loads_hidden_chunks() {
        let mut layer = layer();
        let mut r = RecordingRenderer::default();
        layer.attach(terrain(), &mut r);
        layer.on_visibility_changed(false, &mut r);
        layer.advance(0.0, Vec3::new(64.0, 0.0, 64.0), &mut r).unwrap();
        assert!(layer.active_count() > 0);
        assert!(r.visible_keys().is_empty());
    }

    #[test]
    fn terrain_move_translates_active_chunks() {
        let mut layer = layer();
        let mut r = RecordingRenderer::default();
        layer.attach(terrain(), &mut r);
        layer.advance(0.0, Vec3::new(16.0, 0.0, 16.0), &mut r).unwrap();

        let offset = Vec3::new(100.0, 5.0, -50.0);
        layer.on_terrain_transform_changed(Transform::from_translation(offset), &mut r);
        for (key, chunk) in layer.streamer().active() {
            let expected = offset + key.local_origin(32.0);
            assert_eq!(r.chunks[&chunk.handle].transform.translation, expected);
        }
    }

    #[test]
    fn chunks_loaded_after_a_move_land_on_the_moved_terrain() {
        let mut layer = layer();
        let mut r = RecordingRenderer::default();
        layer.attach(terrain(), &mut r);
        layer.advance(0.0, Vec3::new(16.0, 0.0, 16.0), &mut r).unwrap();

        let moved = Vec3::new(100.0, 0.0, 0.0);
        layer.on_terrain_transform_changed(Transform::from_translation(moved), &mut r);
        // 180 units into the moved terrain: chunks 4..=6 are new this frame
        layer.advance(0.0, Vec3::new(280.0, 0.0, 16.0), &mut r).unwrap();

        for cx in 4..=6 {
            let chunk = &layer.streamer().active()[&ChunkKey::new(cx, 0)];
            let expected = Vec3::new(100.0 + 32.0 * cx as f32, 0.0, 0.0);
            assert_eq!(r.chunks[&chunk.handle].transform.translation, expected);
        }
        for (key, chunk) in layer.streamer().active() {
            assert_eq!(r.chunks[&chunk.handle].transform.translation, moved + key.local_origin(32.0));
        }
        assert_eq!(r.material.as_ref().unwrap().terrain_transform.translation, moved);
    }

    #[test]
    fn reattach_forgets_the_moved_origin() {
        let mut layer = layer();
        let mut r = RecordingRenderer::default();
        layer.attach(terrain(), &mut r);
        layer.on_terrain_transform_changed(Transform::from_translation(Vec3::splat(50.0)), &mut r);
        layer.attach(terrain(), &mut r);

        layer.advance(0.0, Vec3::new(16.0, 0.0, 16.0), &mut r).unwrap();
        let chunk = &layer.streamer().active()[&ChunkKey::new(0, 0)];
        assert_eq!(r.chunks[&chunk.handle].transform.translation, Vec3::ZERO);
    }

    #[test]
    fn detach_pools_everything_and_returns_host() {
        let mut layer = layer();
        let mut r = RecordingRenderer::default();
        layer.attach(terrain(), &mut r);
        layer.advance(0.0, Vec3::new(64.0, 0.0, 64.0), &mut r).unwrap();
        let active = layer.active_count();

        assert!(layer.detach(&mut r).is_some());
        assert!(!layer.is_attached());
        assert_eq!(layer.active_count(), 0);
        assert_eq!(layer.pooled_count(), active);
        assert!(r.visible_keys().is_empty());
        assert!(layer.detach(&mut r).is_none());
    }

    #[test]
    fn template_change_rebinds_all_handles() {
        let mut layer = layer();
        let mut r = RecordingRenderer::default();
        layer.attach(terrain(), &mut r);
        layer.advance(0.0, Vec3::new(64.0, 0.0, 64.0), &mut r).unwrap();

        layer.set_template_params(TemplateParams { density: 2.0, ..default() }, &mut r);
        assert_eq!(layer.template_params().density, 2.0);
        assert!(r.chunks.values().all(|c| c.template.len() == 32 * 32 * 2));
    }
}
