// src/props/testing.rs
//! Renderer double for unit tests: records the last state pushed per handle.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::*;

use crate::props::core::{ChunkBounds, DetailRenderer, WorldHandle};
use crate::props::instancing::template::InstanceBatchTemplate;
use crate::props::params::DetailMaterialParams;
use crate::terrain::components::ChunkKey;

#[derive(Clone, Debug)]
pub struct RecordedChunk {
    pub template: Arc<InstanceBatchTemplate>,
    pub key: Option<ChunkKey>,
    pub transform: Transform,
    pub bounds: Option<ChunkBounds>,
    pub visible: bool,
    pub world: WorldHandle,
}

#[derive(Default)]
pub struct RecordingRenderer {
    pub chunks: HashMap<u32, RecordedChunk>,
    pub created: usize,
    pub material: Option<DetailMaterialParams>,
    pub material_updates: usize,
}

impl RecordingRenderer {
    pub fn visible_keys(&self) -> Vec<ChunkKey> {
        let mut keys: Vec<ChunkKey> = self
            .chunks
            .values()
            .filter(|c| c.visible)
            .filter_map(|c| c.key)
            .collect();
        keys.sort();
        keys
    }
}

impl DetailRenderer for RecordingRenderer {
    type Handle = u32;

    fn create_chunk(&mut self, template: &Arc<InstanceBatchTemplate>) -> u32 {
        let id = self.created as u32;
        self.created += 1;
        self.chunks.insert(
            id,
            RecordedChunk {
                template: Arc::clone(template),
                key: None,
                transform: Transform::IDENTITY,
                bounds: None,
                visible: false,
                world: WorldHandle::default(),
            },
        );
        id
    }

    fn rebind_template(&mut self, handle: &u32, template: &Arc<InstanceBatchTemplate>) {
        if let Some(c) = self.chunks.get_mut(handle) {
            c.template = Arc::clone(template);
        }
    }

    fn assign_key(&mut self, handle: &u32, key: Option<ChunkKey>) {
        if let Some(c) = self.chunks.get_mut(handle) {
            c.key = key;
        }
    }

    fn set_transform(&mut self, handle: &u32, transform: Transform) {
        if let Some(c) = self.chunks.get_mut(handle) {
            c.transform = transform;
        }
    }

    fn set_bounds(&mut self, handle: &u32, bounds: ChunkBounds) {
        if let Some(c) = self.chunks.get_mut(handle) {
            c.bounds = Some(bounds);
        }
    }

    fn set_visible(&mut self, handle: &u32, visible: bool) {
        if let Some(c) = self.chunks.get_mut(handle) {
            c.visible = visible;
        }
    }

    fn set_world(&mut self, handle: &u32, world: WorldHandle) {
        if let Some(c) = self.chunks.get_mut(handle) {
            c.world = world;
        }
    }

    fn update_material(&mut self, params: &DetailMaterialParams) {
        self.material = Some(params.clone());
        self.material_updates += 1;
    }
}
