// src/props/render.rs
//! ECS-backed `DetailRenderer`: one entity per chunk, one merged mesh per
//! template, one `DetailMaterial` per layer.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::pbr::NotShadowCaster;
use bevy::prelude::*;
use bevy::render::mesh::MeshAabb;
use bevy::render::primitives::Aabb;
use bevy::render::view::RenderLayers;

use crate::props::core::{ChunkBounds, DetailRenderer, WorldHandle};
use crate::props::instancing::mesh::{grass_card_mesh, merge_template_mesh};
use crate::props::instancing::template::InstanceBatchTemplate;
use crate::props::material::{DetailExtension, DetailMaterial, SWAY_REACH};
use crate::props::params::DetailMaterialParams;
use crate::terrain::components::ChunkKey;

/// Chunk entity tag; `key` is `None` while the entity sits in the pool.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetailChunk {
    pub layer: usize,
    pub key: Option<ChunkKey>,
}

/// Culling box for a chunk drawn with the detail shader.
///
/// `terrain` is the chunk's ground range, `mesh` the extent of the merged
/// template mesh (chunk-local, standing on Y=0). The shader lifts each card
/// onto the ground under its anchor and bends its tip by up to `SWAY_REACH`
/// of its height, so the box is the ground range stacked with the mesh extent.
pub fn render_bounds(terrain: ChunkBounds, mesh: ChunkBounds) -> ChunkBounds {
    let reach = mesh.max.y.max(0.0) * SWAY_REACH;
    ChunkBounds::new(
        Vec3::new(
            terrain.min.x.min(mesh.min.x) - reach,
            terrain.min.y + mesh.min.y.min(0.0),
            terrain.min.z.min(mesh.min.z) - reach,
        ),
        Vec3::new(
            terrain.max.x.max(mesh.max.x) + reach,
            terrain.max.y + mesh.max.y.max(0.0),
            terrain.max.z.max(mesh.max.z) + reach,
        ),
    )
}

/// Local extent of a mesh's positions.
pub fn mesh_extent(mesh: &Mesh) -> Option<ChunkBounds> {
    let aabb = mesh.compute_aabb()?;
    Some(ChunkBounds::new(Vec3::from(aabb.min()), Vec3::from(aabb.max())))
}

/// Render-side assets owned by one layer.
pub struct LayerRenderAssets {
    pub material: Handle<DetailMaterial>,
    pub base_mesh: Handle<Mesh>,
    /// Merged mesh for the current template and its extent, rebuilt when the template changes.
    merged: Option<(Arc<InstanceBatchTemplate>, Handle<Mesh>, ChunkBounds)>,
    /// Last ground bounds per chunk, so a template swap can refit the culling box.
    bounds: HashMap<Entity, ChunkBounds>,
    world: WorldHandle,
}

impl LayerRenderAssets {
    pub fn new(meshes: &mut Assets<Mesh>, materials: &mut Assets<DetailMaterial>) -> Self {
        let material = materials.add(DetailMaterial {
            base: StandardMaterial {
                base_color: Color::WHITE,
                alpha_mode: AlphaMode::Mask(0.5),
                unlit: true,
                double_sided: true,
                cull_mode: None,
                ..default()
            },
            extension: DetailExtension::default(),
        });
        Self {
            material,
            base_mesh: meshes.add(grass_card_mesh()),
            merged: None,
            bounds: HashMap::new(),
            world: WorldHandle::default(),
        }
    }

    fn mesh_for(&mut self, template: &Arc<InstanceBatchTemplate>, meshes: &mut Assets<Mesh>) -> Handle<Mesh> {
        if let Some((cached, handle, _)) = &self.merged {
            if Arc::ptr_eq(cached, template) {
                return handle.clone();
            }
        }

        let merged = meshes
            .get(&self.base_mesh)
            .and_then(|base| merge_template_mesh(base, template));
        let (handle, extent) = match merged {
            Some(mesh) => {
                let extent = mesh_extent(&mesh);
                (meshes.add(mesh), extent)
            }
            None => {
                warn!("details: base mesh not mergeable; chunk will draw the bare base mesh");
                let extent = meshes.get(&self.base_mesh).and_then(mesh_extent);
                (self.base_mesh.clone(), extent)
            }
        };
        let extent = extent.unwrap_or(ChunkBounds::new(Vec3::ZERO, Vec3::ZERO));
        self.merged = Some((Arc::clone(template), handle.clone(), extent));
        handle
    }

    fn culling_box(&self, terrain: ChunkBounds) -> Aabb {
        let b = match &self.merged {
            Some((_, _, extent)) => render_bounds(terrain, *extent),
            None => terrain,
        };
        Aabb::from_min_max(b.min, b.max)
    }
}

/// Borrows what it needs from a system for the duration of one layer update.
pub struct EntityRenderer<'a, 'w, 's> {
    pub commands: &'a mut Commands<'w, 's>,
    pub meshes: &'a mut Assets<Mesh>,
    pub materials: &'a mut Assets<DetailMaterial>,
    pub assets: &'a mut LayerRenderAssets,
    pub layer: usize,
}

impl DetailRenderer for EntityRenderer<'_, '_, '_> {
    type Handle = Entity;

    fn create_chunk(&mut self, template: &Arc<InstanceBatchTemplate>) -> Entity {
        let mesh = self.assets.mesh_for(template, self.meshes);
        self.commands
            .spawn((
                Name::new(format!("DetailChunk[{}]", self.layer)),
                Mesh3d(mesh),
                MeshMaterial3d(self.assets.material.clone()),
                Transform::IDENTITY,
                Visibility::Hidden,
                RenderLayers::layer(self.assets.world.0 as usize),
                // shadow passes use the stock vertex stage, which would leave cards at Y=0
                NotShadowCaster,
                DetailChunk { layer: self.layer, key: None },
            ))
            .id()
    }

    fn rebind_template(&mut self, handle: &Entity, template: &Arc<InstanceBatchTemplate>) {
        let mesh = self.assets.mesh_for(template, self.meshes);
        let mut entity = self.commands.entity(*handle);
        entity.insert(Mesh3d(mesh));
        if let Some(terrain) = self.assets.bounds.get(handle) {
            entity.insert(self.assets.culling_box(*terrain));
        }
    }

    fn assign_key(&mut self, handle: &Entity, key: Option<ChunkKey>) {
        self.commands.entity(*handle).insert(DetailChunk { layer: self.layer, key });
    }

    fn set_transform(&mut self, handle: &Entity, transform: Transform) {
        self.commands.entity(*handle).insert(transform);
    }

    fn set_bounds(&mut self, handle: &Entity, bounds: ChunkBounds) {
        self.assets.bounds.insert(*handle, bounds);
        // An explicit Aabb keeps Bevy from recomputing it from the flat merged mesh.
        self.commands.entity(*handle).insert(self.assets.culling_box(bounds));
    }

    fn set_visible(&mut self, handle: &Entity, visible: bool) {
        let vis = if visible { Visibility::Inherited } else { Visibility::Hidden };
        self.commands.entity(*handle).insert(vis);
    }

    fn set_world(&mut self, handle: &Entity, world: WorldHandle) {
        self.assets.world = world;
        self.commands.entity(*handle).insert(RenderLayers::layer(world.0 as usize));
    }

    fn update_material(&mut self, params: &DetailMaterialParams) {
        let Some(mat) = self.materials.get_mut(&self.assets.material) else { return };
        if mat.base.base_color_texture != params.albedo_texture {
            mat.base.base_color_texture = params.albedo_texture.clone();
        }
        mat.extension.apply(params);
    }
}
