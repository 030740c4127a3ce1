//! Detail plugin wiring (glue).
//! - Settings asset/loader
//! - Layers built once the settings are loaded, attached to `ActiveTerrain`
//! - Per-frame advance around the `DetailViewer`
//! - Host notifications (terrain edits, moves, visibility, world) as events

use bevy::math::UVec2;
use bevy::pbr::MaterialPlugin;
use bevy::prelude::*;

use super::core::WorldHandle;
use super::layer::DetailLayer;
use super::material::DetailMaterial;
use super::registry::{DetailSettings, DetailSettingsAssetPlugin};
use super::render::{EntityRenderer, LayerRenderAssets};
use crate::heightmap_data::ActiveTerrain;

/// Where the layer settings live.
#[derive(Resource, Clone)]
pub struct DetailPluginSettings {
    pub settings_path: String,
}
impl Default for DetailPluginSettings {
    fn default() -> Self {
        Self { settings_path: "details/meadow.details.ron".to_string() }
    }
}

/// Handle to the loaded DetailSettings asset.
#[derive(Resource, Default)]
pub struct DetailSettingsHandle(pub Handle<DetailSettings>);

/// The entity whose position drives streaming (usually the camera).
#[derive(Component)]
pub struct DetailViewer;

pub struct DetailLayerSlot {
    pub layer: DetailLayer<Entity>,
    pub render: LayerRenderAssets,
}

#[derive(Resource, Default)]
pub struct DetailLayers {
    pub slots: Vec<DetailLayerSlot>,
}

/// Heights in cells `[min, max)` were edited.
#[derive(Event, Clone, Copy, Debug)]
pub struct TerrainRegionEdited {
    pub min: UVec2,
    pub max: UVec2,
}

/// The terrain was moved.
#[derive(Event, Clone, Copy, Debug)]
pub struct TerrainMoved(pub Transform);

#[derive(Event, Clone, Copy, Debug)]
pub struct DetailVisibilityChanged(pub bool);

#[derive(Event, Clone, Copy, Debug)]
pub struct DetailWorldChanged(pub WorldHandle);

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum DetailSet {
    /// Build layers, attach terrain, apply host notifications.
    Sync,
    Advance,
}

pub struct DetailPlugin;

impl Plugin for DetailPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(DetailSettingsAssetPlugin)
            .add_plugins(MaterialPlugin::<DetailMaterial>::default())
            .init_resource::<DetailPluginSettings>()
            .init_resource::<DetailSettingsHandle>()
            .init_resource::<DetailLayers>()
            .add_event::<TerrainRegionEdited>()
            .add_event::<TerrainMoved>()
            .add_event::<DetailVisibilityChanged>()
            .add_event::<DetailWorldChanged>()
            .configure_sets(Update, (DetailSet::Sync, DetailSet::Advance.after(DetailSet::Sync)))
            .add_systems(Startup, load_detail_settings)
            .add_systems(
                Update,
                (build_layers_when_ready, attach_active_terrain, apply_host_events)
                    .chain()
                    .in_set(DetailSet::Sync),
            )
            .add_systems(Update, advance_detail_layers.in_set(DetailSet::Advance));
    }
}

/// Startup: request loading the settings file, store handle.
fn load_detail_settings(
    mut handle_res: ResMut<DetailSettingsHandle>,
    settings: Res<DetailPluginSettings>,
    assets: Res<AssetServer>,
) {
    if handle_res.0.is_strong() {
        return;
    }
    handle_res.0 = assets.load(settings.settings_path.as_str());
    info!("Details: loading layer settings from '{}'", settings.settings_path);
}

/// Update: build the layers once the settings asset is available.
fn build_layers_when_ready(
    mut commands: Commands,
    handle_res: Res<DetailSettingsHandle>,
    settings: Res<Assets<DetailSettings>>,
    assets: Res<AssetServer>,
    terrain: Option<Res<ActiveTerrain>>,
    mut layers: ResMut<DetailLayers>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<DetailMaterial>>,
    mut built: Local<bool>,
) {
    if *built {
        return;
    }
    let Some(settings) = settings.get(&handle_res.0) else { return };
    *built = true;

    for def in &settings.layers {
        let albedo = def.texture.as_deref().map(|path| assets.load(path));
        let layer = match DetailLayer::from_def(def, albedo) {
            Ok(layer) => layer,
            Err(e) => {
                warn!("Details: skipping layer '{}': {}", def.name, e);
                continue;
            }
        };
        let mut slot = DetailLayerSlot { layer, render: LayerRenderAssets::new(&mut meshes, &mut materials) };

        if let Some(terrain) = terrain.as_deref() {
            let index = layers.slots.len();
            let mut renderer = EntityRenderer {
                commands: &mut commands,
                meshes: &mut meshes,
                materials: &mut materials,
                assets: &mut slot.render,
                layer: index,
            };
            slot.layer.attach(terrain.0.clone(), &mut renderer);
        }
        layers.slots.push(slot);
    }
    info!("Details: {} layer(s) ready", layers.slots.len());
}

/// Update: reattach every layer when the terrain resource is replaced.
fn attach_active_terrain(
    mut commands: Commands,
    terrain: Option<Res<ActiveTerrain>>,
    mut layers: ResMut<DetailLayers>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<DetailMaterial>>,
) {
    let Some(terrain) = terrain else { return };
    if !terrain.is_changed() {
        return;
    }
    for (index, slot) in layers.slots.iter_mut().enumerate() {
        let mut renderer = EntityRenderer {
            commands: &mut commands,
            meshes: &mut meshes,
            materials: &mut materials,
            assets: &mut slot.render,
            layer: index,
        };
        slot.layer.attach(terrain.0.clone(), &mut renderer);
    }
}

/// Update: forward host notifications to every layer.
fn apply_host_events(
    mut commands: Commands,
    mut edits: EventReader<TerrainRegionEdited>,
    mut moves: EventReader<TerrainMoved>,
    mut visibility: EventReader<DetailVisibilityChanged>,
    mut worlds: EventReader<DetailWorldChanged>,
    mut layers: ResMut<DetailLayers>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<DetailMaterial>>,
) {
    let edits: Vec<_> = edits.read().copied().collect();
    let moved = moves.read().last().copied();
    let visible = visibility.read().last().copied();
    let world = worlds.read().last().copied();
    if edits.is_empty() && moved.is_none() && visible.is_none() && world.is_none() {
        return;
    }

    for (index, slot) in layers.slots.iter_mut().enumerate() {
        let mut renderer = EntityRenderer {
            commands: &mut commands,
            meshes: &mut meshes,
            materials: &mut materials,
            assets: &mut slot.render,
            layer: index,
        };
        for edit in &edits {
            let refreshed = slot.layer.on_heightmap_region_changed(edit.min, edit.max, &mut renderer);
            debug!("Details: '{}' refreshed {} chunk bounds", slot.layer.name(), refreshed);
        }
        if let Some(TerrainMoved(transform)) = moved {
            slot.layer.on_terrain_transform_changed(transform, &mut renderer);
        }
        if let Some(DetailVisibilityChanged(v)) = visible {
            slot.layer.on_visibility_changed(v, &mut renderer);
        }
        if let Some(DetailWorldChanged(w)) = world {
            slot.layer.on_world_changed(w, &mut renderer);
        }
    }
}

/// Update: stream every layer around the viewer.
fn advance_detail_layers(
    mut commands: Commands,
    time: Res<Time>,
    viewers: Query<&GlobalTransform, With<DetailViewer>>,
    mut layers: ResMut<DetailLayers>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<DetailMaterial>>,
) {
    let Ok(viewer) = viewers.single() else { return };
    let viewer = viewer.translation();
    let dt = time.delta_secs();

    for (index, slot) in layers.slots.iter_mut().enumerate() {
        let mut renderer = EntityRenderer {
            commands: &mut commands,
            meshes: &mut meshes,
            materials: &mut materials,
            assets: &mut slot.render,
            layer: index,
        };
        match slot.layer.advance(dt, viewer, &mut renderer) {
            Ok(report) => {
                if report.loaded > 0 || report.unloaded > 0 {
                    trace!("Details: '{}' +{} / -{}", slot.layer.name(), report.loaded, report.unloaded);
                }
            }
            // already reported by the layer; it just sits this frame out
            Err(e) => trace!("Details: '{}' idle: {}", slot.layer.name(), e),
        }
    }
}
