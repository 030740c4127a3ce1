use bevy::prelude::*;

use crate::terrain::systems::{load_heightmap_data, spawn_terrain_mesh};

/// Startup ordering so the mesh waits for heightmap data.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum TerrainStartupSet {
    Load,  // heightmap + ActiveTerrain
    Decor, // meshes that depend on Load
}

pub struct TerrainPlugin;

impl Plugin for TerrainPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Startup,
            (
                TerrainStartupSet::Load,
                TerrainStartupSet::Decor.after(TerrainStartupSet::Load),
            ),
        )
        // Load the heightmap once at startup
        .add_systems(Startup, load_heightmap_data.in_set(TerrainStartupSet::Load))
        .add_systems(Startup, spawn_terrain_mesh.in_set(TerrainStartupSet::Decor));
    }
}
