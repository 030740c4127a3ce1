use bevy::prelude::*;

mod actions;
mod input;
mod setup;

use actions::ActionState;
use chasma_details::props::plugin::DetailSet;
use chasma_details::{DetailPlugin, TerrainPlugin};
use input::{camera_controller, detail_hotkeys, input_mapping_system};

fn main() {
    App::new()
        // core engine plugins
        .add_plugins(DefaultPlugins)
        // domain plugins
        .add_plugins(TerrainPlugin) // loads the heightmap + spawns the terrain mesh
        .add_plugins(DetailPlugin) // streams grass/pebble chunks around the camera
        .init_resource::<ActionState>()
        .add_systems(Startup, setup::setup)
        // input + camera each frame, before details stream around the new position
        .add_systems(
            Update,
            (input_mapping_system, (camera_controller, detail_hotkeys))
                .chain()
                .before(DetailSet::Sync),
        )
        .run();
}
