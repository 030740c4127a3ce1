pub mod chunking;
pub mod components;
pub mod host;
mod plugin;
pub mod systems;

// Re-export the plugin and label so they're public:
pub use plugin::{TerrainPlugin, TerrainStartupSet};

pub use components::{ChunkKey, Terrain};
pub use host::{MapChannel, TerrainHost};
