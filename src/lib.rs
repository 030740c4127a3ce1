//! Chunk-streamed instanced terrain details (grass, pebbles) for heightmap terrain.

pub mod heightmap_data;
pub mod props;
pub mod terrain;

pub use heightmap_data::{ActiveTerrain, HeightmapData};
pub use props::core::{ChunkBounds, DetailInstance, DetailRenderer, WorldHandle};
pub use props::{DetailError, DetailLayer, DetailPlugin, DetailViewer};
pub use terrain::{ChunkKey, MapChannel, TerrainHost, TerrainPlugin};
