pub mod bounds;
pub mod core;
pub mod error;
pub mod instancing;
pub mod layer;
pub mod material;
pub mod params;
pub mod plugin;
pub mod registry;
pub mod render;
pub mod streaming;
pub mod wind;

#[cfg(test)]
pub(crate) mod testing;

pub use error::DetailError;
pub use layer::DetailLayer;
pub use plugin::{DetailPlugin, DetailViewer};
