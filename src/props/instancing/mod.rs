//! Shared per-layer instance layout and the handle pool built on it.
//! Every chunk of a layer draws the same template; only its transform differs,
//! so the Bevy side merges the template into one mesh and reuses it per chunk.

pub mod mesh;
pub mod pool;
pub mod template;

pub use pool::ChunkPool;
pub use template::{InstanceBatchTemplate, TemplateParams};
