// src/terrain/host.rs
//! What the detail layers need from the terrain they decorate.
//! Keep this dependency-light: the streamer only ever talks to `dyn TerrainHost`.

use bevy::math::{UVec2, Vec2, Vec3};
use bevy::prelude::{Handle, Image, Transform};

/// Data channels a terrain can carry maps for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MapChannel {
    Height,
    Normal,
    Color,
    Splat,
    /// Density / placement masks, one per detail layer.
    Detail,
}

/// Host terrain as seen by detail layers.
///
/// Cell coordinates are heightmap texels; layer space is world space minus
/// [`TerrainHost::origin`] (terrain rotation is ignored for X/Z).
pub trait TerrainHost: Send + Sync + 'static {
    /// World-space position of the terrain's (0, 0) cell corner.
    fn origin(&self) -> Vec3;

    /// Transform handed to shaders. Only the translation is used for placement.
    fn internal_transform(&self) -> Transform;

    /// World units per cell along X and Z.
    fn horizontal_scale(&self) -> Vec2;

    /// World units per unit of raw height.
    fn vertical_scale(&self) -> f32;

    /// Raw (unscaled) min/max height over cells `[min, max)`.
    /// `None` when the rectangle is empty after clamping.
    fn elevation_range(&self, min: UVec2, max: UVec2) -> Option<(f32, f32)>;

    /// Heightmap resolution in cells along each side.
    fn resolution(&self) -> u32;

    fn map_count(&self, channel: MapChannel) -> usize;

    /// GPU copy of a map. For [`MapChannel::Height`] this is raw heights
    /// (`R32Float`, one texel per cell) that detail shaders ground cards on.
    fn texture(&self, channel: MapChannel, index: usize) -> Option<Handle<Image>>;

    /// False while the terrain has no heightmap at all.
    fn has_data(&self) -> bool {
        self.resolution() > 0
    }

    /// True while an editor holds the data; detail updates wait for the next frame.
    fn is_data_locked(&self) -> bool {
        false
    }

    /// 0..1, drives how fast detail meshes sway.
    fn wind_strength(&self) -> f32 {
        0.0
    }

    /// Scaled height (relative to `origin().y`) at a layer-space XZ position.
    /// This default reads the containing cell; hosts with smoother data override it.
    fn height_at(&self, local_xz: Vec2) -> Option<f32> {
        let cell = (local_xz / self.horizontal_scale().max(Vec2::splat(f32::EPSILON))).floor();
        if cell.x < 0.0 || cell.y < 0.0 {
            return None;
        }
        let min = cell.as_uvec2();
        self.elevation_range(min, min + UVec2::ONE).map(|(lo, _)| lo * self.vertical_scale())
    }

    /// Terrain extent in layer space (X/Z).
    fn world_size(&self) -> Vec2 {
        self.horizontal_scale() * self.resolution() as f32
    }
}
