// src/props/instancing/template.rs
//! Procedural instance layout shared by every chunk of a layer.
//! Relative placement is identical per chunk; only the chunk transform differs.

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::props::core::{DetailInstance, WorldSeed};

/// Hard cap on instances per template, whatever the settings ask for.
pub const MAX_TEMPLATE_INSTANCES: usize = 1 << 20;

/// Generation knobs for a layer's template (data form).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateParams {
    /// Instances per unit cell; the fractional part is spread over random cells.
    #[serde(default = "default_density")]
    pub density: f32,
    /// Max XZ offset from the cell center, in cells.
    #[serde(default = "default_jitter")]
    pub jitter_radius: f32,
    /// Uniform scale is `1 ± scale_randomness`; 0 keeps every instance at 1.
    #[serde(default)]
    pub scale_randomness: f32,
    #[serde(default)]
    pub seed: WorldSeed,
}

fn default_density() -> f32 {
    4.0
}
fn default_jitter() -> f32 {
    0.5
}

impl Default for TemplateParams {
    fn default() -> Self {
        Self {
            density: default_density(),
            jitter_radius: default_jitter(),
            scale_randomness: 0.0,
            seed: WorldSeed::default(),
        }
    }
}

/// Immutable instance buffer for one chunk's worth of details.
#[derive(Clone, Debug)]
pub struct InstanceBatchTemplate {
    resolution: u32,
    instances: Vec<DetailInstance>,
}

impl InstanceBatchTemplate {
    /// `floor(resolution² × density)` instances over `[0, resolution)²`,
    /// capped at [`MAX_TEMPLATE_INSTANCES`].
    pub fn generate(resolution: u32, params: &TemplateParams) -> Self {
        let jitter = params.jitter_radius.max(0.0);
        let cell_count = (resolution as usize).saturating_mul(resolution as usize);

        let mut density = params.density.max(0.0);
        let wanted = cell_count as f64 * density as f64;
        if wanted > MAX_TEMPLATE_INSTANCES as f64 {
            density = (MAX_TEMPLATE_INSTANCES as f64 / cell_count as f64) as f32;
            warn!(
                "details: template {}x{} at density {} wants {} instances; capped at {}",
                resolution, resolution, params.density, wanted, MAX_TEMPLATE_INSTANCES
            );
        }

        let per_cell = density.floor() as usize;
        let extra = ((cell_count as f64 * density.fract() as f64).floor() as usize).min(MAX_TEMPLATE_INSTANCES);
        let total = cell_count
            .checked_mul(per_cell)
            .and_then(|n| n.checked_add(extra))
            .map_or(MAX_TEMPLATE_INSTANCES, |n| n.min(MAX_TEMPLATE_INSTANCES));

        let mut rng = rng_for(params.seed, resolution);
        let mut instances = Vec::with_capacity(total);

        if per_cell > 0 {
            for z in 0..resolution {
                for x in 0..resolution {
                    for _ in 0..per_cell {
                        instances.push(make_instance(&mut rng, x, z, jitter, params.scale_randomness));
                    }
                }
            }
        }

        // Fractional density: sprinkle the remainder over random cells
        for _ in 0..extra {
            if instances.len() >= total {
                break;
            }
            let x = rng.random_range(0..resolution);
            let z = rng.random_range(0..resolution);
            instances.push(make_instance(&mut rng, x, z, jitter, params.scale_randomness));
        }

        Self { resolution, instances }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn instances(&self) -> &[DetailInstance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

}

#[inline]
fn rng_for(seed: WorldSeed, resolution: u32) -> ChaCha8Rng {
    // Stable per (seed, resolution)
    let mix = seed.0 ^ ((resolution as u64) << 40) ^ 0x9E37_79B9_7F4A_7C15u64;
    ChaCha8Rng::seed_from_u64(mix)
}

#[inline]
fn symmetric(rng: &mut ChaCha8Rng, radius: f32) -> f32 {
    (rng.random::<f32>() - 0.5) * 2.0 * radius
}

fn make_instance(rng: &mut ChaCha8Rng, x: u32, z: u32, jitter: f32, scale_randomness: f32) -> DetailInstance {
    let jx = symmetric(rng, jitter);
    let jz = symmetric(rng, jitter);
    let yaw = rng.random_range(0.0..std::f32::consts::PI);
    let scale = if scale_randomness > 0.0 {
        1.0 + symmetric(rng, scale_randomness)
    } else {
        1.0
    };

    DetailInstance {
        translation: Vec3::new(x as f32 + 0.5 + jx, 0.0, z as f32 + 0.5 + jz),
        yaw,
        scale,
        color: Color::WHITE,
    }
}
