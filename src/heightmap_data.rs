// src/heightmap_data.rs
use bevy::math::{UVec2, Vec2, Vec3};
use bevy::prelude::*;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use image::GrayImage;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::terrain::host::{MapChannel, TerrainHost};

/// Cells per side of one cached min/max block.
pub const RANGE_BLOCK: u32 = 16;

/// In-memory terrain: square heightmap plus the maps detail layers read.
pub struct HeightmapData {
    /// Cells per side.
    resolution: u32,
    /// Row-major raw heights (world height = raw * height_scale).
    heights: Vec<f32>,
    /// World-space position of cell (0, 0).
    origin: Vec3,
    /// World units per cell (X, Z).
    cell_size: Vec2,
    /// World units per raw height unit.
    height_scale: f32,
    /// Per-block (min, max), refreshed on edits.
    blocks: Vec<(f32, f32)>,
    blocks_per_side: u32,
    height_map: Option<Handle<Image>>,
    detail_maps: Vec<Handle<Image>>,
    color_maps: Vec<Handle<Image>>,
    locked: AtomicBool,
    wind_bits: AtomicU32,
}

impl HeightmapData {
    pub fn from_fn(resolution: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut heights = Vec::with_capacity((resolution * resolution) as usize);
        for z in 0..resolution {
            for x in 0..resolution {
                heights.push(f(x, z));
            }
        }
        let blocks_per_side = resolution.div_ceil(RANGE_BLOCK);
        let mut data = Self {
            resolution,
            heights,
            origin: Vec3::ZERO,
            cell_size: Vec2::ONE,
            height_scale: 1.0,
            blocks: vec![(0.0, 0.0); (blocks_per_side * blocks_per_side) as usize],
            blocks_per_side,
            height_map: None,
            detail_maps: Vec::new(),
            color_maps: Vec::new(),
            locked: AtomicBool::new(false),
            wind_bits: AtomicU32::new(0.0f32.to_bits()),
        };
        data.refresh_blocks(UVec2::ZERO, UVec2::splat(resolution));
        data
    }

    pub fn flat(resolution: u32, height: f32) -> Self {
        Self::from_fn(resolution, |_, _| height)
    }

    /// Build from an 8-bit grayscale image; 255 maps to raw height 1.0.
    pub fn from_gray_image(img: &GrayImage) -> Self {
        let res = img.width().min(img.height());
        Self::from_fn(res, |x, z| img.get_pixel(x, z)[0] as f32 / 255.0)
    }

    pub fn with_origin(mut self, origin: Vec3) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_cell_size(mut self, cell_size: Vec2) -> Self {
        self.cell_size = cell_size;
        self
    }

    pub fn with_height_scale(mut self, height_scale: f32) -> Self {
        self.height_scale = height_scale;
        self
    }

    /// GPU copy of the heights, usually `images.add(data.height_image()?)`.
    pub fn with_height_map(mut self, map: Handle<Image>) -> Self {
        self.height_map = Some(map);
        self
    }

    pub fn with_detail_maps(mut self, maps: Vec<Handle<Image>>) -> Self {
        self.detail_maps = maps;
        self
    }

    pub fn with_color_maps(mut self, maps: Vec<Handle<Image>>) -> Self {
        self.color_maps = maps;
        self
    }

    pub fn with_wind_strength(self, strength: f32) -> Self {
        self.set_wind_strength(strength);
        self
    }

    pub fn set_origin(&mut self, origin: Vec3) {
        self.origin = origin;
    }

    #[inline]
    pub fn raw_height(&self, x: u32, z: u32) -> f32 {
        let xi = x.min(self.resolution.saturating_sub(1));
        let zi = z.min(self.resolution.saturating_sub(1));
        self.heights[(zi * self.resolution + xi) as usize]
    }

    /// Raw heights as an `R32Float` texture, one texel per cell.
    pub fn height_image(&self) -> Option<Image> {
        if self.resolution == 0 {
            return None;
        }
        let bytes: Vec<u8> = self.heights.iter().flat_map(|h| h.to_le_bytes()).collect();
        Some(Image::new(
            Extent3d { width: self.resolution, height: self.resolution, depth_or_array_layers: 1 },
            TextureDimension::D2,
            bytes,
            TextureFormat::R32Float,
            RenderAssetUsages::RENDER_WORLD,
        ))
    }

    /// Bilinear raw height at fractional cell coordinates; `None` off the map.
    fn bilinear_raw(&self, fx: f32, fz: f32) -> Option<f32> {
        let res = self.resolution as f32;
        if self.resolution == 0 || fx < 0.0 || fz < 0.0 || fx >= res || fz >= res {
            return None;
        }

        let x0 = fx.floor() as u32;
        let z0 = fz.floor() as u32;
        let dx = fx - x0 as f32;
        let dz = fz - z0 as f32;

        // raw_height clamps x0+1 / z0+1 at the far edge
        let s00 = self.raw_height(x0, z0);
        let s10 = self.raw_height(x0 + 1, z0);
        let s01 = self.raw_height(x0, z0 + 1);
        let s11 = self.raw_height(x0 + 1, z0 + 1);

        let a = s00 * (1.0 - dx) + s10 * dx;
        let b = s01 * (1.0 - dx) + s11 * dx;
        Some(a * (1.0 - dz) + b * dz)
    }

    /// Overwrite raw heights in `[min, max)`; returns the clamped region that changed.
    pub fn edit_region(
        &mut self,
        min: UVec2,
        max: UVec2,
        mut f: impl FnMut(u32, u32, f32) -> f32,
    ) -> Option<(UVec2, UVec2)> {
        let (min, max) = self.clamp_rect(min, max)?;
        for z in min.y..max.y {
            for x in min.x..max.x {
                let i = (z * self.resolution + x) as usize;
                self.heights[i] = f(x, z, self.heights[i]);
            }
        }
        self.refresh_blocks(min, max);
        Some((min, max))
    }

    pub fn lock_data(&self) {
        self.locked.store(true, Ordering::Release);
    }

    pub fn unlock_data(&self) {
        self.locked.store(false, Ordering::Release);
    }

    pub fn set_wind_strength(&self, strength: f32) {
        self.wind_bits.store(strength.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn clamp_rect(&self, min: UVec2, max: UVec2) -> Option<(UVec2, UVec2)> {
        let max = max.min(UVec2::splat(self.resolution));
        if min.x >= max.x || min.y >= max.y {
            return None;
        }
        Some((min, max))
    }

    fn scan(&self, min: UVec2, max: UVec2) -> (f32, f32) {
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;
        for z in min.y..max.y {
            let row = (z * self.resolution) as usize;
            for &h in &self.heights[row + min.x as usize..row + max.x as usize] {
                lo = lo.min(h);
                hi = hi.max(h);
            }
        }
        (lo, hi)
    }

    fn block_rect(&self, bx: u32, bz: u32) -> (UVec2, UVec2) {
        let min = UVec2::new(bx, bz) * RANGE_BLOCK;
        let max = (min + UVec2::splat(RANGE_BLOCK)).min(UVec2::splat(self.resolution));
        (min, max)
    }

    fn refresh_blocks(&mut self, min: UVec2, max: UVec2) {
        let bmin = min / RANGE_BLOCK;
        let bmax = (max + UVec2::splat(RANGE_BLOCK - 1)) / RANGE_BLOCK;
        for bz in bmin.y..bmax.y.min(self.blocks_per_side) {
            for bx in bmin.x..bmax.x.min(self.blocks_per_side) {
                let (rmin, rmax) = self.block_rect(bx, bz);
                let range = self.scan(rmin, rmax);
                self.blocks[(bz * self.blocks_per_side + bx) as usize] = range;
            }
        }
    }
}

impl TerrainHost for HeightmapData {
    fn origin(&self) -> Vec3 {
        self.origin
    }

    fn internal_transform(&self) -> Transform {
        Transform {
            translation: self.origin,
            rotation: Quat::IDENTITY,
            scale: Vec3::new(self.cell_size.x, self.height_scale, self.cell_size.y),
        }
    }

    fn horizontal_scale(&self) -> Vec2 {
        self.cell_size
    }

    fn vertical_scale(&self) -> f32 {
        self.height_scale
    }

    fn elevation_range(&self, min: UVec2, max: UVec2) -> Option<(f32, f32)> {
        let (min, max) = self.clamp_rect(min, max)?;

        let bmin = min / RANGE_BLOCK;
        let bmax = (max + UVec2::splat(RANGE_BLOCK - 1)) / RANGE_BLOCK;
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;

        for bz in bmin.y..bmax.y {
            for bx in bmin.x..bmax.x {
                let (rmin, rmax) = self.block_rect(bx, bz);
                let inner_min = rmin.max(min);
                let inner_max = rmax.min(max);
                // Whole block inside the query: use the cached range.
                let (l, h) = if inner_min == rmin && inner_max == rmax {
                    self.blocks[(bz * self.blocks_per_side + bx) as usize]
                } else {
                    self.scan(inner_min, inner_max)
                };
                lo = lo.min(l);
                hi = hi.max(h);
            }
        }
        Some((lo, hi))
    }

    fn resolution(&self) -> u32 {
        self.resolution
    }

    fn map_count(&self, channel: MapChannel) -> usize {
        match channel {
            MapChannel::Height => usize::from(self.resolution > 0),
            MapChannel::Detail => self.detail_maps.len(),
            MapChannel::Color => self.color_maps.len(),
            MapChannel::Normal | MapChannel::Splat => 0,
        }
    }

    fn texture(&self, channel: MapChannel, index: usize) -> Option<Handle<Image>> {
        match channel {
            MapChannel::Height if index == 0 => self.height_map.clone(),
            MapChannel::Detail => self.detail_maps.get(index).cloned(),
            MapChannel::Color => self.color_maps.get(index).cloned(),
            _ => None,
        }
    }

    fn height_at(&self, local_xz: Vec2) -> Option<f32> {
        let raw = self.bilinear_raw(local_xz.x / self.cell_size.x, local_xz.y / self.cell_size.y)?;
        Some(raw * self.height_scale)
    }

    fn is_data_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    fn wind_strength(&self) -> f32 {
        f32::from_bits(self.wind_bits.load(Ordering::Relaxed))
    }
}

/// Shared terrain the detail layers attach to.
#[derive(Resource, Clone)]
pub struct ActiveTerrain(pub Arc<HeightmapData>);

/// Bilinear-sample the terrain height (world units) at (world_x, world_z).
/// Returns None if outside the terrain.
pub fn sample_height(world_x: f32, world_z: f32, data: &HeightmapData) -> Option<f32> {
    let local = Vec2::new(world_x - data.origin.x, world_z - data.origin.z);
    data.height_at(local).map(|h| data.origin.y + h)
}
