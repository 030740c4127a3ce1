// src/props/instancing/pool.rs
//! Recycles heavyweight per-chunk render handles instead of creating and
//! destroying one per load.

use std::sync::Arc;

use bevy::prelude::*;

use super::template::{InstanceBatchTemplate, TemplateParams};
use crate::props::core::DetailRenderer;

pub struct ChunkPool<H> {
    resolution: u32,
    params: TemplateParams,
    /// Generated on first acquire, then shared by every handle.
    template: Option<Arc<InstanceBatchTemplate>>,
    /// LIFO free list; every entry is hidden and has no key.
    free: Vec<H>,
    constructed: usize,
}

impl<H: Clone + std::fmt::Debug> ChunkPool<H> {
    pub fn new(resolution: u32, params: TemplateParams) -> Self {
        Self { resolution, params, template: None, free: Vec::new(), constructed: 0 }
    }

    pub fn template_params(&self) -> &TemplateParams {
        &self.params
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// The shared template, generating it on first use.
    pub fn template(&mut self) -> &Arc<InstanceBatchTemplate> {
        let (resolution, params) = (self.resolution, &self.params);
        self.template.get_or_insert_with(|| {
            let t = InstanceBatchTemplate::generate(resolution, params);
            debug!("details: generated template {}x{} with {} instances", resolution, resolution, t.len());
            Arc::new(t)
        })
    }

    pub fn has_template(&self) -> bool {
        self.template.is_some()
    }

    /// Reuse the most recently released handle, or build a new one.
    pub fn acquire<R: DetailRenderer<Handle = H>>(&mut self, renderer: &mut R) -> H {
        if let Some(handle) = self.free.pop() {
            return handle;
        }
        let template = Arc::clone(self.template());
        self.constructed += 1;
        renderer.create_chunk(&template)
    }

    /// Hide, unassign and keep for later. Handles are never destroyed.
    pub fn release<R: DetailRenderer<Handle = H>>(&mut self, handle: H, renderer: &mut R) {
        renderer.set_visible(&handle, false);
        renderer.assign_key(&handle, None);
        self.free.push(handle);
    }

    /// Swap template parameters. If a template already exists it is rebuilt now,
    /// pooled handles are rebound, and the new template is returned so active
    /// handles can be rebound by the caller.
    pub fn replace_template<R: DetailRenderer<Handle = H>>(
        &mut self,
        resolution: u32,
        params: TemplateParams,
        renderer: &mut R,
    ) -> Option<Arc<InstanceBatchTemplate>> {
        self.resolution = resolution;
        self.params = params;
        self.template.take()?;

        let template = Arc::clone(self.template());
        for handle in &self.free {
            renderer.rebind_template(handle, &template);
        }
        Some(template)
    }

    pub fn pooled(&self) -> &[H] {
        &self.free
    }

    pub fn pooled_count(&self) -> usize {
        self.free.len()
    }

    /// Handles ever built; equals the peak of simultaneously active chunks.
    pub fn constructed(&self) -> usize {
        self.constructed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::testing::RecordingRenderer;

    fn pool() -> ChunkPool<u32> {
        ChunkPool::new(4, TemplateParams { density: 1.0, ..default() })
    }

    #[test]
    fn template_is_generated_lazily_once() {
        let mut pool = pool();
        let mut r = RecordingRenderer::default();
        assert!(!pool.has_template());

        let a = pool.acquire(&mut r);
        let b = pool.acquire(&mut r);
        assert!(pool.has_template());
        assert_eq!(pool.template().len(), 16);
        // both handles share the same template allocation
        assert!(Arc::ptr_eq(&r.chunks[&a].template, &r.chunks[&b].template));
    }

    #[test]
    fn release_hides_unassigns_and_reuses_lifo() {
        let mut pool = pool();
        let mut r = RecordingRenderer::default();
        let a = pool.acquire(&mut r);
        let b = pool.acquire(&mut r);
        r.set_visible(&a, true);
        r.set_visible(&b, true);

        pool.release(a, &mut r);
        pool.release(b, &mut r);
        assert!(!r.chunks[&a].visible && !r.chunks[&b].visible);
        assert!(r.chunks[&a].key.is_none());
        assert_eq!(pool.pooled_count(), 2);

        assert_eq!(pool.acquire(&mut r), b);
        assert_eq!(pool.acquire(&mut r), a);
        assert_eq!(pool.constructed(), 2);
        assert_eq!(r.created, 2);
    }

    #[test]
    fn replace_template_rebinds_pooled_handles() {
        let mut pool = pool();
        let mut r = RecordingRenderer::default();

        // never generated: nothing to rebind
        assert!(pool.replace_template(4, TemplateParams { density: 2.0, ..default() }, &mut r).is_none());

        let a = pool.acquire(&mut r);
        pool.release(a, &mut r);
        let new = pool
            .replace_template(8, TemplateParams { density: 1.0, ..default() }, &mut r)
            .unwrap();
        assert_eq!(new.len(), 64);
        assert!(Arc::ptr_eq(&r.chunks[&a].template, &new));
    }
}
