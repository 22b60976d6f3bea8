//! Engine context
//!
//! [`Engine`] bundles what every component needs: the GPU backend, the asset
//! source and the engine configuration. It is a cheap `Rc` handle owned by the
//! application and passed to each component constructor.

use std::rc::Rc;

use crate::{
    assets::AssetSource,
    gfx::backend::{HeadlessBackend, RenderBackend},
};

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Color the canvas is cleared to. Default: opaque white
    pub clear_color: [f32; 4],
    /// Canvas size reported while the backend has none (headless use, or a
    /// minimised window). Default: 800x600
    pub canvas_size: (u32, u32),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clear_color: [1.0, 1.0, 1.0, 1.0],
            canvas_size: (800, 600),
        }
    }
}

struct EngineInner {
    backend: Rc<dyn RenderBackend>,
    assets: Rc<dyn AssetSource>,
    config: EngineConfig,
}

/// Shared handle to the backend, assets and configuration
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

impl Engine {
    pub fn new(
        backend: Rc<dyn RenderBackend>,
        assets: Rc<dyn AssetSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Rc::new(EngineInner {
                backend,
                assets,
                config,
            }),
        }
    }

    /// Creates an engine over a [`HeadlessBackend`] sized from `config`
    ///
    /// The backend is returned as well so callers can inspect what was drawn.
    pub fn headless(
        assets: Rc<dyn AssetSource>,
        config: EngineConfig,
    ) -> (Self, Rc<HeadlessBackend>) {
        let (width, height) = config.canvas_size;
        let backend = Rc::new(HeadlessBackend::new(width, height));
        let engine = Self::new(backend.clone(), assets, config);
        (engine, backend)
    }

    pub fn backend(&self) -> &dyn RenderBackend {
        self.inner.backend.as_ref()
    }

    pub fn assets(&self) -> &dyn AssetSource {
        self.inner.assets.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Current canvas size, falling back to the configured size
    pub fn canvas_size(&self) -> (u32, u32) {
        match self.inner.backend.canvas_size() {
            (0, _) | (_, 0) => self.inner.config.canvas_size,
            size => size,
        }
    }

    /// Canvas width divided by height
    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.canvas_size();
        width as f32 / height.max(1) as f32
    }

    /// Clears the bound render target to the configured clear color
    pub fn clear(&self) {
        self.inner.backend.clear(self.inner.config.clear_color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemorySource;

    #[test]
    fn test_canvas_size_falls_back_to_config() {
        let (engine, backend) = Engine::headless(Rc::new(MemorySource::new()), EngineConfig::default());
        assert_eq!(engine.canvas_size(), (800, 600));

        backend.set_canvas_size(0, 0);
        assert_eq!(engine.canvas_size(), (800, 600));

        backend.set_canvas_size(1000, 500);
        assert_eq!(engine.canvas_size(), (1000, 500));
        assert_eq!(engine.aspect_ratio(), 2.0);
    }

    #[test]
    fn test_clones_share_backend() {
        let (engine, backend) = Engine::headless(Rc::new(MemorySource::new()), EngineConfig::default());
        let other = engine.clone();
        other.clear();
        assert_eq!(backend.clear_count(), 1);
    }
}
