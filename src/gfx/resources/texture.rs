//! Image textures
//!
//! [`Texture`] fetches an image through the engine's [`AssetSource`](crate::assets::AssetSource),
//! decodes it to RGBA8 and uploads it as a 2D texture.

use crate::{engine::Engine, error::AssetError, gfx::backend::TextureId};

/// A 2D texture loaded from an image asset
pub struct Texture {
    engine: Engine,
    id: Option<TextureId>,
    size: Option<(u32, u32)>,
}

impl Texture {
    /// Creates an empty texture; nothing is allocated until [`set_image`](Self::set_image)
    pub fn new(engine: &Engine) -> Self {
        Self {
            engine: engine.clone(),
            id: None,
            size: None,
        }
    }

    /// Fetches, decodes and uploads the image at `url`
    ///
    /// Resolves once the upload is done. On failure the previous image, if any,
    /// is kept.
    pub async fn set_image(&mut self, url: &str) -> Result<(), AssetError> {
        let engine = self.engine.clone();
        let bytes = engine.assets().fetch(url).await?;

        let image = image::load_from_memory(&bytes)
            .map_err(|source| AssetError::Image {
                path: url.to_string(),
                source,
            })?
            .to_rgba8();
        let (width, height) = image.dimensions();

        let id = engine.backend().create_texture(width, height, image.as_raw());
        if let Some(previous) = self.id.replace(id) {
            engine.backend().delete_texture(previous);
        }
        self.size = Some((width, height));

        log::debug!("loaded texture {} ({}x{})", url, width, height);
        Ok(())
    }

    pub fn id(&self) -> Option<TextureId> {
        self.id
    }

    pub fn is_loaded(&self) -> bool {
        self.id.is_some()
    }

    /// Width over height, once an image is loaded
    pub fn image_aspect(&self) -> Option<f32> {
        self.size.map(|(w, h)| w as f32 / h as f32)
    }

    /// Height over width, once an image is loaded
    pub fn image_aspect_y(&self) -> Option<f32> {
        self.size.map(|(w, h)| h as f32 / w as f32)
    }

    /// Binds the texture to `unit`; does nothing before an image is loaded
    pub fn bind(&self, unit: u32) {
        if let Some(id) = self.id {
            self.engine.backend().bind_texture(unit, Some(id));
        }
    }

    /// Releases the GPU texture; safe to call more than once
    pub fn dispose(&mut self) {
        if let Some(id) = self.id.take() {
            self.engine.backend().delete_texture(id);
        }
        self.size = None;
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish()
    }
}
