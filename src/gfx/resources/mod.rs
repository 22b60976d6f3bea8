// src/gfx/resources/mod.rs
//! GPU resource management
//!
//! Image textures loaded through the engine's assets, and the raw wgpu texture
//! helpers the wgpu backend builds on.

pub mod texture;
pub mod texture_resource;

// Re-export main types
pub use texture::Texture;
pub use texture_resource::TextureResource;
