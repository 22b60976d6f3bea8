//! # Graphics Module
//!
//! The rendering engine proper: shader programs, textures, the model-view
//! matrix stack, cameras, the drawable scene and the color picker. Everything
//! reaches the GPU through the [`backend::RenderBackend`] held by the
//! [`Engine`](crate::engine::Engine).
//!
//! ## Architecture Overview
//!
//! - **Backend** ([`backend`]) - GPU seam with wgpu and headless implementations
//! - **Programs** ([`program`]) - WGSL programs with attribute/uniform lookup by name
//! - **Camera System** ([`camera`]) - Orbiting and tracking cameras with pointer controls
//! - **Transforms** ([`transforms`]) - Model-view stack, projection and normal matrix
//! - **Scene Management** ([`scene`]) - Ordered registry of drawable objects
//! - **Picking** ([`picking`]) - Offscreen color-encoded object picking
//! - **Resources** ([`resources`]) - Image textures
//! - **Geometry** ([`geometry`]) - Normal and tangent derivation, simple shapes

pub mod backend;
pub mod camera;
pub mod geometry;
pub mod picking;
pub mod program;
pub mod resources;
pub mod scene;
pub mod transforms;

// Re-export commonly used types
pub use camera::{Camera, CameraConfig, CameraKind, Controls, ControlsConfig};
pub use picking::{Picker, PickerCallbacks};
pub use program::Program;
pub use resources::Texture;
pub use scene::{DrawableObject, GeometryDesc, ObjectAttributes, Scene, SceneConfig};
pub use transforms::{Transforms, TransformsConfig};
