//! # Sketch Engine Prelude
//!
//! Commonly used types in one import:
//!
//! ```rust
//! use sketch_engine::prelude::*;
//! ```

// Re-export core application types
pub use crate::app::{AppConfig, Sketch, SketchApp};
pub use crate::engine::{Engine, EngineConfig};
pub use crate::time::{Clock, TICK};

// Re-export graphics and scene types
pub use crate::gfx::{
    Camera, CameraConfig, CameraKind, Controls, ControlsConfig, DrawableObject, GeometryDesc,
    ObjectAttributes, Picker, PickerCallbacks, Program, Scene, SceneConfig, Texture, Transforms,
    TransformsConfig,
};
pub use crate::gfx::backend::UniformValue;

// Re-export errors
pub use crate::error::{AssetError, GpuError, SceneError};

// Re-export common external dependencies
pub use cgmath::{Deg, InnerSpace, Rad, Vector3, Zero};
pub use winit::event::WindowEvent;
