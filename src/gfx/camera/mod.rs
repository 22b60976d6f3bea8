//! Camera model and pointer controls
//!
//! [`Camera`] either orbits a focus point or tracks from a fixed position.
//! [`Controls`] turns pointer drags, wheel and pinch input into camera motion.

#[allow(clippy::module_inception)]
pub mod camera;
pub mod camera_utils;
pub mod controls;

// Re-export main types
pub use camera::{Camera, CameraConfig, CameraKind};
pub use controls::{Controls, ControlsConfig};
