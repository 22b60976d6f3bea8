// src/lib.rs
//! Sketch Engine
//!
//! A small immediate-mode 3D engine for interactive sketches: shader programs,
//! an ordered scene of drawables, cameras, a matrix stack, textures, a frame
//! clock and GPU color picking, rendered through wgpu and winit.

pub mod app;
pub mod assets;
pub mod engine;
pub mod error;
pub mod events;
pub mod gfx;
pub mod logging;
pub mod prelude;
pub mod time;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::{AppConfig, Sketch, SketchApp};
pub use engine::{Engine, EngineConfig};
