// src/wgpu_utils/mod.rs
//! WGPU utility functions and helpers
//!
//! Bind group layout entry shorthands used by the wgpu backend.

pub mod binding_types;

// Re-export main types
pub use binding_types::*;
