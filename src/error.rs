//! Error types for the engine
//!
//! Each concern owns one `thiserror` enum. Lookup misses (an alias that is not in
//! the scene, an attribute the program does not declare) are not errors and are
//! reported through `Option`/`bool` instead.

use thiserror::Error;

/// Shader stage a compilation error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Failures raised by a [`RenderBackend`](crate::gfx::backend::RenderBackend)
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("{stage} shader failed to compile: {message}")]
    ShaderCompilation { stage: ShaderStage, message: String },

    #[error("program failed to link: {0}")]
    ProgramLink(String),

    #[error("unknown {kind} handle {id}")]
    InvalidHandle { kind: &'static str, id: u32 },

    #[error("pixel ({x}, {y}) is outside the {width}x{height} render target")]
    PixelOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("pixel readback failed: {0}")]
    Readback(String),

    #[error("failed to initialise the GPU: {0}")]
    Device(String),
}

/// Failures while fetching an asset
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request for {path} failed: {message}")]
    Http { path: String, message: String },

    #[error("failed to decode image {path}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Failures while loading or adding a drawable to a [`Scene`](crate::gfx::scene::Scene)
#[derive(Debug, Error)]
pub enum SceneError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("failed to parse geometry {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid geometry for '{alias}': {reason}")]
    InvalidGeometry { alias: String, reason: String },
}
