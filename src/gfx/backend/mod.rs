//! # GPU Backend
//!
//! Every engine component reaches the GPU through [`RenderBackend`]. The trait is
//! deliberately shaped like an immediate-mode graphics API: programs expose
//! attribute and uniform locations by name, buffers are uploaded once, and draw
//! calls are issued against whatever program and render target are current.
//!
//! Two implementations ship with the crate:
//!
//! - [`WgpuBackend`] renders to a window surface through wgpu
//! - [`HeadlessBackend`] keeps everything in memory and records draw calls, which
//!   is what the unit tests run against
//!
//! Shaders are WGSL. Reflection rules shared by both backends live in [`reflect`].

pub mod headless;
pub mod reflect;
pub mod wgpu_backend;

pub use headless::HeadlessBackend;
pub use wgpu_backend::WgpuBackend;

use crate::error::GpuError;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Raw id, scoped to the backend that created it
            pub fn id(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// A compiled and linked shader program
    ProgramId
);
handle!(
    /// A vertex or index buffer
    BufferId
);
handle!(
    /// A set of vertex streams bound to attribute locations
    VertexArrayId
);
handle!(
    /// A sampled 2D RGBA texture
    TextureId
);
handle!(
    /// An offscreen color + depth target
    RenderTargetId
);

/// Location of a vertex attribute in a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeLocation(pub u32);

/// Location of a uniform in a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformLocation {
    /// Byte offset of a member inside the program's uniform block
    Block { offset: u32 },
    /// Binding slot of a texture in group 1; set it with [`UniformValue::Int`]
    /// holding the texture unit, like a sampler uniform
    Texture { binding: u32 },
}

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Tightly packed `f32` components
    Vertex,
    /// `u32` indices
    Index,
}

/// One non-interleaved vertex stream feeding an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexStream {
    pub location: AttributeLocation,
    pub buffer: BufferId,
    /// Number of `f32` components per vertex (1..=4)
    pub components: u32,
}

/// Value written through [`RenderBackend::set_uniform`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major
    Mat3([[f32; 3]; 3]),
    /// Column-major
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    /// Bytes laid out as WGSL expects them inside a uniform block.
    ///
    /// `mat3x3<f32>` columns are padded to 16 bytes; `bool` uploads as a `u32`.
    pub fn to_block_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::Float(v) => v.to_le_bytes().to_vec(),
            UniformValue::Int(v) => v.to_le_bytes().to_vec(),
            UniformValue::Bool(v) => (*v as u32).to_le_bytes().to_vec(),
            UniformValue::Vec2(v) => bytemuck::cast_slice(&v[..]).to_vec(),
            UniformValue::Vec3(v) => bytemuck::cast_slice(&v[..]).to_vec(),
            UniformValue::Vec4(v) => bytemuck::cast_slice(&v[..]).to_vec(),
            UniformValue::Mat3(m) => {
                let mut bytes = Vec::with_capacity(48);
                for column in m {
                    bytes.extend_from_slice(bytemuck::cast_slice(&column[..]));
                    bytes.extend_from_slice(&0f32.to_le_bytes());
                }
                bytes
            }
            UniformValue::Mat4(m) => bytemuck::cast_slice(&m[..]).to_vec(),
        }
    }
}

/// Immediate-mode GPU interface used by every engine component
///
/// Methods take `&self`; implementations keep their mutable state behind interior
/// mutability, the same way wgpu's own `Device` and `Queue` do. The engine is
/// single-threaded, so `RefCell` is enough.
pub trait RenderBackend {
    /// Compiles both WGSL sources and links them into a program
    fn compile_program(&self, vertex: &str, fragment: &str) -> Result<ProgramId, GpuError>;

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<AttributeLocation>;

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Makes `program` current for `set_uniform` and `draw_indexed`
    fn use_program(&self, program: ProgramId);

    fn delete_program(&self, program: ProgramId);

    fn create_buffer(&self, kind: BufferKind, contents: &[u8]) -> BufferId;

    fn delete_buffer(&self, buffer: BufferId);

    fn create_vertex_array(&self, program: ProgramId, streams: &[VertexStream]) -> VertexArrayId;

    fn delete_vertex_array(&self, vertex_array: VertexArrayId);

    /// Uploads tightly packed RGBA8 pixels as a 2D texture
    fn create_texture(&self, width: u32, height: u32, rgba: &[u8]) -> TextureId;

    fn delete_texture(&self, texture: TextureId);

    /// Binds `texture` to a texture unit; programs read units through their
    /// texture uniforms
    fn bind_texture(&self, unit: u32, texture: Option<TextureId>);

    /// Allocates an RGBA8 color target with a matching depth buffer
    fn create_render_target(&self, width: u32, height: u32) -> RenderTargetId;

    /// Reallocates the color and depth storage of `target` at a new size
    fn resize_render_target(&self, target: RenderTargetId, width: u32, height: u32);

    fn delete_render_target(&self, target: RenderTargetId);

    /// Redirects subsequent clears and draws; `None` renders to the canvas
    fn bind_render_target(&self, target: Option<RenderTargetId>);

    /// Reads one pixel back from `target`; the origin is the top-left corner
    fn read_pixel(&self, target: RenderTargetId, x: u32, y: u32) -> Result<[u8; 4], GpuError>;

    /// Writes a uniform of the current program
    fn set_uniform(&self, location: UniformLocation, value: UniformValue);

    /// Clears color and depth of the bound target
    fn clear(&self, color: [f32; 4]);

    /// Draws `count` indices as a triangle list with the current program
    fn draw_indexed(&self, vertex_array: VertexArrayId, index_buffer: BufferId, count: u32);

    /// Size of the canvas in pixels
    fn canvas_size(&self) -> (u32, u32);
}
