//! In-memory backend
//!
//! Compiles and reflects programs exactly like [`WgpuBackend`](super::WgpuBackend)
//! but never touches a GPU. Resources live in tables so callers can check what is
//! still allocated, render targets are CPU pixel grids that can be painted
//! directly, and every draw call is recorded.

use std::cell::RefCell;
use std::collections::HashMap;

use super::{
    reflect::{self, ShaderInterface},
    AttributeLocation, BufferId, BufferKind, ProgramId, RenderBackend, RenderTargetId, TextureId,
    UniformLocation, UniformValue, VertexArrayId, VertexStream,
};
use crate::error::GpuError;

/// A draw call as issued through [`RenderBackend::draw_indexed`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub program: Option<ProgramId>,
    pub target: Option<RenderTargetId>,
    pub vertex_array: VertexArrayId,
    pub index_buffer: BufferId,
    pub count: u32,
    /// Snapshot of the program's uniform block at draw time
    pub uniforms: Vec<u8>,
}

/// Counts of live resources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub programs: usize,
    pub buffers: usize,
    pub vertex_arrays: usize,
    pub textures: usize,
    pub render_targets: usize,
}

struct ProgramEntry {
    interface: ShaderInterface,
    block: Vec<u8>,
}

struct TargetEntry {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

#[derive(Default)]
struct State {
    next_id: u32,
    programs: HashMap<ProgramId, ProgramEntry>,
    buffers: HashMap<BufferId, (BufferKind, usize)>,
    vertex_arrays: HashMap<VertexArrayId, Vec<VertexStream>>,
    textures: HashMap<TextureId, (u32, u32)>,
    targets: HashMap<RenderTargetId, TargetEntry>,
    texture_units: HashMap<u32, TextureId>,
    current_program: Option<ProgramId>,
    bound_target: Option<RenderTargetId>,
    draws: Vec<RecordedDraw>,
    clears: usize,
}

impl State {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Recording backend used for tests and headless tooling
pub struct HeadlessBackend {
    canvas: RefCell<(u32, u32)>,
    state: RefCell<State>,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RefCell::new((width, height)),
            state: RefCell::new(State::default()),
        }
    }

    /// Changes the reported canvas size, as a window resize would
    pub fn set_canvas_size(&self, width: u32, height: u32) {
        *self.canvas.borrow_mut() = (width, height);
    }

    pub fn resource_counts(&self) -> ResourceCounts {
        let state = self.state.borrow();
        ResourceCounts {
            programs: state.programs.len(),
            buffers: state.buffers.len(),
            vertex_arrays: state.vertex_arrays.len(),
            textures: state.textures.len(),
            render_targets: state.targets.len(),
        }
    }

    pub fn draws(&self) -> Vec<RecordedDraw> {
        self.state.borrow().draws.clone()
    }

    pub fn clear_count(&self) -> usize {
        self.state.borrow().clears
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.state.borrow().current_program
    }

    /// Streams recorded for a vertex array
    pub fn vertex_streams(&self, vertex_array: VertexArrayId) -> Option<Vec<VertexStream>> {
        self.state.borrow().vertex_arrays.get(&vertex_array).cloned()
    }

    /// Byte length of a buffer
    pub fn buffer_len(&self, buffer: BufferId) -> Option<usize> {
        self.state.borrow().buffers.get(&buffer).map(|(_, len)| *len)
    }

    /// Size of a render target
    pub fn render_target_size(&self, target: RenderTargetId) -> Option<(u32, u32)> {
        self.state
            .borrow()
            .targets
            .get(&target)
            .map(|t| (t.width, t.height))
    }

    /// Current bytes of a program's uniform block
    pub fn uniform_block(&self, program: ProgramId) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.block.clone())
    }

    /// Paints one pixel of a render target, standing in for a rasterised draw
    pub fn paint_pixel(&self, target: RenderTargetId, x: u32, y: u32, rgba: [u8; 4]) {
        let mut state = self.state.borrow_mut();
        if let Some(entry) = state.targets.get_mut(&target) {
            if x < entry.width && y < entry.height {
                let index = (y * entry.width + x) as usize;
                entry.pixels[index] = rgba;
            }
        }
    }
}

impl RenderBackend for HeadlessBackend {
    fn compile_program(&self, vertex: &str, fragment: &str) -> Result<ProgramId, GpuError> {
        let interface = reflect::reflect_program(vertex, fragment)?;
        let mut state = self.state.borrow_mut();
        let id = ProgramId(state.next());
        let block = vec![0; interface.uniform_block_size as usize];
        state.programs.insert(id, ProgramEntry { interface, block });
        Ok(id)
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<AttributeLocation> {
        let state = self.state.borrow();
        let entry = state.programs.get(&program)?;
        entry
            .interface
            .attributes
            .get(name)
            .map(|a| AttributeLocation(a.location))
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let state = self.state.borrow();
        let entry = state.programs.get(&program)?;
        if let Some(uniform) = entry.interface.uniforms.get(name) {
            return Some(UniformLocation::Block {
                offset: uniform.offset,
            });
        }
        entry
            .interface
            .textures
            .get(name)
            .map(|binding| UniformLocation::Texture { binding: *binding })
    }

    fn use_program(&self, program: ProgramId) {
        self.state.borrow_mut().current_program = Some(program);
    }

    fn delete_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();
        state.programs.remove(&program);
        if state.current_program == Some(program) {
            state.current_program = None;
        }
    }

    fn create_buffer(&self, kind: BufferKind, contents: &[u8]) -> BufferId {
        let mut state = self.state.borrow_mut();
        let id = BufferId(state.next());
        state.buffers.insert(id, (kind, contents.len()));
        id
    }

    fn delete_buffer(&self, buffer: BufferId) {
        self.state.borrow_mut().buffers.remove(&buffer);
    }

    fn create_vertex_array(&self, _program: ProgramId, streams: &[VertexStream]) -> VertexArrayId {
        let mut state = self.state.borrow_mut();
        let id = VertexArrayId(state.next());
        state.vertex_arrays.insert(id, streams.to_vec());
        id
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayId) {
        self.state.borrow_mut().vertex_arrays.remove(&vertex_array);
    }

    fn create_texture(&self, width: u32, height: u32, _rgba: &[u8]) -> TextureId {
        let mut state = self.state.borrow_mut();
        let id = TextureId(state.next());
        state.textures.insert(id, (width, height));
        id
    }

    fn delete_texture(&self, texture: TextureId) {
        let mut state = self.state.borrow_mut();
        state.textures.remove(&texture);
        state.texture_units.retain(|_, bound| *bound != texture);
    }

    fn bind_texture(&self, unit: u32, texture: Option<TextureId>) {
        let mut state = self.state.borrow_mut();
        match texture {
            Some(texture) => {
                state.texture_units.insert(unit, texture);
            }
            None => {
                state.texture_units.remove(&unit);
            }
        }
    }

    fn create_render_target(&self, width: u32, height: u32) -> RenderTargetId {
        let mut state = self.state.borrow_mut();
        let id = RenderTargetId(state.next());
        state.targets.insert(
            id,
            TargetEntry {
                width,
                height,
                pixels: vec![[0; 4]; (width * height) as usize],
            },
        );
        id
    }

    fn resize_render_target(&self, target: RenderTargetId, width: u32, height: u32) {
        if let Some(entry) = self.state.borrow_mut().targets.get_mut(&target) {
            *entry = TargetEntry {
                width,
                height,
                pixels: vec![[0; 4]; (width * height) as usize],
            };
        }
    }

    fn delete_render_target(&self, target: RenderTargetId) {
        let mut state = self.state.borrow_mut();
        state.targets.remove(&target);
        if state.bound_target == Some(target) {
            state.bound_target = None;
        }
    }

    fn bind_render_target(&self, target: Option<RenderTargetId>) {
        self.state.borrow_mut().bound_target = target;
    }

    fn read_pixel(&self, target: RenderTargetId, x: u32, y: u32) -> Result<[u8; 4], GpuError> {
        let state = self.state.borrow();
        let entry = state.targets.get(&target).ok_or(GpuError::InvalidHandle {
            kind: "render target",
            id: target.0,
        })?;
        if x >= entry.width || y >= entry.height {
            return Err(GpuError::PixelOutOfBounds {
                x,
                y,
                width: entry.width,
                height: entry.height,
            });
        }
        Ok(entry.pixels[(y * entry.width + x) as usize])
    }

    fn set_uniform(&self, location: UniformLocation, value: UniformValue) {
        let mut state = self.state.borrow_mut();
        let Some(program) = state.current_program else {
            log::warn!("set_uniform called with no program in use");
            return;
        };
        let UniformLocation::Block { offset } = location else {
            return;
        };
        if let Some(entry) = state.programs.get_mut(&program) {
            let bytes = value.to_block_bytes();
            let start = offset as usize;
            let end = (start + bytes.len()).min(entry.block.len());
            if start < end {
                entry.block[start..end].copy_from_slice(&bytes[..end - start]);
            }
        }
    }

    fn clear(&self, color: [f32; 4]) {
        let mut state = self.state.borrow_mut();
        state.clears += 1;
        if let Some(target) = state.bound_target {
            let rgba = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            if let Some(entry) = state.targets.get_mut(&target) {
                entry.pixels.fill(rgba);
            }
        }
    }

    fn draw_indexed(&self, vertex_array: VertexArrayId, index_buffer: BufferId, count: u32) {
        let mut state = self.state.borrow_mut();
        let program = state.current_program;
        let uniforms = program
            .and_then(|p| state.programs.get(&p))
            .map(|p| p.block.clone())
            .unwrap_or_default();
        let target = state.bound_target;
        state.draws.push(RecordedDraw {
            program,
            target,
            vertex_array,
            index_buffer,
            count,
            uniforms,
        });
    }

    fn canvas_size(&self) -> (u32, u32) {
        *self.canvas.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::reflect::tests::{FRAGMENT, VERTEX};

    #[test]
    fn test_uniform_writes_land_at_reflected_offset() {
        let backend = HeadlessBackend::new(4, 4);
        let program = backend.compile_program(VERTEX, FRAGMENT).unwrap();
        backend.use_program(program);

        let location = backend.uniform_location(program, "uMaterialDiffuse").unwrap();
        backend.set_uniform(location, UniformValue::Vec4([1.0, 0.5, 0.25, 1.0]));

        let block = backend.uniform_block(program).unwrap();
        assert_eq!(&block[176..180], &1.0f32.to_le_bytes());
        assert_eq!(&block[180..184], &0.5f32.to_le_bytes());
    }

    #[test]
    fn test_texture_uniform_resolves_to_binding() {
        let backend = HeadlessBackend::new(4, 4);
        let program = backend.compile_program(VERTEX, FRAGMENT).unwrap();
        assert_eq!(
            backend.uniform_location(program, "uSampler0"),
            Some(UniformLocation::Texture { binding: 1 })
        );
        assert_eq!(backend.uniform_location(program, "uMissing"), None);
    }

    #[test]
    fn test_clear_fills_bound_target() {
        let backend = HeadlessBackend::new(4, 4);
        let target = backend.create_render_target(2, 2);
        backend.bind_render_target(Some(target));
        backend.clear([1.0, 0.0, 0.0, 1.0]);
        assert_eq!(backend.read_pixel(target, 1, 1).unwrap(), [255, 0, 0, 255]);
        assert!(matches!(
            backend.read_pixel(target, 2, 0),
            Err(GpuError::PixelOutOfBounds { .. })
        ));
    }
}
