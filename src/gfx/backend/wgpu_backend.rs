//! WGPU-based backend
//!
//! Implements the immediate-mode [`RenderBackend`] contract on top of wgpu.
//! Clears and draws are recorded as commands and encoded into render passes when
//! the frame is presented, or earlier for offscreen targets when a pixel is read
//! back.
//!
//! Per-draw uniform blocks are packed into one buffer and addressed with dynamic
//! offsets. Render pipelines are built lazily and cached per program, vertex
//! layout and target kind.

use std::cell::RefCell;
use std::collections::HashMap;

use wgpu::util::DeviceExt;

use super::{
    reflect::{self, ShaderInterface},
    AttributeLocation, BufferId, BufferKind, ProgramId, RenderBackend, RenderTargetId, TextureId,
    UniformLocation, UniformValue, VertexArrayId, VertexStream,
};
use crate::{
    error::{GpuError, ShaderStage},
    gfx::resources::texture_resource::TextureResource,
    wgpu_utils::binding_types,
};

/// Bytes per row of a readback copy; wgpu requires this alignment
const READBACK_ROW_BYTES: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TargetKind {
    Canvas,
    Offscreen,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    /// (location, components) of every provided stream the shader consumes
    streams: Vec<(u32, u32)>,
    target: TargetKind,
}

struct ProgramEntry {
    interface: ShaderInterface,
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: Option<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    block: Vec<u8>,
    /// Texture binding slot to texture unit
    texture_units: HashMap<u32, u32>,
}

struct TargetEntry {
    color: TextureResource,
    depth: TextureResource,
    width: u32,
    height: u32,
}

struct DrawCommand {
    target: Option<RenderTargetId>,
    program: ProgramId,
    vertex_array: VertexArrayId,
    index_buffer: BufferId,
    count: u32,
    uniform_offset: u32,
    textures: Vec<(u32, Option<TextureId>)>,
}

enum Command {
    Clear {
        target: Option<RenderTargetId>,
        color: wgpu::Color,
    },
    Draw(DrawCommand),
}

impl Command {
    fn target(&self) -> Option<RenderTargetId> {
        match self {
            Command::Clear { target, .. } => *target,
            Command::Draw(draw) => draw.target,
        }
    }
}

/// A recorded draw with every GPU object it needs resolved
struct PreparedDraw {
    pipeline: wgpu::RenderPipeline,
    uniform_group: wgpu::BindGroup,
    uniform_offset: Option<u32>,
    texture_group: Option<wgpu::BindGroup>,
    vertex_buffers: Vec<wgpu::Buffer>,
    index_buffer: wgpu::Buffer,
    count: u32,
}

struct PreparedPass {
    target: Option<RenderTargetId>,
    clear: Option<wgpu::Color>,
    draws: Vec<PreparedDraw>,
}

#[derive(Default)]
struct State {
    next_id: u32,
    programs: HashMap<ProgramId, ProgramEntry>,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    vertex_arrays: HashMap<VertexArrayId, Vec<VertexStream>>,
    textures: HashMap<TextureId, TextureResource>,
    targets: HashMap<RenderTargetId, TargetEntry>,
    texture_units: HashMap<u32, TextureId>,
    current_program: Option<ProgramId>,
    bound_target: Option<RenderTargetId>,
    commands: Vec<Command>,
    uniform_data: Vec<u8>,
    uniform_buffer: Option<wgpu::Buffer>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl State {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Renders to a window surface through wgpu
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: RefCell<wgpu::SurfaceConfiguration>,
    depth_texture: RefCell<TextureResource>,
    sampler: wgpu::Sampler,
    zero_buffer: wgpu::Buffer,
    blank_texture: TextureResource,
    uniform_alignment: u32,
    state: RefCell<State>,
}

impl WgpuBackend {
    /// Creates a backend for the given window
    ///
    /// # Arguments
    /// * `window` - Window surface target for rendering
    /// * `width` - Initial surface width in pixels
    /// * `height` - Initial surface height in pixels
    /// * `vsync` - Present with `Fifo` instead of `Immediate`
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .map_err(|e| GpuError::Device(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| GpuError::Device(e.to_string()))?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Sketch Device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| GpuError::Device(e.to_string()))?;

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .ok_or_else(|| GpuError::Device("surface reports no formats".to_string()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::Fifo
            } else {
                wgpu::PresentMode::Immediate
            },
            alpha_mode: surface_capabilities.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture = TextureResource::create_depth_texture(
            &device,
            config.width,
            config.height,
            "canvas_depth",
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Texture Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        // Shader inputs with no stream bound read zeros from here
        let zero_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Zero Vertex Buffer"),
            contents: &[0u8; 16],
            usage: wgpu::BufferUsages::VERTEX,
        });

        let blank_texture = TextureResource::create_from_rgba_data(
            &device,
            &queue,
            &[255, 255, 255, 255],
            1,
            1,
            "Blank Texture",
        );

        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment;

        Ok(Self {
            surface,
            device,
            queue,
            config: RefCell::new(config),
            depth_texture: RefCell::new(depth_texture),
            sampler,
            zero_buffer,
            blank_texture,
            uniform_alignment,
            state: RefCell::new(State::default()),
        })
    }

    /// Resizes the surface and recreates the canvas depth buffer
    ///
    /// Zero sizes (minimised windows) are ignored.
    pub fn resize(&self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        let mut config = self.config.borrow_mut();
        config.width = width;
        config.height = height;
        self.surface.configure(&self.device, &config);

        *self.depth_texture.borrow_mut() =
            TextureResource::create_depth_texture(&self.device, width, height, "canvas_depth");
        log::info!("surface resized to {}x{}", width, height);
    }

    /// Switches between `Fifo` and `Immediate` presentation
    pub fn set_vsync(&self, enable: bool) {
        let mut config = self.config.borrow_mut();
        config.present_mode = if enable {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::Immediate
        };
        self.surface.configure(&self.device, &config);
    }

    /// Executes every recorded command and presents the frame
    pub fn present(&self) {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config.borrow());
                self.discard_commands();
                return;
            }
            Err(e) => {
                log::warn!("skipping frame: {}", e);
                self.discard_commands();
                return;
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.flush(Some(&view));
        surface_texture.present();
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.borrow().format
    }

    fn discard_commands(&self) {
        let mut state = self.state.borrow_mut();
        state.commands.clear();
        state.uniform_data.clear();
    }

    /// Encodes and submits recorded commands
    ///
    /// Without a canvas view only offscreen commands run; canvas commands stay
    /// queued for the next `present`.
    fn flush(&self, canvas: Option<&wgpu::TextureView>) {
        let mut state = self.state.borrow_mut();
        if state.commands.is_empty() {
            return;
        }

        let commands = std::mem::take(&mut state.commands);
        let (runnable, deferred): (Vec<Command>, Vec<Command>) = commands
            .into_iter()
            .partition(|c| canvas.is_some() || c.target().is_some());
        state.commands = deferred;

        let uniform_buffer = self.upload_uniforms(&mut state);
        let passes = self.prepare_passes(&mut state, runnable, &uniform_buffer);

        if canvas.is_some() {
            state.uniform_data.clear();
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Sketch Encoder"),
            });

        let canvas_depth = self.depth_texture.borrow();
        for pass in &passes {
            let (color_view, depth_view) = match pass.target {
                Some(target) => match state.targets.get(&target) {
                    Some(entry) => (&entry.color.view, &entry.depth.view),
                    None => continue,
                },
                None => match canvas {
                    Some(view) => (view, &canvas_depth.view),
                    None => continue,
                },
            };

            let (color_load, depth_load) = match pass.clear {
                Some(color) => (wgpu::LoadOp::Clear(color), wgpu::LoadOp::Clear(1.0)),
                None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
            };

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Sketch Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for draw in &pass.draws {
                render_pass.set_pipeline(&draw.pipeline);
                match draw.uniform_offset {
                    Some(offset) => render_pass.set_bind_group(0, &draw.uniform_group, &[offset]),
                    None => render_pass.set_bind_group(0, &draw.uniform_group, &[]),
                }
                if let Some(group) = &draw.texture_group {
                    render_pass.set_bind_group(1, group, &[]);
                }
                for (slot, buffer) in draw.vertex_buffers.iter().enumerate() {
                    render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                render_pass.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..draw.count, 0, 0..1);
            }
        }
        drop(canvas_depth);

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Copies this frame's uniform blocks into the shared uniform buffer
    fn upload_uniforms(&self, state: &mut State) -> wgpu::Buffer {
        let needed = (state.uniform_data.len() as u64).max(self.uniform_alignment as u64);
        let reusable = state
            .uniform_buffer
            .as_ref()
            .filter(|buffer| buffer.size() >= needed)
            .cloned();

        let buffer = match reusable {
            Some(buffer) => buffer,
            None => {
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Frame Uniforms"),
                    size: needed.next_power_of_two(),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                state.uniform_buffer = Some(buffer.clone());
                buffer
            }
        };

        if !state.uniform_data.is_empty() {
            self.queue.write_buffer(&buffer, 0, &state.uniform_data);
        }
        buffer
    }

    fn prepare_passes(
        &self,
        state: &mut State,
        commands: Vec<Command>,
        uniform_buffer: &wgpu::Buffer,
    ) -> Vec<PreparedPass> {
        let mut passes: Vec<PreparedPass> = Vec::new();
        let mut uniform_groups: HashMap<ProgramId, wgpu::BindGroup> = HashMap::new();

        for command in commands {
            match command {
                Command::Clear { target, color } => passes.push(PreparedPass {
                    target,
                    clear: Some(color),
                    draws: Vec::new(),
                }),
                Command::Draw(draw) => {
                    let target = draw.target;
                    let Some(prepared) =
                        self.prepare_draw(state, draw, uniform_buffer, &mut uniform_groups)
                    else {
                        continue;
                    };
                    match passes.last_mut() {
                        Some(pass) if pass.target == target => pass.draws.push(prepared),
                        _ => passes.push(PreparedPass {
                            target,
                            clear: None,
                            draws: vec![prepared],
                        }),
                    }
                }
            }
        }

        passes
    }

    fn prepare_draw(
        &self,
        state: &mut State,
        draw: DrawCommand,
        uniform_buffer: &wgpu::Buffer,
        uniform_groups: &mut HashMap<ProgramId, wgpu::BindGroup>,
    ) -> Option<PreparedDraw> {
        let Some(streams) = state.vertex_arrays.get(&draw.vertex_array).cloned() else {
            log::warn!("draw skipped: vertex array {} was deleted", draw.vertex_array.0);
            return None;
        };
        let index_buffer = state.buffers.get(&draw.index_buffer)?.clone();
        let attributes = state.programs.get(&draw.program)?.interface.sorted_attributes();

        // One buffer slot per shader input, ordered by location
        let mut layout = Vec::new();
        let mut vertex_buffers = Vec::new();
        for attribute in attributes {
            let stream = streams
                .iter()
                .find(|s| s.location.0 == attribute.location)
                .and_then(|s| state.buffers.get(&s.buffer).map(|b| (s.components, b)));
            match stream {
                Some((components, buffer)) => {
                    layout.push((attribute.location, components));
                    vertex_buffers.push(buffer.clone());
                }
                None => vertex_buffers.push(self.zero_buffer.clone()),
            }
        }

        let key = PipelineKey {
            program: draw.program,
            streams: layout,
            target: match draw.target {
                Some(_) => TargetKind::Offscreen,
                None => TargetKind::Canvas,
            },
        };
        let cached = state.pipelines.get(&key).cloned();
        let pipeline = match cached {
            Some(pipeline) => pipeline,
            None => {
                let pipeline = self.create_pipeline(state.programs.get(&draw.program)?, &key);
                state.pipelines.insert(key, pipeline.clone());
                pipeline
            }
        };

        let program = state.programs.get(&draw.program)?;
        let block_size = program.interface.uniform_block_size as u64;
        let uniform_group = uniform_groups
            .entry(draw.program)
            .or_insert_with(|| {
                let entries: Vec<wgpu::BindGroupEntry> = if block_size > 0 {
                    vec![wgpu::BindGroupEntry {
                        binding: reflect::UNIFORM_BINDING,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: uniform_buffer,
                            offset: 0,
                            size: wgpu::BufferSize::new(block_size),
                        }),
                    }]
                } else {
                    Vec::new()
                };
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Uniform Bind Group"),
                    layout: &program.uniform_layout,
                    entries: &entries,
                })
            })
            .clone();

        let texture_group = program.texture_layout.as_ref().map(|layout| {
            let views: Vec<(u32, &wgpu::TextureView)> = draw
                .textures
                .iter()
                .map(|(binding, texture)| {
                    let view = texture
                        .and_then(|t| state.textures.get(&t))
                        .map_or(&self.blank_texture.view, |t| &t.view);
                    (*binding, view)
                })
                .collect();

            let mut entries = vec![wgpu::BindGroupEntry {
                binding: reflect::SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            }];
            entries.extend(views.into_iter().map(|(binding, view)| wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            }));

            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Texture Bind Group"),
                layout,
                entries: &entries,
            })
        });

        Some(PreparedDraw {
            pipeline,
            uniform_group,
            uniform_offset: (block_size > 0).then_some(draw.uniform_offset),
            texture_group,
            vertex_buffers,
            index_buffer,
            count: draw.count,
        })
    }

    fn create_pipeline(&self, program: &ProgramEntry, key: &PipelineKey) -> wgpu::RenderPipeline {
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = program
            .interface
            .sorted_attributes()
            .iter()
            .map(|attribute| {
                let components = key
                    .streams
                    .iter()
                    .find(|(location, _)| *location == attribute.location)
                    .map_or(attribute.components, |(_, components)| *components);
                [wgpu::VertexAttribute {
                    format: float_format(components),
                    offset: 0,
                    shader_location: attribute.location,
                }]
            })
            .collect();

        let buffers: Vec<wgpu::VertexBufferLayout> = attributes
            .iter()
            .map(|attribute| {
                let provided = key
                    .streams
                    .iter()
                    .any(|(location, _)| *location == attribute[0].shader_location);
                wgpu::VertexBufferLayout {
                    array_stride: attribute[0].format.size(),
                    step_mode: if provided {
                        wgpu::VertexStepMode::Vertex
                    } else {
                        wgpu::VertexStepMode::Instance
                    },
                    attributes: attribute,
                }
            })
            .collect();

        let format = match key.target {
            TargetKind::Canvas => self.config.borrow().format,
            TargetKind::Offscreen => TextureResource::TARGET_FORMAT,
        };

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Sketch Pipeline"),
                layout: Some(&program.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.vertex_module,
                    entry_point: Some(program.interface.vertex_entry.as_str()),
                    buffers: &buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment_module,
                    entry_point: Some(program.interface.fragment_entry.as_str()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: TextureResource::DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
    }

    fn create_shader_module(
        &self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<wgpu::ShaderModule, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    ShaderStage::Vertex => "Vertex Shader",
                    ShaderStage::Fragment => "Fragment Shader",
                }),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(GpuError::ShaderCompilation {
                stage,
                message: error.to_string(),
            }),
            None => Ok(module),
        }
    }
}

fn float_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn align_to(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

impl RenderBackend for WgpuBackend {
    fn compile_program(&self, vertex: &str, fragment: &str) -> Result<ProgramId, GpuError> {
        let interface = reflect::reflect_program(vertex, fragment)?;
        let vertex_module = self.create_shader_module(ShaderStage::Vertex, vertex)?;
        let fragment_module = self.create_shader_module(ShaderStage::Fragment, fragment)?;

        let block_size = interface.uniform_block_size as u64;
        let uniform_entries: Vec<wgpu::BindGroupLayoutEntry> = if block_size > 0 {
            vec![binding_types::entry(
                reflect::UNIFORM_BINDING,
                binding_types::uniform_dynamic(block_size),
            )]
        } else {
            Vec::new()
        };
        let uniform_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Uniform Layout"),
                entries: &uniform_entries,
            });

        let texture_bindings = interface.sorted_texture_bindings();
        let texture_layout = (!texture_bindings.is_empty()).then(|| {
            let mut entries = vec![binding_types::entry(
                reflect::SAMPLER_BINDING,
                binding_types::sampler(wgpu::SamplerBindingType::Filtering),
            )];
            entries.extend(
                texture_bindings
                    .iter()
                    .map(|binding| binding_types::entry(*binding, binding_types::texture_2d())),
            );
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Texture Layout"),
                    entries: &entries,
                })
        });

        let mut layouts = vec![&uniform_layout];
        if let Some(layout) = &texture_layout {
            layouts.push(layout);
        }
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Program Layout"),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

        // Texture uniforms default to consecutive units in binding order
        let texture_units = texture_bindings
            .iter()
            .enumerate()
            .map(|(unit, binding)| (*binding, unit as u32))
            .collect();

        let mut state = self.state.borrow_mut();
        let id = ProgramId(state.next());
        state.programs.insert(
            id,
            ProgramEntry {
                block: vec![0; interface.uniform_block_size as usize],
                interface,
                vertex_module,
                fragment_module,
                uniform_layout,
                texture_layout,
                pipeline_layout,
                texture_units,
            },
        );
        Ok(id)
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<AttributeLocation> {
        let state = self.state.borrow();
        state
            .programs
            .get(&program)?
            .interface
            .attributes
            .get(name)
            .map(|a| AttributeLocation(a.location))
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let state = self.state.borrow();
        let interface = &state.programs.get(&program)?.interface;
        if let Some(uniform) = interface.uniforms.get(name) {
            return Some(UniformLocation::Block {
                offset: uniform.offset,
            });
        }
        interface
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
        state.pipelines.retain(|key, _| key.program != program);
        if state.current_program == Some(program) {
            state.current_program = None;
        }
    }

    fn create_buffer(&self, kind: BufferKind, contents: &[u8]) -> BufferId {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(match kind {
                    BufferKind::Vertex => "Vertex Buffer",
                    BufferKind::Index => "Index Buffer",
                }),
                contents,
                usage: usage | wgpu::BufferUsages::COPY_DST,
            });

        let mut state = self.state.borrow_mut();
        let id = BufferId(state.next());
        state.buffers.insert(id, buffer);
        id
    }

    fn delete_buffer(&self, buffer: BufferId) {
        if let Some(buffer) = self.state.borrow_mut().buffers.remove(&buffer) {
            buffer.destroy();
        }
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

    fn create_texture(&self, width: u32, height: u32, rgba: &[u8]) -> TextureId {
        let resource = TextureResource::create_from_rgba_data(
            &self.device,
            &self.queue,
            rgba,
            width,
            height,
            "Image Texture",
        );
        let mut state = self.state.borrow_mut();
        let id = TextureId(state.next());
        state.textures.insert(id, resource);
        id
    }

    fn delete_texture(&self, texture: TextureId) {
        let mut state = self.state.borrow_mut();
        if let Some(resource) = state.textures.remove(&texture) {
            resource.texture.destroy();
        }
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
        let entry = TargetEntry {
            color: TextureResource::create_color_target(&self.device, width, height, "Offscreen Color"),
            depth: TextureResource::create_depth_texture(&self.device, width, height, "Offscreen Depth"),
            width: width.max(1),
            height: height.max(1),
        };
        let mut state = self.state.borrow_mut();
        let id = RenderTargetId(state.next());
        state.targets.insert(id, entry);
        id
    }

    fn resize_render_target(&self, target: RenderTargetId, width: u32, height: u32) {
        let mut state = self.state.borrow_mut();
        if let Some(entry) = state.targets.get_mut(&target) {
            entry.color.texture.destroy();
            entry.depth.texture.destroy();
            *entry = TargetEntry {
                color: TextureResource::create_color_target(&self.device, width, height, "Offscreen Color"),
                depth: TextureResource::create_depth_texture(&self.device, width, height, "Offscreen Depth"),
                width: width.max(1),
                height: height.max(1),
            };
        }
    }

    fn delete_render_target(&self, target: RenderTargetId) {
        let mut state = self.state.borrow_mut();
        if let Some(entry) = state.targets.remove(&target) {
            entry.color.texture.destroy();
            entry.depth.texture.destroy();
        }
        if state.bound_target == Some(target) {
            state.bound_target = None;
        }
    }

    fn bind_render_target(&self, target: Option<RenderTargetId>) {
        self.state.borrow_mut().bound_target = target;
    }

    fn read_pixel(&self, target: RenderTargetId, x: u32, y: u32) -> Result<[u8; 4], GpuError> {
        // Offscreen work recorded so far must land before the copy
        self.flush(None);

        let color_texture = {
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
            entry.color.texture.clone()
        };

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pixel Readback"),
            size: READBACK_ROW_BYTES as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &color_texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(READBACK_ROW_BYTES),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| GpuError::Readback(e.to_string()))?;

        pollster::block_on(receiver)
            .map_err(|_| GpuError::Readback("map callback dropped".to_string()))?
            .map_err(|e| GpuError::Readback(e.to_string()))?;

        let pixel = {
            let data = slice.get_mapped_range();
            [data[0], data[1], data[2], data[3]]
        };
        readback.unmap();
        Ok(pixel)
    }

    fn set_uniform(&self, location: UniformLocation, value: UniformValue) {
        let mut state = self.state.borrow_mut();
        let Some(program) = state.current_program else {
            log::warn!("set_uniform called with no program in use");
            return;
        };
        let Some(entry) = state.programs.get_mut(&program) else {
            return;
        };

        match location {
            UniformLocation::Block { offset } => {
                let bytes = value.to_block_bytes();
                let start = offset as usize;
                let end = (start + bytes.len()).min(entry.block.len());
                if start < end {
                    entry.block[start..end].copy_from_slice(&bytes[..end - start]);
                }
            }
            UniformLocation::Texture { binding } => match value {
                UniformValue::Int(unit) if unit >= 0 => {
                    entry.texture_units.insert(binding, unit as u32);
                }
                other => log::warn!("texture uniform expects a unit index, got {:?}", other),
            },
        }
    }

    fn clear(&self, color: [f32; 4]) {
        let mut state = self.state.borrow_mut();
        let target = state.bound_target;
        state.commands.push(Command::Clear {
            target,
            color: wgpu::Color {
                r: color[0] as f64,
                g: color[1] as f64,
                b: color[2] as f64,
                a: color[3] as f64,
            },
        });
    }

    fn draw_indexed(&self, vertex_array: VertexArrayId, index_buffer: BufferId, count: u32) {
        let mut state = self.state.borrow_mut();
        let Some(program) = state.current_program else {
            log::warn!("draw skipped: no program in use");
            return;
        };
        let Some(entry) = state.programs.get(&program) else {
            return;
        };

        let block = entry.block.clone();
        let textures: Vec<(u32, Option<TextureId>)> = entry
            .interface
            .sorted_texture_bindings()
            .into_iter()
            .map(|binding| {
                let unit = entry.texture_units.get(&binding).copied().unwrap_or(0);
                (binding, state.texture_units.get(&unit).copied())
            })
            .collect();

        let uniform_offset = align_to(state.uniform_data.len(), self.uniform_alignment as usize);
        state.uniform_data.resize(uniform_offset, 0);
        state.uniform_data.extend_from_slice(&block);

        let target = state.bound_target;
        state.commands.push(Command::Draw(DrawCommand {
            target,
            program,
            vertex_array,
            index_buffer,
            count,
            uniform_offset: uniform_offset as u32,
            textures,
        }));
    }

    fn canvas_size(&self) -> (u32, u32) {
        let config = self.config.borrow();
        (config.width, config.height)
    }
}
