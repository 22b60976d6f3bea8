//! WGSL reflection
//!
//! Resolves the names a program exposes, using naga to parse and validate both
//! shader sources. The binding conventions are:
//!
//! - vertex attributes are `@location` inputs of the vertex entry point, either as
//!   plain arguments or as members of an input struct
//! - uniforms are members of the struct bound at `@group(0) @binding(0)` in the
//!   `uniform` address space (a non-struct uniform is exposed under its own name)
//! - textures are `texture_2d` globals in `@group(1)`; a shared sampler sits at
//!   `@group(1) @binding(0)`

use std::collections::HashMap;

use crate::error::{GpuError, ShaderStage};

pub const UNIFORM_GROUP: u32 = 0;
pub const UNIFORM_BINDING: u32 = 0;
pub const TEXTURE_GROUP: u32 = 1;
pub const SAMPLER_BINDING: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeInfo {
    pub location: u32,
    pub components: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformInfo {
    pub offset: u32,
    pub size: u32,
}

/// Everything a backend needs to know about a linked program
#[derive(Debug, Clone, Default)]
pub struct ShaderInterface {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub attributes: HashMap<String, AttributeInfo>,
    pub uniforms: HashMap<String, UniformInfo>,
    /// Size in bytes of the uniform block, 0 when the program has none
    pub uniform_block_size: u32,
    /// Texture name to binding slot in the texture group
    pub textures: HashMap<String, u32>,
}

impl ShaderInterface {
    /// Attribute locations ordered by location
    pub fn sorted_attributes(&self) -> Vec<AttributeInfo> {
        let mut attributes: Vec<AttributeInfo> = self.attributes.values().copied().collect();
        attributes.sort_by_key(|a| a.location);
        attributes
    }

    /// Texture bindings ordered by slot
    pub fn sorted_texture_bindings(&self) -> Vec<u32> {
        let mut bindings: Vec<u32> = self.textures.values().copied().collect();
        bindings.sort_unstable();
        bindings
    }
}

/// Parses and validates one WGSL source
pub fn parse_module(stage: ShaderStage, source: &str) -> Result<naga::Module, GpuError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| {
        GpuError::ShaderCompilation {
            stage,
            message: e.emit_to_string(source),
        }
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| GpuError::ShaderCompilation {
        stage,
        message: e.to_string(),
    })?;

    Ok(module)
}

/// Compiles and links a vertex and fragment source into a [`ShaderInterface`]
pub fn reflect_program(vertex: &str, fragment: &str) -> Result<ShaderInterface, GpuError> {
    let vertex_module = parse_module(ShaderStage::Vertex, vertex)?;
    let fragment_module = parse_module(ShaderStage::Fragment, fragment)?;

    let vertex_entry = vertex_module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Vertex)
        .ok_or_else(|| GpuError::ProgramLink("no vertex entry point".to_string()))?;
    let fragment_entry = fragment_module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Fragment)
        .ok_or_else(|| GpuError::ProgramLink("no fragment entry point".to_string()))?;

    let mut interface = ShaderInterface {
        vertex_entry: vertex_entry.name.clone(),
        fragment_entry: fragment_entry.name.clone(),
        attributes: vertex_attributes(&vertex_module, vertex_entry),
        ..Default::default()
    };

    for module in [&vertex_module, &fragment_module] {
        let (uniforms, block_size) = uniform_block(module);
        for (name, info) in uniforms {
            match interface.uniforms.get(&name) {
                Some(existing) if *existing != info => {
                    return Err(GpuError::ProgramLink(format!(
                        "uniform '{}' has different layouts in the vertex and fragment stages",
                        name
                    )));
                }
                Some(_) => {}
                None => {
                    interface.uniforms.insert(name, info);
                }
            }
        }
        interface.uniform_block_size = interface.uniform_block_size.max(block_size);
        interface.textures.extend(textures(module));
    }

    Ok(interface)
}

fn components(inner: &naga::TypeInner) -> u32 {
    match inner {
        naga::TypeInner::Scalar(_) => 1,
        naga::TypeInner::Vector { size, .. } => *size as u32,
        _ => 4,
    }
}

fn vertex_attributes(
    module: &naga::Module,
    entry: &naga::EntryPoint,
) -> HashMap<String, AttributeInfo> {
    let mut attributes = HashMap::new();

    for argument in &entry.function.arguments {
        match (&argument.binding, &module.types[argument.ty].inner) {
            (Some(naga::Binding::Location { location, .. }), inner) => {
                if let Some(name) = &argument.name {
                    attributes.insert(
                        name.clone(),
                        AttributeInfo {
                            location: *location,
                            components: components(inner),
                        },
                    );
                }
            }
            (None, naga::TypeInner::Struct { members, .. }) => {
                for member in members {
                    if let (Some(naga::Binding::Location { location, .. }), Some(name)) =
                        (&member.binding, &member.name)
                    {
                        attributes.insert(
                            name.clone(),
                            AttributeInfo {
                                location: *location,
                                components: components(&module.types[member.ty].inner),
                            },
                        );
                    }
                }
            }
            _ => {}
        }
    }

    attributes
}

fn uniform_block(module: &naga::Module) -> (Vec<(String, UniformInfo)>, u32) {
    for (_, global) in module.global_variables.iter() {
        let is_block = global.space == naga::AddressSpace::Uniform
            && global
                .binding
                .as_ref()
                .is_some_and(|b| b.group == UNIFORM_GROUP && b.binding == UNIFORM_BINDING);
        if !is_block {
            continue;
        }

        let ty = &module.types[global.ty];
        return match &ty.inner {
            naga::TypeInner::Struct { members, span } => {
                let mut uniforms = Vec::with_capacity(members.len());
                for (i, member) in members.iter().enumerate() {
                    let end = members.get(i + 1).map_or(*span, |next| next.offset);
                    if let Some(name) = &member.name {
                        uniforms.push((
                            name.clone(),
                            UniformInfo {
                                offset: member.offset,
                                size: end - member.offset,
                            },
                        ));
                    }
                }
                (uniforms, *span)
            }
            inner => {
                let size = components(inner) * 4;
                let name = global.name.clone().unwrap_or_default();
                (vec![(name, UniformInfo { offset: 0, size })], size)
            }
        };
    }

    (Vec::new(), 0)
}

fn textures(module: &naga::Module) -> Vec<(String, u32)> {
    module
        .global_variables
        .iter()
        .filter_map(|(_, global)| {
            let binding = global.binding.as_ref()?;
            if binding.group != TEXTURE_GROUP {
                return None;
            }
            match module.types[global.ty].inner {
                naga::TypeInner::Image { .. } => Some((global.name.clone()?, binding.binding)),
                _ => None,
            }
        })
        .collect()
}
