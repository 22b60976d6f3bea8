//! Shader programs
//!
//! A [`Program`] owns one compiled and linked vertex/fragment pair and the handles
//! it resolved for the attribute and uniform names it was asked about. Names the
//! shaders do not declare simply have no handle; callers treat the matching
//! vertex stream or uniform as absent.

use std::collections::HashMap;

use crate::{
    engine::Engine,
    error::GpuError,
    gfx::backend::{AttributeLocation, ProgramId, UniformLocation, UniformValue},
};

/// Compiled shader program with resolved attribute and uniform handles
pub struct Program {
    engine: Engine,
    id: ProgramId,
    attributes: HashMap<String, AttributeLocation>,
    uniforms: HashMap<String, UniformLocation>,
}

impl Program {
    /// Compiles and links `vertex` and `fragment`, then resolves the requested names
    ///
    /// # Arguments
    /// * `engine` - Engine whose backend compiles the program
    /// * `vertex` - WGSL source with a `@vertex` entry point
    /// * `fragment` - WGSL source with a `@fragment` entry point
    /// * `attributes` - Vertex attribute names to resolve
    /// * `uniforms` - Uniform and texture names to resolve
    ///
    /// # Errors
    /// Compilation and link failures are returned, and logged, since no draw can
    /// proceed without the program.
    pub fn load(
        engine: &Engine,
        vertex: &str,
        fragment: &str,
        attributes: &[&str],
        uniforms: &[&str],
    ) -> Result<Self, GpuError> {
        let backend = engine.backend();
        let id = backend.compile_program(vertex, fragment).inspect_err(|e| {
            log::error!("could not initialise shaders: {}", e);
        })?;

        let attributes = attributes
            .iter()
            .filter_map(|name| {
                let location = backend.attribute_location(id, name);
                if location.is_none() {
                    log::debug!("attribute '{}' is not used by the program", name);
                }
                location.map(|location| (name.to_string(), location))
            })
            .collect();

        let uniforms = uniforms
            .iter()
            .filter_map(|name| {
                let location = backend.uniform_location(id, name);
                if location.is_none() {
                    log::debug!("uniform '{}' is not used by the program", name);
                }
                location.map(|location| (name.to_string(), location))
            })
            .collect();

        Ok(Self {
            engine: engine.clone(),
            id,
            attributes,
            uniforms,
        })
    }

    /// Makes this program current
    pub fn use_program(&self) {
        self.engine.backend().use_program(self.id);
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn attribute(&self, name: &str) -> Option<AttributeLocation> {
        self.attributes.get(name).copied()
    }

    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied()
    }

    /// Writes a uniform by name; returns `false` if the program has no such uniform
    ///
    /// The program must be current.
    pub fn set_uniform(&self, name: &str, value: UniformValue) -> bool {
        match self.uniform(name) {
            Some(location) => {
                self.engine.backend().set_uniform(location, value);
                true
            }
            None => false,
        }
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        self.engine.backend().delete_program(self.id);
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.id)
            .field("attributes", &self.attributes)
            .field("uniforms", &self.uniforms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::MemorySource,
        engine::EngineConfig,
        error::ShaderStage,
        gfx::backend::reflect::tests::{FRAGMENT, VERTEX},
    };
    use std::rc::Rc;

    fn engine() -> (Engine, Rc<crate::gfx::backend::HeadlessBackend>) {
        Engine::headless(Rc::new(MemorySource::new()), EngineConfig::default())
    }

    #[test]
    fn test_resolves_requested_names() {
        let (engine, _) = engine();
        let program = Program::load(
            &engine,
            VERTEX,
            FRAGMENT,
            &["aVertexPosition", "aVertexNormal"],
            &["uModelViewMatrix", "uSampler0"],
        )
        .unwrap();

        assert_eq!(program.attribute("aVertexPosition"), Some(AttributeLocation(0)));
        assert_eq!(program.attribute("aVertexNormal"), Some(AttributeLocation(1)));
        assert_eq!(
            program.uniform("uModelViewMatrix"),
            Some(UniformLocation::Block { offset: 0 })
        );
        assert_eq!(
            program.uniform("uSampler0"),
            Some(UniformLocation::Texture { binding: 1 })
        );
    }

    #[test]
    fn test_unknown_names_have_no_handle() {
        let (engine, _) = engine();
        let program = Program::load(
            &engine,
            VERTEX,
            FRAGMENT,
            &["aVertexColor"],
            &["uLightPosition"],
        )
        .unwrap();

        assert_eq!(program.attribute("aVertexColor"), None);
        assert_eq!(program.uniform("uLightPosition"), None);
        // Names never requested are not resolved either
        assert_eq!(program.attribute("aVertexPosition"), None);
        assert!(!program.set_uniform("uLightPosition", UniformValue::Float(1.0)));
    }

    #[test]
    fn test_compile_failure_is_surfaced() {
        let (engine, backend) = engine();
        let err = Program::load(&engine, "fn broken(", FRAGMENT, &[], &[]).unwrap_err();
        assert!(matches!(
            err,
            GpuError::ShaderCompilation {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
        assert_eq!(backend.resource_counts().programs, 0);
    }

    #[test]
    fn test_use_program_and_drop() {
        let (engine, backend) = engine();
        let program = Program::load(&engine, VERTEX, FRAGMENT, &[], &["uMaterialDiffuse"]).unwrap();
        program.use_program();
        assert_eq!(backend.current_program(), Some(program.id()));
        assert!(program.set_uniform("uMaterialDiffuse", UniformValue::Vec4([0.5; 4])));

        drop(program);
        assert_eq!(backend.resource_counts().programs, 0);
        assert_eq!(backend.current_program(), None);
    }
}
