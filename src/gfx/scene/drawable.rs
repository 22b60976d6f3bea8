//! Drawable objects and the geometry they are built from

use cgmath::Vector3;
use serde::Deserialize;

use crate::{
    engine::Engine,
    gfx::{
        backend::{BufferId, VertexArrayId},
        resources::Texture,
    },
};

/// Geometry description, as found in geometry JSON files
///
/// Only `vertices` and `indices` are required; unknown fields are ignored.
/// Material values may use either the descriptive names or their OBJ
/// counterparts (`Kd`, `Ka`, `Ks`, `Ns`, `d`). Colors may have three or four
/// components.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryDesc {
    #[serde(default)]
    pub alias: Option<String>,
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    #[serde(default)]
    pub normals: Option<Vec<f32>>,
    #[serde(default)]
    pub texture_coords: Option<Vec<f32>>,
    /// Per-vertex RGBA colors
    #[serde(default)]
    pub scalars: Option<Vec<f32>>,
    /// Texture image path
    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub diffuse: Option<Vec<f32>>,
    #[serde(default, rename = "Kd")]
    pub kd: Option<Vec<f32>>,
    #[serde(default)]
    pub ambient: Option<Vec<f32>>,
    #[serde(default, rename = "Ka")]
    pub ka: Option<Vec<f32>>,
    #[serde(default)]
    pub specular: Option<Vec<f32>>,
    #[serde(default, rename = "Ks")]
    pub ks: Option<Vec<f32>>,
    #[serde(default)]
    pub specular_exponent: Option<f32>,
    #[serde(default, rename = "Ns")]
    pub ns: Option<f32>,
    #[serde(default)]
    pub transparency: Option<f32>,
    #[serde(default)]
    pub d: Option<f32>,
    #[serde(default)]
    pub illum: Option<u32>,
}

/// Per-object overrides applied on top of a [`GeometryDesc`] when it is added
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectAttributes {
    pub alias: Option<String>,
    pub visible: Option<bool>,
    pub diffuse: Option<[f32; 4]>,
    pub ambient: Option<[f32; 4]>,
    pub specular: Option<[f32; 4]>,
    pub specular_exponent: Option<f32>,
    pub transparency: Option<f32>,
    pub illum: Option<u32>,
    pub image: Option<String>,
    pub position: Option<Vector3<f32>>,
    pub scale: Option<Vector3<f32>>,
    /// Euler angles in degrees
    pub rotate: Option<Vector3<f32>>,
    pub picking_color: Option<[f32; 4]>,
}

/// Surface properties with every value resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Default: `[1, 1, 1, 1]`
    pub diffuse: [f32; 4],
    /// Default: `[0.2, 0.2, 0.2, 1]`
    pub ambient: [f32; 4],
    /// Default: `[1, 1, 1, 1]`
    pub specular: [f32; 4],
    /// Default: 0
    pub specular_exponent: f32,
    /// Opacity. Default: 1
    pub transparency: f32,
    /// Illumination model. Default: 1
    pub illum: u32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse: [1.0, 1.0, 1.0, 1.0],
            ambient: [0.2, 0.2, 0.2, 1.0],
            specular: [1.0, 1.0, 1.0, 1.0],
            specular_exponent: 0.0,
            transparency: 1.0,
            illum: 1,
        }
    }
}

fn rgba(values: &[f32]) -> Option<[f32; 4]> {
    match values {
        [r, g, b] => Some([*r, *g, *b, 1.0]),
        [r, g, b, a, ..] => Some([*r, *g, *b, *a]),
        _ => None,
    }
}

impl Material {
    /// Resolves the material of `desc`, filling defaults only for absent values
    pub fn from_desc(desc: &GeometryDesc) -> Self {
        let defaults = Self::default();
        let color = |named: &Option<Vec<f32>>, obj: &Option<Vec<f32>>, fallback| {
            named
                .as_deref()
                .and_then(rgba)
                .or_else(|| obj.as_deref().and_then(rgba))
                .unwrap_or(fallback)
        };

        Self {
            diffuse: color(&desc.diffuse, &desc.kd, defaults.diffuse),
            ambient: color(&desc.ambient, &desc.ka, defaults.ambient),
            specular: color(&desc.specular, &desc.ks, defaults.specular),
            specular_exponent: desc
                .specular_exponent
                .or(desc.ns)
                .unwrap_or(defaults.specular_exponent),
            transparency: desc.transparency.or(desc.d).unwrap_or(defaults.transparency),
            illum: desc.illum.unwrap_or(defaults.illum),
        }
    }

    /// Applies the material overrides of `attributes`
    pub fn apply(&mut self, attributes: &ObjectAttributes) {
        if let Some(diffuse) = attributes.diffuse {
            self.diffuse = diffuse;
        }
        if let Some(ambient) = attributes.ambient {
            self.ambient = ambient;
        }
        if let Some(specular) = attributes.specular {
            self.specular = specular;
        }
        if let Some(exponent) = attributes.specular_exponent {
            self.specular_exponent = exponent;
        }
        if let Some(transparency) = attributes.transparency {
            self.transparency = transparency;
        }
        if let Some(illum) = attributes.illum {
            self.illum = illum;
        }
    }

    /// Diffuse color without alpha, as OBJ's `Kd`
    pub fn kd(&self) -> [f32; 3] {
        [self.diffuse[0], self.diffuse[1], self.diffuse[2]]
    }

    pub fn ka(&self) -> [f32; 3] {
        [self.ambient[0], self.ambient[1], self.ambient[2]]
    }

    pub fn ks(&self) -> [f32; 3] {
        [self.specular[0], self.specular[1], self.specular[2]]
    }
}

/// Identity of a drawable, unique within the scene that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// GPU handles owned by a drawable
#[derive(Debug, Clone, PartialEq)]
pub struct GpuHandles {
    pub vertex_array: VertexArrayId,
    pub index_buffer: BufferId,
    /// Vertex buffers, one per stream
    pub buffers: Vec<BufferId>,
    pub index_count: u32,
}

/// An entry of the scene registry
#[derive(Debug)]
pub struct DrawableObject {
    pub(crate) id: ObjectId,
    pub alias: String,
    pub visible: bool,
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    /// Supplied or computed per-vertex normals
    pub normals: Vec<f32>,
    pub texture_coords: Option<Vec<f32>>,
    pub tangents: Option<Vec<f32>>,
    pub scalars: Option<Vec<f32>>,
    pub material: Material,
    pub image: Option<String>,
    /// Present once the image has loaded
    pub texture: Option<Texture>,
    pub position: Option<Vector3<f32>>,
    pub scale: Option<Vector3<f32>>,
    pub rotate: Option<Vector3<f32>>,
    pub picking_color: Option<[f32; 4]>,
    pub(crate) gpu: Option<GpuHandles>,
}

impl DrawableObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn gpu(&self) -> Option<&GpuHandles> {
        self.gpu.as_ref()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn is_disposed(&self) -> bool {
        self.gpu.is_none()
    }

    /// Binds the object's texture to unit 0, if loaded, and issues its indexed draw
    ///
    /// Uniforms, including matrices, must already be set on the current program.
    pub fn draw(&self, engine: &Engine) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        if let Some(texture) = &self.texture {
            texture.bind(0);
        }
        engine
            .backend()
            .draw_indexed(gpu.vertex_array, gpu.index_buffer, gpu.index_count);
    }

    /// Releases every GPU handle the object owns; safe to call more than once
    pub fn dispose(&mut self, engine: &Engine) {
        if let Some(gpu) = self.gpu.take() {
            let backend = engine.backend();
            backend.delete_vertex_array(gpu.vertex_array);
            backend.delete_buffer(gpu.index_buffer);
            for buffer in gpu.buffers {
                backend.delete_buffer(buffer);
            }
        }
        if let Some(mut texture) = self.texture.take() {
            texture.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_json_parses_with_obj_aliases() {
        let json = r#"{
            "alias": "cone",
            "vertices": [0, 0, 0, 1, 0, 0, 0, 1, 0],
            "indices": [0, 1, 2],
            "Kd": [0.5, 0.25, 0.125],
            "Ns": 8,
            "d": 0.5,
            "wireframe": true
        }"#;
        let desc: GeometryDesc = serde_json::from_str(json).unwrap();
        assert_eq!(desc.alias.as_deref(), Some("cone"));

        let material = Material::from_desc(&desc);
        assert_eq!(material.diffuse, [0.5, 0.25, 0.125, 1.0]);
        assert_eq!(material.specular_exponent, 8.0);
        assert_eq!(material.transparency, 0.5);
        assert_eq!(material.ambient, [0.2, 0.2, 0.2, 1.0]);
        assert_eq!(material.illum, 1);
    }

    #[test]
    fn test_descriptive_names_win_over_obj_aliases() {
        let desc = GeometryDesc {
            diffuse: Some(vec![0.1, 0.2, 0.3, 0.4]),
            kd: Some(vec![0.9, 0.9, 0.9]),
            specular_exponent: Some(2.0),
            ns: Some(50.0),
            ..Default::default()
        };
        let material = Material::from_desc(&desc);
        assert_eq!(material.diffuse, [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(material.specular_exponent, 2.0);
    }

    #[test]
    fn test_explicit_zeros_are_preserved() {
        let json = r#"{
            "vertices": [],
            "indices": [],
            "diffuse": [0, 0, 0, 0],
            "specularExponent": 0,
            "transparency": 0,
            "illum": 0
        }"#;
        let desc: GeometryDesc = serde_json::from_str(json).unwrap();
        let material = Material::from_desc(&desc);
        assert_eq!(material.diffuse, [0.0; 4]);
        assert_eq!(material.transparency, 0.0);
        assert_eq!(material.illum, 0);
        assert_eq!(material.kd(), [0.0; 3]);
    }

    #[test]
    fn test_attribute_overrides_replace_resolved_values() {
        let mut material = Material::default();
        material.apply(&ObjectAttributes {
            diffuse: Some([1.0, 0.0, 0.0, 1.0]),
            transparency: Some(0.25),
            ..Default::default()
        });
        assert_eq!(material.diffuse, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(material.transparency, 0.25);
        assert_eq!(material.specular, [1.0; 4]);
    }

    #[test]
    fn test_missing_required_arrays_fail_to_parse() {
        assert!(serde_json::from_str::<GeometryDesc>(r#"{"vertices": [0, 0, 0]}"#).is_err());
    }
}
