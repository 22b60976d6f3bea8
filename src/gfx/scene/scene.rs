use std::ops::ControlFlow;
use std::rc::Rc;

use crate::{
    engine::Engine,
    error::SceneError,
    gfx::{
        backend::{BufferKind, VertexStream},
        geometry::{calculate_normals, calculate_tangents},
        program::Program,
        resources::Texture,
    },
};

use super::drawable::{DrawableObject, GeometryDesc, GpuHandles, Material, ObjectAttributes, ObjectId};

/// Attribute names the scene feeds vertex streams to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneConfig {
    /// Default: `"aVertexPosition"`
    pub position_attribute: String,
    /// Default: `"aVertexNormal"`
    pub normal_attribute: String,
    /// Default: `"aVertexColor"`
    pub color_attribute: String,
    /// Default: `"aVertexTextureCoords"`
    pub texture_coords_attribute: String,
    /// Default: `"aVertexTangent"`
    pub tangent_attribute: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            position_attribute: "aVertexPosition".to_string(),
            normal_attribute: "aVertexNormal".to_string(),
            color_attribute: "aVertexColor".to_string(),
            texture_coords_attribute: "aVertexTextureCoords".to_string(),
            tangent_attribute: "aVertexTangent".to_string(),
        }
    }
}

impl SceneConfig {
    /// Every attribute name, for [`Program::load`]
    pub fn attribute_names(&self) -> [&str; 5] {
        [
            self.position_attribute.as_str(),
            self.normal_attribute.as_str(),
            self.color_attribute.as_str(),
            self.texture_coords_attribute.as_str(),
            self.tangent_attribute.as_str(),
        ]
    }
}

/// Ordered registry of drawable objects
///
/// The registry order is the draw order. Aliases are not required to be unique;
/// lookups by alias act on the first match.
pub struct Scene {
    engine: Engine,
    program: Rc<Program>,
    config: SceneConfig,
    objects: Vec<DrawableObject>,
    next_id: u64,
}

impl Scene {
    /// Creates an empty scene whose buffers follow the attributes `program` exposes
    pub fn new(engine: &Engine, program: Rc<Program>, config: SceneConfig) -> Self {
        Self {
            engine: engine.clone(),
            program,
            config,
            objects: Vec::new(),
            next_id: 1,
        }
    }

    pub fn program(&self) -> &Rc<Program> {
        &self.program
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects in draw order
    pub fn objects(&self) -> &[DrawableObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut DrawableObject> {
        self.objects.iter_mut()
    }

    /// First object with the given alias
    pub fn get(&self, alias: &str) -> Option<&DrawableObject> {
        self.objects.iter().find(|o| o.alias == alias)
    }

    pub fn get_mut(&mut self, alias: &str) -> Option<&mut DrawableObject> {
        self.objects.iter_mut().find(|o| o.alias == alias)
    }

    pub fn get_by_id(&self, id: ObjectId) -> Option<&DrawableObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    fn index_of(&self, alias: &str) -> Option<usize> {
        self.objects.iter().position(|o| o.alias == alias)
    }

    /// Adds `desc` to the end of the registry and uploads its buffers
    ///
    /// `attributes` override values from `desc`. Material values absent from both
    /// get their defaults. Streams the program has no attribute for are skipped.
    /// If the object has an image it is recorded but not fetched; see
    /// [`load_textures`](Self::load_textures).
    ///
    /// # Errors
    /// [`SceneError::InvalidGeometry`] when the arrays are inconsistent; nothing is
    /// added or allocated in that case.
    pub fn add(
        &mut self,
        desc: GeometryDesc,
        attributes: Option<ObjectAttributes>,
    ) -> Result<ObjectId, SceneError> {
        let attributes = attributes.unwrap_or_default();
        let alias = attributes
            .alias
            .clone()
            .or_else(|| desc.alias.clone())
            .unwrap_or_default();
        validate(&alias, &desc)?;
        let id = self.next_id();

        let mut material = Material::from_desc(&desc);
        material.apply(&attributes);

        let normals = match desc.normals {
            Some(normals) => normals,
            None => calculate_normals(&desc.vertices, &desc.indices),
        };

        let program = &self.program;
        let config = &self.config;
        let wants = |name: &str| program.attribute(name).is_some();

        let tangents = match &desc.texture_coords {
            Some(uvs) if wants(&config.tangent_attribute) => {
                Some(calculate_tangents(&desc.vertices, uvs, &desc.indices))
            }
            _ => None,
        };

        let mut object = DrawableObject {
            id,
            alias,
            visible: attributes.visible.unwrap_or(true),
            vertices: desc.vertices,
            indices: desc.indices,
            normals,
            texture_coords: desc.texture_coords,
            tangents,
            scalars: desc.scalars,
            material,
            image: attributes.image.or(desc.image),
            texture: None,
            position: attributes.position,
            scale: attributes.scale,
            rotate: attributes.rotate,
            picking_color: attributes.picking_color,
            gpu: None,
        };
        object.gpu = Some(self.upload(&object));

        let id = object.id;
        log::debug!("added '{}' ({} vertices)", object.alias, object.vertex_count());
        self.objects.push(object);
        Ok(id)
    }

    fn upload(&self, object: &DrawableObject) -> GpuHandles {
        let backend = self.engine.backend();
        let config = &self.config;

        let index_buffer =
            backend.create_buffer(BufferKind::Index, bytemuck::cast_slice(&object.indices));

        let streams_data: [(&str, Option<&Vec<f32>>, u32); 5] = [
            (config.position_attribute.as_str(), Some(&object.vertices), 3),
            (config.normal_attribute.as_str(), Some(&object.normals), 3),
            (config.color_attribute.as_str(), object.scalars.as_ref(), 4),
            (
                config.texture_coords_attribute.as_str(),
                object.texture_coords.as_ref(),
                2,
            ),
            (config.tangent_attribute.as_str(), object.tangents.as_ref(), 3),
        ];

        let mut buffers = Vec::new();
        let mut streams = Vec::new();
        for (name, data, components) in streams_data {
            let (Some(location), Some(data)) = (self.program.attribute(name), data) else {
                continue;
            };
            let buffer = backend.create_buffer(BufferKind::Vertex, bytemuck::cast_slice(data));
            buffers.push(buffer);
            streams.push(VertexStream {
                location,
                buffer,
                components,
            });
        }

        let vertex_array = backend.create_vertex_array(self.program.id(), &streams);

        GpuHandles {
            vertex_array,
            index_buffer,
            buffers,
            index_count: object.indices.len() as u32,
        }
    }

    /// Fetches a geometry file and adds it
    ///
    /// The loaded object is visible unless `attributes` say otherwise and takes
    /// `alias` when one is given. Its texture, if any, is loaded before this
    /// resolves.
    ///
    /// # Errors
    /// Fetch, parse and geometry errors are logged and returned; the registry is
    /// left unchanged.
    pub async fn load(
        &mut self,
        filename: &str,
        alias: Option<&str>,
        attributes: Option<ObjectAttributes>,
    ) -> Result<ObjectId, SceneError> {
        let result = self.load_desc(filename).await.and_then(|mut desc| {
            if let Some(alias) = alias {
                desc.alias = Some(alias.to_string());
            }
            let mut attributes = attributes.unwrap_or_default();
            attributes.visible.get_or_insert(true);
            self.add(desc, Some(attributes))
        });

        match result {
            Ok(id) => {
                self.load_texture(id).await;
                Ok(id)
            }
            Err(e) => {
                log::error!(
                    "failed to load {} (alias {:?}): {}",
                    filename,
                    alias,
                    e
                );
                Err(e)
            }
        }
    }

    async fn load_desc(&self, filename: &str) -> Result<GeometryDesc, SceneError> {
        let bytes = self.engine.assets().fetch(filename).await?;
        serde_json::from_slice(&bytes).map_err(|source| SceneError::Parse {
            path: filename.to_string(),
            source,
        })
    }

    /// Loads `{path}1.json` through `{path}{count}.json` under one alias
    ///
    /// Returns the ids of the parts that loaded; failed parts are logged.
    pub async fn load_by_parts(&mut self, path: &str, count: usize, alias: &str) -> Vec<ObjectId> {
        let mut loaded = Vec::with_capacity(count);
        for i in 1..=count {
            let part = format!("{}{}.json", path, i);
            if let Ok(id) = self.load(&part, Some(alias), None).await {
                loaded.push(id);
            }
        }
        loaded
    }

    async fn load_texture(&mut self, id: ObjectId) {
        let engine = self.engine.clone();
        let Some(object) = self.objects.iter_mut().find(|o| o.id == id) else {
            return;
        };
        let Some(url) = object.image.clone() else {
            return;
        };

        let mut texture = Texture::new(&engine);
        match texture.set_image(&url).await {
            Ok(()) => object.texture = Some(texture),
            Err(e) => log::error!("failed to load texture {} for '{}': {}", url, object.alias, e),
        }
    }

    /// Loads the image of every object that has one but no texture yet
    ///
    /// Failures are logged; the object stays in the scene without a texture.
    pub async fn load_textures(&mut self) {
        let pending: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|o| o.image.is_some() && o.texture.is_none())
            .map(|o| o.id)
            .collect();
        for id in pending {
            self.load_texture(id).await;
        }
    }

    /// Visits objects in order until `callback` breaks, returning the break value
    pub fn traverse<B>(
        &self,
        mut callback: impl FnMut(&DrawableObject, usize) -> ControlFlow<B>,
    ) -> Option<B> {
        for (index, object) in self.objects.iter().enumerate() {
            if let ControlFlow::Break(value) = callback(object, index) {
                return Some(value);
            }
        }
        None
    }

    /// Visits every object in order
    pub fn for_each(&self, mut callback: impl FnMut(&DrawableObject, usize)) {
        for (index, object) in self.objects.iter().enumerate() {
            callback(object, index);
        }
    }

    pub fn for_each_mut(&mut self, mut callback: impl FnMut(&mut DrawableObject, usize)) {
        for (index, object) in self.objects.iter_mut().enumerate() {
            callback(object, index);
        }
    }

    /// First object, in draw order, matching `predicate`
    pub fn find(&self, mut predicate: impl FnMut(&DrawableObject) -> bool) -> Option<&DrawableObject> {
        self.objects.iter().find(|o| predicate(o))
    }

    /// Removes the first object with `alias` and releases its GPU handles
    ///
    /// Returns `false` when no object has that alias.
    pub fn remove(&mut self, alias: &str) -> bool {
        let Some(index) = self.index_of(alias) else {
            return false;
        };
        let mut object = self.objects.remove(index);
        object.dispose(&self.engine);
        log::debug!("removed '{}'", alias);
        true
    }

    /// Removes and disposes every object
    pub fn clear(&mut self) {
        for mut object in self.objects.drain(..) {
            object.dispose(&self.engine);
        }
    }

    fn next_id(&mut self) -> ObjectId {
        let id = ObjectId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Moves the object to the front of the draw order
    pub fn render_first(&mut self, alias: &str) -> bool {
        match self.index_of(alias) {
            Some(index) if index > 0 => {
                let object = self.objects.remove(index);
                self.objects.insert(0, object);
                self.log_render_order();
                true
            }
            _ => false,
        }
    }

    /// Moves the object to the back of the draw order
    pub fn render_last(&mut self, alias: &str) -> bool {
        match self.index_of(alias) {
            Some(index) if index + 1 < self.objects.len() => {
                let object = self.objects.remove(index);
                self.objects.push(object);
                self.log_render_order();
                true
            }
            _ => false,
        }
    }

    /// Moves the object one place earlier in the draw order
    pub fn render_sooner(&mut self, alias: &str) -> bool {
        match self.index_of(alias) {
            Some(index) if index > 0 => {
                self.objects.swap(index, index - 1);
                self.log_render_order();
                true
            }
            _ => false,
        }
    }

    /// Moves the object one place later in the draw order
    pub fn render_later(&mut self, alias: &str) -> bool {
        match self.index_of(alias) {
            Some(index) if index + 1 < self.objects.len() => {
                self.objects.swap(index, index + 1);
                self.log_render_order();
                true
            }
            _ => false,
        }
    }

    /// Aliases in draw order
    pub fn render_order(&self) -> Vec<&str> {
        self.objects.iter().map(|o| o.alias.as_str()).collect()
    }

    fn log_render_order(&self) {
        log::debug!("render order: {}", self.render_order().join(" > "));
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("program", &self.program.id())
            .field("objects", &self.render_order())
            .finish()
    }
}

fn validate(alias: &str, desc: &GeometryDesc) -> Result<(), SceneError> {
    let invalid = |reason: String| SceneError::InvalidGeometry {
        alias: alias.to_string(),
        reason,
    };

    if desc.vertices.len() % 3 != 0 {
        return Err(invalid(format!(
            "{} vertex components is not a multiple of 3",
            desc.vertices.len()
        )));
    }
    if desc.indices.len() % 3 != 0 {
        return Err(invalid(format!(
            "{} indices do not form whole triangles",
            desc.indices.len()
        )));
    }

    let vertex_count = desc.vertices.len() / 3;
    if let Some(index) = desc.indices.iter().find(|i| **i as usize >= vertex_count) {
        return Err(invalid(format!(
            "index {} is out of range for {} vertices",
            index, vertex_count
        )));
    }

    let per_vertex = [
        ("normals", desc.normals.as_ref(), 3),
        ("textureCoords", desc.texture_coords.as_ref(), 2),
        ("scalars", desc.scalars.as_ref(), 4),
    ];
    for (name, data, components) in per_vertex {
        if let Some(data) = data {
            if data.len() != vertex_count * components {
                return Err(invalid(format!(
                    "{} has {} values, expected {}",
                    name,
                    data.len(),
                    vertex_count * components
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::MemorySource,
        engine::EngineConfig,
        error::AssetError,
        gfx::{
            backend::{reflect::tests::FRAGMENT, reflect::tests::VERTEX, HeadlessBackend},
            geometry,
            resources::texture::tests::png,
        },
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn triangle(alias: &str) -> GeometryDesc {
        GeometryDesc {
            alias: Some(alias.to_string()),
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 1, 2],
            ..Default::default()
        }
    }

    fn setup(assets: MemorySource) -> (Engine, Rc<HeadlessBackend>, Scene) {
        let (engine, backend) = Engine::headless(Rc::new(assets), EngineConfig::default());
        let config = SceneConfig::default();
        let program =
            Program::load(&engine, VERTEX, FRAGMENT, &config.attribute_names(), &[]).unwrap();
        let scene = Scene::new(&engine, Rc::new(program), config);
        (engine, backend, scene)
    }

    fn scene_with(aliases: &[&str]) -> Scene {
        let (_, _, mut scene) = setup(MemorySource::new());
        for alias in aliases {
            scene.add(triangle(alias), None).unwrap();
        }
        scene
    }

    #[test]
    fn test_render_first_then_last() {
        let mut scene = scene_with(&["plane", "floor"]);

        assert!(scene.render_first("floor"));
        assert_eq!(scene.render_order(), vec!["floor", "plane"]);

        assert!(scene.render_last("floor"));
        assert_eq!(scene.render_order(), vec!["plane", "floor"]);
    }

    #[test]
    fn test_reorder_at_boundary_is_noop() {
        let mut scene = scene_with(&["a", "b", "c"]);

        assert!(!scene.render_sooner("a"));
        assert!(!scene.render_first("a"));
        assert!(!scene.render_later("c"));
        assert!(!scene.render_last("c"));
        assert_eq!(scene.render_order(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sooner_and_later_move_one_place() {
        let mut scene = scene_with(&["a", "b", "c", "d"]);

        assert!(scene.render_sooner("c"));
        assert_eq!(scene.render_order(), vec!["a", "c", "b", "d"]);

        assert!(scene.render_later("a"));
        assert_eq!(scene.render_order(), vec!["c", "a", "b", "d"]);

        // Last element moves to the end even from the middle
        assert!(scene.render_last("a"));
        assert_eq!(scene.render_order(), vec!["c", "b", "d", "a"]);
    }

    #[test]
    fn test_reorder_missing_alias_is_noop() {
        let mut scene = scene_with(&["a", "b"]);
        assert!(!scene.render_first("zzz"));
        assert!(!scene.render_last("zzz"));
        assert!(!scene.render_sooner("zzz"));
        assert!(!scene.render_later("zzz"));
        assert_eq!(scene.render_order(), vec!["a", "b"]);
    }

    #[test]
    fn test_random_reorders_preserve_aliases() {
        let aliases = ["plane", "floor", "cone", "sphere", "wall", "plane"];
        let mut scene = scene_with(&aliases);
        let mut expected: Vec<&str> = aliases.to_vec();
        expected.sort_unstable();

        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..500 {
            let alias = aliases[rng.random_range(0..aliases.len())];
            match rng.random_range(0..4) {
                0 => scene.render_first(alias),
                1 => scene.render_last(alias),
                2 => scene.render_sooner(alias),
                _ => scene.render_later(alias),
            };

            let mut order = scene.render_order();
            order.sort_unstable();
            assert_eq!(order, expected);
        }
    }

    #[test]
    fn test_untouched_objects_keep_relative_order() {
        let mut scene = scene_with(&["a", "b", "c", "d", "e"]);
        scene.render_first("d");
        scene.render_last("b");
        let rest: Vec<&str> = scene
            .render_order()
            .into_iter()
            .filter(|a| *a != "d" && *a != "b")
            .collect();
        assert_eq!(rest, vec!["a", "c", "e"]);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let scene = scene_with(&["plane"]);
        assert!(scene.get("missing").is_none());
        assert!(scene.get("plane").is_some());
    }

    #[test]
    fn test_get_returns_first_duplicate() {
        let (_, _, mut scene) = setup(MemorySource::new());
        let first = scene.add(triangle("twin"), None).unwrap();
        scene.add(triangle("twin"), None).unwrap();
        assert_eq!(scene.get("twin").map(|o| o.id()), Some(first));

        assert!(scene.remove("twin"));
        assert_eq!(scene.len(), 1);
        assert_ne!(scene.get("twin").map(|o| o.id()), Some(first));
    }

    #[test]
    fn test_load_404_leaves_registry_unchanged() {
        let (_, backend, mut scene) = setup(MemorySource::new());
        scene.add(triangle("plane"), None).unwrap();
        let before = backend.resource_counts();

        let result = pollster::block_on(scene.load("/models/missing.json", Some("ghost"), None));
        assert!(matches!(
            result,
            Err(SceneError::Asset(AssetError::NotFound(_)))
        ));
        assert_eq!(scene.len(), 1);
        assert!(scene.get("ghost").is_none());
        assert_eq!(backend.resource_counts(), before);
    }

    #[test]
    fn test_load_bad_json_is_reported() {
        let assets = MemorySource::new().with("/broken.json", b"{ not json".to_vec());
        let (_, _, mut scene) = setup(assets);
        let result = pollster::block_on(scene.load("/broken.json", None, None));
        assert!(matches!(result, Err(SceneError::Parse { .. })));
        assert!(scene.is_empty());
    }

    #[test]
    fn test_load_applies_alias_visibility_and_texture() {
        let json = r#"{
            "alias": "original",
            "vertices": [0, 0, 0, 1, 0, 0, 1, 1, 0],
            "indices": [0, 1, 2],
            "textureCoords": [0, 0, 1, 0, 1, 1],
            "image": "/img/wall.png"
        }"#;
        let assets = MemorySource::new()
            .with("/models/wall.json", json.as_bytes().to_vec())
            .with("/img/wall.png", png(4, 4));
        let (_, backend, mut scene) = setup(assets);

        let attributes = ObjectAttributes {
            visible: Some(false),
            ..Default::default()
        };
        let id = pollster::block_on(scene.load("/models/wall.json", Some("wall"), Some(attributes)))
            .unwrap();

        let wall = scene.get("wall").unwrap();
        assert_eq!(wall.id(), id);
        assert!(!wall.visible);
        assert!(wall.texture.as_ref().is_some_and(Texture::is_loaded));
        assert_eq!(backend.resource_counts().textures, 1);
    }

    #[test]
    fn test_load_defaults_to_visible() {
        let json = r#"{"vertices": [0, 0, 0, 1, 0, 0, 1, 1, 0], "indices": [0, 1, 2]}"#;
        let assets = MemorySource::new().with("/models/tri.json", json.as_bytes().to_vec());
        let (_, _, mut scene) = setup(assets);

        pollster::block_on(scene.load("/models/tri.json", Some("shown"), None)).unwrap();
        let attributes = ObjectAttributes {
            alias: Some("tinted".to_string()),
            diffuse: Some([1.0, 0.0, 0.0, 1.0]),
            ..Default::default()
        };
        pollster::block_on(scene.load("/models/tri.json", None, Some(attributes))).unwrap();

        assert!(scene.get("shown").unwrap().visible);
        assert!(scene.get("tinted").unwrap().visible);
    }

    #[test]
    fn test_object_ids_are_unique_within_scene() {
        let (_, _, mut scene) = setup(MemorySource::new());
        let first = scene.add(triangle("a"), None).unwrap();
        let second = scene.add(triangle("b"), None).unwrap();
        scene.remove("a");
        let third = scene.add(triangle("c"), None).unwrap();

        assert_ne!(first, second);
        assert_ne!(first, third);
        assert_ne!(second, third);
        assert_eq!(scene.get("b").unwrap().id(), second);
    }

    #[test]
    fn test_failed_texture_keeps_object() {
        let mut desc = triangle("plain");
        desc.image = Some("/img/none.png".to_string());
        let (_, _, mut scene) = setup(MemorySource::new());
        scene.add(desc, None).unwrap();

        pollster::block_on(scene.load_textures());
        let object = scene.get("plain").unwrap();
        assert!(object.texture.is_none());
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_load_by_parts_reports_missing_parts() {
        let part = serde_json::to_vec(&serde_json::json!({
            "vertices": [0, 0, 0, 1, 0, 0, 0, 1, 0],
            "indices": [0, 1, 2]
        }))
        .unwrap();
        let assets = MemorySource::new()
            .with("/car/part1.json", part.clone())
            .with("/car/part3.json", part);
        let (_, _, mut scene) = setup(assets);

        let loaded = pollster::block_on(scene.load_by_parts("/car/part", 3, "car"));
        assert_eq!(loaded.len(), 2);
        assert_eq!(scene.render_order(), vec!["car", "car"]);
    }

    #[test]
    fn test_add_creates_streams_for_program_attributes() {
        let (_, backend, mut scene) = setup(MemorySource::new());
        let mut desc = triangle("colored");
        desc.scalars = Some(vec![1.0; 12]);
        desc.texture_coords = Some(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        scene.add(desc, None).unwrap();

        let object = scene.get("colored").unwrap();
        let gpu = object.gpu().unwrap();
        let streams = backend.vertex_streams(gpu.vertex_array).unwrap();
        let locations: Vec<u32> = streams.iter().map(|s| s.location.0).collect();

        // The test program declares position, normal and texture coordinates only
        assert_eq!(locations, vec![0, 1, 2]);
        assert_eq!(gpu.buffers.len(), 3);
        assert_eq!(gpu.index_count, 3);
        assert_eq!(backend.buffer_len(gpu.index_buffer), Some(12));
        assert!(object.tangents.is_none());
    }

    #[test]
    fn test_add_computes_missing_normals() {
        let (_, _, mut scene) = setup(MemorySource::new());
        scene.add(triangle("tri"), None).unwrap();
        let object = scene.get("tri").unwrap();
        assert_eq!(object.normals, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_add_keeps_supplied_normals() {
        let (_, _, mut scene) = setup(MemorySource::new());
        let floor = geometry::plane("floor", 10.0, 10.0, 1);
        let supplied = floor.normals.clone().unwrap();
        scene.add(floor, None).unwrap();
        assert_eq!(scene.get("floor").unwrap().normals, supplied);
    }

    #[test]
    fn test_invalid_geometry_is_rejected() {
        let (_, backend, mut scene) = setup(MemorySource::new());

        let mut out_of_range = triangle("bad");
        out_of_range.indices = vec![0, 1, 7];
        assert!(matches!(
            scene.add(out_of_range, None),
            Err(SceneError::InvalidGeometry { .. })
        ));

        let mut short_uvs = triangle("bad");
        short_uvs.texture_coords = Some(vec![0.0; 4]);
        assert!(scene.add(short_uvs, None).is_err());

        let mut ragged = triangle("bad");
        ragged.vertices.pop();
        assert!(scene.add(ragged, None).is_err());

        assert!(scene.is_empty());
        assert_eq!(backend.resource_counts().buffers, 0);
    }

    #[test]
    fn test_huge_index_is_rejected_before_derivation() {
        let (_, _, mut scene) = setup(MemorySource::new());
        let mut desc = triangle("far");
        desc.indices = vec![0, 1, u32::MAX];
        desc.texture_coords = Some(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);

        let err = scene.add(desc, None).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
        assert!(scene.is_empty());
    }

    #[test]
    fn test_remove_disposes_gpu_handles() {
        let (_, backend, mut scene) = setup(MemorySource::new());
        scene.add(geometry::cube("box"), None).unwrap();
        scene.add(triangle("tri"), None).unwrap();
        let with_both = backend.resource_counts();
        assert_eq!(with_both.vertex_arrays, 2);

        assert!(scene.remove("box"));
        assert!(!scene.remove("box"));
        let counts = backend.resource_counts();
        assert_eq!(counts.vertex_arrays, 1);
        // cube: index + position + normal + uv; triangle: index + position + normal
        assert_eq!(with_both.buffers, 7);
        assert_eq!(counts.buffers, 3);

        drop(scene);
        let counts = backend.resource_counts();
        assert_eq!(counts.vertex_arrays, 0);
        assert_eq!(counts.buffers, 0);
    }

    #[test]
    fn test_traverse_stops_at_first_break() {
        let scene = scene_with(&["a", "b", "c"]);
        let mut visited = Vec::new();
        let found = scene.traverse(|object, index| {
            visited.push(index);
            if object.alias == "b" {
                ControlFlow::Break(object.id())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(visited, vec![0, 1]);
        assert_eq!(found, scene.get("b").map(|o| o.id()));

        let mut count = 0;
        scene.for_each(|_, _| count += 1);
        assert_eq!(count, 3);
        assert_eq!(scene.find(|o| o.alias == "c").map(|o| o.alias.as_str()), Some("c"));
    }

    #[test]
    fn test_draw_issues_indexed_draw() {
        let (engine, backend, mut scene) = setup(MemorySource::new());
        scene.add(triangle("tri"), None).unwrap();
        scene.program().use_program();
        scene.for_each(|object, _| object.draw(&engine));

        let draws = backend.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].count, 3);
        assert_eq!(draws[0].program, Some(scene.program().id()));
    }
}
