//! Model-view matrix stack
//!
//! [`Transforms`] keeps the model-view stack, the projection matrix and the
//! derived normal matrix, and uploads all three to the active [`Program`].
//!
//! A typical frame:
//!
//! ```ignore
//! transforms.calculate_model_view(&camera);
//! scene.for_each(|object, _| {
//!     transforms.push();
//!     transforms.translate(object.position);
//!     transforms.set_matrix_uniforms(&program);
//!     transforms.pop();
//!     object.draw(&engine);
//! });
//! ```

use cgmath::*;

use crate::{
    engine::Engine,
    gfx::{
        backend::UniformValue,
        camera::{
            camera_utils::{convert_matrix3_to_array, convert_matrix4_to_array},
            Camera,
        },
        program::Program,
    },
};

/// Uniform names the matrices are uploaded to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformsConfig {
    /// Default: `"uModelViewMatrix"`
    pub model_view_uniform: String,
    /// Default: `"uNormalMatrix"`
    pub normal_uniform: String,
    /// Default: `"uProjectionMatrix"`
    pub projection_uniform: String,
}

impl Default for TransformsConfig {
    fn default() -> Self {
        Self {
            model_view_uniform: "uModelViewMatrix".to_string(),
            normal_uniform: "uNormalMatrix".to_string(),
            projection_uniform: "uProjectionMatrix".to_string(),
        }
    }
}

pub struct Transforms {
    engine: Engine,
    config: TransformsConfig,
    /// Never empty; the last entry is the current model-view matrix
    stack: Vec<Matrix4<f32>>,
    projection: Matrix4<f32>,
}

impl Transforms {
    pub fn new(engine: &Engine, config: TransformsConfig) -> Self {
        Self {
            engine: engine.clone(),
            config,
            stack: vec![Matrix4::identity()],
            projection: Matrix4::identity(),
        }
    }

    pub fn config(&self) -> &TransformsConfig {
        &self.config
    }

    /// Resets the stack to the camera's view transform
    pub fn calculate_model_view(&mut self, camera: &Camera) {
        self.stack.clear();
        self.stack.push(camera.view_transform());
    }

    /// Recomputes the projection from the canvas aspect ratio and the camera
    ///
    /// Call on every canvas resize or field-of-view change.
    pub fn update_perspective(&mut self, camera: &Camera) {
        self.projection = camera.projection(self.engine.aspect_ratio());
    }

    /// Duplicates the top matrix
    pub fn push(&mut self) {
        let top = self.model_view();
        self.stack.push(top);
    }

    /// Discards the top matrix
    ///
    /// The bottom matrix is never popped; an unbalanced pop is logged and ignored.
    pub fn pop(&mut self) -> Option<Matrix4<f32>> {
        if self.stack.len() <= 1 {
            log::warn!("matrix stack underflow: pop without matching push");
            return None;
        }
        self.stack.pop()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn model_view(&self) -> Matrix4<f32> {
        self.stack.last().copied().unwrap_or_else(Matrix4::identity)
    }

    /// Replaces the top matrix
    pub fn set_model_view(&mut self, matrix: Matrix4<f32>) {
        if let Some(top) = self.stack.last_mut() {
            *top = matrix;
        }
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection
    }

    /// Inverse-transpose of the upper 3x3 of the model-view matrix
    ///
    /// Falls back to the upper 3x3 itself when it is singular.
    pub fn normal_matrix(&self) -> Matrix3<f32> {
        let m = self.model_view();
        let upper = Matrix3::from_cols(m.x.truncate(), m.y.truncate(), m.z.truncate());
        upper
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or(upper)
    }

    fn apply(&mut self, transform: Matrix4<f32>) {
        let top = self.model_view() * transform;
        self.set_model_view(top);
    }

    pub fn translate(&mut self, offset: Vector3<f32>) {
        self.apply(Matrix4::from_translation(offset));
    }

    pub fn scale(&mut self, factors: Vector3<f32>) {
        self.apply(Matrix4::from_nonuniform_scale(factors.x, factors.y, factors.z));
    }

    pub fn rotate_x(&mut self, angle: impl Into<Rad<f32>>) {
        self.apply(Matrix4::from_angle_x(angle));
    }

    pub fn rotate_y(&mut self, angle: impl Into<Rad<f32>>) {
        self.apply(Matrix4::from_angle_y(angle));
    }

    pub fn rotate_z(&mut self, angle: impl Into<Rad<f32>>) {
        self.apply(Matrix4::from_angle_z(angle));
    }

    /// Uploads model-view, normal and projection matrices to `program`
    ///
    /// `program` must be current. Uniforms it does not declare are skipped.
    pub fn set_matrix_uniforms(&self, program: &Program) {
        program.set_uniform(
            &self.config.model_view_uniform,
            UniformValue::Mat4(convert_matrix4_to_array(self.model_view())),
        );
        program.set_uniform(
            &self.config.projection_uniform,
            UniformValue::Mat4(convert_matrix4_to_array(self.projection)),
        );
        program.set_uniform(
            &self.config.normal_uniform,
            UniformValue::Mat3(convert_matrix3_to_array(self.normal_matrix())),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::MemorySource,
        engine::EngineConfig,
        gfx::backend::{
            reflect::tests::{FRAGMENT, VERTEX},
            HeadlessBackend,
        },
    };
    use std::rc::Rc;

    fn setup() -> (Engine, Rc<HeadlessBackend>, Transforms) {
        let (engine, backend) =
            Engine::headless(Rc::new(MemorySource::new()), EngineConfig::default());
        let transforms = Transforms::new(&engine, TransformsConfig::default());
        (engine, backend, transforms)
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn test_push_pop_restores_top() {
        let (_, _, mut transforms) = setup();
        let camera = Camera::default();
        transforms.calculate_model_view(&camera);
        let base = transforms.model_view();

        transforms.push();
        transforms.translate(Vector3::new(1.0, 2.0, 3.0));
        transforms.rotate_y(Deg(30.0));
        assert_eq!(transforms.depth(), 2);
        assert_ne!(transforms.model_view(), base);

        transforms.pop();
        assert_eq!(transforms.depth(), 1);
        assert_eq!(transforms.model_view(), base);
    }

    #[test]
    fn test_pop_never_empties_stack() {
        let (_, _, mut transforms) = setup();
        assert_eq!(transforms.pop(), None);
        assert_eq!(transforms.depth(), 1);
        assert_eq!(transforms.model_view(), Matrix4::identity());
    }

    #[test]
    fn test_normal_matrix_undoes_nonuniform_scale() {
        let (_, _, mut transforms) = setup();
        transforms.scale(Vector3::new(2.0, 1.0, 1.0));
        let normal = transforms.normal_matrix();
        assert!((normal.x.x - 0.5).abs() < 1e-6);
        assert!((normal.y.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_update_perspective_uses_canvas_aspect() {
        let (_, backend, mut transforms) = setup();
        let camera = Camera::default();

        backend.set_canvas_size(400, 400);
        transforms.update_perspective(&camera);
        let square = transforms.projection();

        backend.set_canvas_size(800, 400);
        transforms.update_perspective(&camera);
        let wide = transforms.projection();

        assert!((wide.x.x * 2.0 - square.x.x).abs() < 1e-5);
        assert_eq!(wide.y.y, square.y.y);
    }

    #[test]
    fn test_set_matrix_uniforms_uploads_all_three() {
        let (engine, backend, mut transforms) = setup();
        let program = Program::load(
            &engine,
            VERTEX,
            FRAGMENT,
            &[],
            &["uModelViewMatrix", "uProjectionMatrix", "uNormalMatrix"],
        )
        .unwrap();
        program.use_program();

        transforms.translate(Vector3::new(4.0, 5.0, 6.0));
        transforms.update_perspective(&Camera::default());
        transforms.set_matrix_uniforms(&program);

        let block = floats(&backend.uniform_block(program.id()).unwrap());
        // Model-view translation column
        assert_eq!(&block[12..16], &[4.0, 5.0, 6.0, 1.0]);
        // Projection starts at byte 64
        assert_eq!(block[16], transforms.projection().x.x);
        // Normal matrix at byte 128 is identity, padded to vec4 columns
        assert_eq!(&block[32..36], &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(&block[36..40], &[0.0, 1.0, 0.0, 0.0]);
    }
}
