use cgmath::*;

use super::camera_utils::{wrap_degrees, OPENGL_TO_WGPU_MATRIX};

/// How the camera position is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraKind {
    /// Position is derived from azimuth, elevation and radius around the focus
    #[default]
    Orbiting,
    /// Position is set directly; azimuth and elevation turn the camera in place
    Tracking,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    /// Default: [`CameraKind::Orbiting`]
    pub kind: CameraKind,
    /// Vertical field of view. Default: 45 degrees
    pub fov: Rad<f32>,
    /// Near clip plane. Default: 0.1
    pub near: f32,
    /// Far clip plane. Default: 10000
    pub far: f32,
    /// Largest elevation, in degrees, that pointer controls will reach. Default: 89
    pub elevation_limit: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            kind: CameraKind::Orbiting,
            fov: Deg(45.0).into(),
            near: 0.1,
            far: 10000.0,
            elevation_limit: 89.0,
        }
    }
}

/// Orbiting or tracking camera
///
/// Angles are in degrees. `matrix` is the camera-to-world transform; the view
/// transform is its inverse.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    kind: CameraKind,
    /// Unrotated eye position; the actual eye is this rotated about the focus
    /// for orbiting cameras
    position: Vector3<f32>,
    focus: Vector3<f32>,
    home: Vector3<f32>,
    up: Vector3<f32>,
    right: Vector3<f32>,
    normal: Vector3<f32>,
    matrix: Matrix4<f32>,
    azimuth: f32,
    elevation: f32,
    pub fov: Rad<f32>,
    pub near: f32,
    pub far: f32,
    pub elevation_limit: f32,
}

impl Camera {
    pub fn new(config: CameraConfig) -> Self {
        let mut camera = Self {
            kind: config.kind,
            position: Vector3::zero(),
            focus: Vector3::zero(),
            home: Vector3::zero(),
            up: Vector3::unit_y(),
            right: Vector3::unit_x(),
            normal: Vector3::unit_z(),
            matrix: Matrix4::identity(),
            azimuth: 0.0,
            elevation: 0.0,
            fov: config.fov,
            near: config.near,
            far: config.far,
            elevation_limit: config.elevation_limit,
        };
        camera.update();
        camera
    }

    pub fn kind(&self) -> CameraKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: CameraKind) {
        self.kind = kind;
        self.update();
    }

    pub fn is_orbiting(&self) -> bool {
        self.kind == CameraKind::Orbiting
    }

    /// Moves the camera to `home`, or to the stored home position when `None`,
    /// and resets azimuth and elevation
    pub fn go_home(&mut self, home: Option<Vector3<f32>>) {
        if let Some(home) = home {
            self.home = home;
        }
        self.position = self.home;
        self.azimuth = 0.0;
        self.elevation = 0.0;
        self.update();
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
        self.update();
    }

    pub fn set_focus(&mut self, focus: Vector3<f32>) {
        self.focus = focus;
        self.update();
    }

    pub fn set_azimuth(&mut self, azimuth: f32) {
        self.change_azimuth(azimuth - self.azimuth);
    }

    pub fn change_azimuth(&mut self, delta: f32) {
        self.azimuth = wrap_degrees(self.azimuth + delta);
        self.update();
    }

    pub fn set_elevation(&mut self, elevation: f32) {
        self.change_elevation(elevation - self.elevation);
    }

    pub fn change_elevation(&mut self, delta: f32) {
        self.elevation = wrap_degrees(self.elevation + delta);
        self.update();
    }

    /// Distance between the eye and the focus
    pub fn radius(&self) -> f32 {
        (self.position - self.focus).magnitude()
    }

    /// Moves the eye towards (`radius > current`) or away from the focus along
    /// the current eye direction
    ///
    /// Radii too small to give a usable view direction are ignored.
    pub fn set_radius(&mut self, radius: f32) {
        let offset = self.position - self.focus;
        let length = offset.magnitude();
        if radius <= f32::EPSILON || length <= f32::EPSILON {
            return;
        }
        self.position = self.focus + offset * (radius / length);
        self.update();
    }

    /// Moves the camera forward by `step`
    ///
    /// Orbiting cameras close in on the focus (never reaching it); tracking
    /// cameras travel along their view direction.
    pub fn dolly(&mut self, step: f32) {
        match self.kind {
            CameraKind::Orbiting => {
                let radius = (self.radius() - step).max(f32::EPSILON * 2.0);
                self.set_radius(radius);
            }
            CameraKind::Tracking => {
                self.position -= self.normal.normalize() * step;
                self.update();
            }
        }
    }

    fn update(&mut self) {
        let rotation =
            Matrix4::from_angle_y(Deg(self.azimuth)) * Matrix4::from_angle_x(Deg(self.elevation));

        self.matrix = match self.kind {
            CameraKind::Tracking => Matrix4::from_translation(self.position) * rotation,
            CameraKind::Orbiting => {
                Matrix4::from_translation(self.focus)
                    * rotation
                    * Matrix4::from_translation(self.position - self.focus)
            }
        };

        self.right = self.matrix.x.truncate();
        self.up = self.matrix.y.truncate();
        self.normal = self.matrix.z.truncate();
    }

    /// World-space eye position
    pub fn eye(&self) -> Vector3<f32> {
        self.matrix.w.truncate()
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn focus(&self) -> Vector3<f32> {
        self.focus
    }

    pub fn home(&self) -> Vector3<f32> {
        self.home
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn right(&self) -> Vector3<f32> {
        self.right
    }

    pub fn normal(&self) -> Vector3<f32> {
        self.normal
    }

    /// Camera-to-world transform
    pub fn matrix(&self) -> Matrix4<f32> {
        self.matrix
    }

    /// World-to-camera transform
    pub fn view_transform(&self) -> Matrix4<f32> {
        // Rigid transform: rotation transpose and negated translation
        let rotation = Matrix3::from_cols(self.right, self.up, self.normal).transpose();
        let translation = -(rotation * self.eye());
        let mut view = Matrix4::from(rotation);
        view.w = translation.extend(1.0);
        view
    }

    /// Perspective projection for a viewport of the given aspect ratio
    pub fn projection(&self, aspect: f32) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fov, aspect, self.near, self.far)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Vector3<f32>, b: Vector3<f32>) {
        assert!(
            (a - b).magnitude() < 1e-4,
            "expected {:?} to be close to {:?}",
            a,
            b
        );
    }

    fn tracking() -> Camera {
        Camera::new(CameraConfig {
            kind: CameraKind::Tracking,
            ..Default::default()
        })
    }

    #[test]
    fn test_go_home_resets_orientation() {
        let mut camera = Camera::default();
        camera.set_azimuth(30.0);
        camera.set_elevation(-20.0);
        camera.go_home(Some(Vector3::new(0.0, 2.0, 50.0)));

        assert_eq!(camera.azimuth(), 0.0);
        assert_eq!(camera.elevation(), 0.0);
        assert_close(camera.eye(), Vector3::new(0.0, 2.0, 50.0));

        camera.set_position(Vector3::new(0.0, 0.0, 10.0));
        camera.go_home(None);
        assert_close(camera.eye(), Vector3::new(0.0, 2.0, 50.0));
    }

    #[test]
    fn test_orbiting_azimuth_rotates_about_focus() {
        let mut camera = Camera::default();
        camera.set_focus(Vector3::new(1.0, 0.0, 0.0));
        camera.go_home(Some(Vector3::new(1.0, 0.0, 10.0)));
        camera.set_azimuth(90.0);

        assert_close(camera.eye(), Vector3::new(11.0, 0.0, 0.0));
        assert!((camera.radius() - 10.0).abs() < 1e-4);
        // Still looking at the focus
        assert_close(camera.normal(), Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_orbiting_elevation_raises_eye() {
        let mut camera = Camera::default();
        camera.go_home(Some(Vector3::new(0.0, 0.0, 10.0)));
        camera.set_elevation(-90.0);
        assert_close(camera.eye(), Vector3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn test_angles_wrap_past_full_turn() {
        let mut camera = Camera::default();
        camera.change_azimuth(350.0);
        camera.change_azimuth(20.0);
        assert!((camera.azimuth() - 10.0).abs() < 1e-4);

        camera.set_elevation(-400.0);
        assert!((camera.elevation() + 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_tracking_turns_in_place() {
        let mut camera = tracking();
        camera.go_home(Some(Vector3::new(0.0, 0.0, 5.0)));
        camera.set_azimuth(90.0);
        assert_close(camera.eye(), Vector3::new(0.0, 0.0, 5.0));
        assert_close(camera.normal(), Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_dolly() {
        let mut orbiting = Camera::default();
        orbiting.go_home(Some(Vector3::new(0.0, 0.0, 10.0)));
        orbiting.dolly(4.0);
        assert!((orbiting.radius() - 6.0).abs() < 1e-4);
        orbiting.dolly(100.0);
        assert!(orbiting.radius() > 0.0);

        let mut tracking = tracking();
        tracking.go_home(Some(Vector3::new(0.0, 0.0, 10.0)));
        tracking.dolly(4.0);
        assert_close(tracking.eye(), Vector3::new(0.0, 0.0, 6.0));
    }

    #[test]
    fn test_view_transform_inverts_matrix() {
        let mut camera = Camera::default();
        camera.set_focus(Vector3::new(1.0, 2.0, 3.0));
        camera.go_home(Some(Vector3::new(1.0, 2.0, 13.0)));
        camera.set_azimuth(40.0);
        camera.set_elevation(-25.0);

        let product = camera.view_transform() * camera.matrix();
        for (column, expected) in [
            Vector4::unit_x(),
            Vector4::unit_y(),
            Vector4::unit_z(),
            Vector4::unit_w(),
        ]
        .into_iter()
        .enumerate()
        {
            assert!((product[column] - expected).magnitude() < 1e-4);
        }

        // The focus sits straight ahead of the eye
        let focus = camera.view_transform() * camera.focus().extend(1.0);
        assert!(focus.x.abs() < 1e-3 && focus.y.abs() < 1e-3);
        assert!((focus.z + 10.0).abs() < 1e-3);
    }
}
