use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
};

use super::camera::{Camera, CameraKind};

/// Wheel lines one pinch unit is worth
const PINCH_SCALE: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlsConfig {
    /// Degrees of rotation per canvas-width of drag, divided by 20. Default: 10
    pub motion_factor: f32,
    /// Fraction of the current radius one wheel line moves the camera. Default: 0.1
    pub dolly_factor: f32,
    /// Closest an orbiting camera may get to its focus. Default: 0.1
    pub min_radius: f32,
    /// Farthest an orbiting camera may get from its focus. Default: `f32::MAX`
    pub max_radius: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            motion_factor: 10.0,
            dolly_factor: 0.1,
            min_radius: 0.1,
            max_radius: f32::MAX,
        }
    }
}

/// Maps pointer drags to azimuth/elevation and wheel or pinch to dolly
#[derive(Debug, Clone)]
pub struct Controls {
    pub config: ControlsConfig,
    dragging: bool,
    last_position: Option<(f64, f64)>,
    cursor: Option<(f64, f64)>,
}

impl Controls {
    pub fn new(config: ControlsConfig) -> Self {
        Self {
            config,
            dragging: false,
            last_position: None,
            cursor: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Last known cursor position in physical pixels, top-left origin
    pub fn cursor(&self) -> Option<(f64, f64)> {
        self.cursor
    }

    pub fn begin_drag(&mut self, x: f64, y: f64) {
        self.dragging = true;
        self.last_position = Some((x, y));
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
        self.last_position = None;
    }

    /// Rotates the camera by the motion since the previous drag position
    ///
    /// Returns whether the camera changed.
    pub fn drag_to(&mut self, camera: &mut Camera, x: f64, y: f64, canvas: (u32, u32)) -> bool {
        if !self.dragging {
            return false;
        }
        let Some((last_x, last_y)) = self.last_position.replace((x, y)) else {
            return false;
        };
        self.rotate(camera, (x - last_x) as f32, (y - last_y) as f32, canvas);
        true
    }

    /// Applies a drag of `dx`, `dy` pixels on a canvas of size `canvas`
    pub fn rotate(&self, camera: &mut Camera, dx: f32, dy: f32, canvas: (u32, u32)) {
        let (width, height) = (canvas.0.max(1) as f32, canvas.1.max(1) as f32);
        let d_azimuth = dx * (-20.0 / width) * self.config.motion_factor;
        let d_elevation = dy * (-20.0 / height) * self.config.motion_factor;

        camera.change_azimuth(d_azimuth);

        let limit = camera.elevation_limit;
        let elevation = (camera.elevation() + d_elevation).clamp(-limit, limit);
        camera.set_elevation(elevation);
    }

    /// Moves the camera `amount` wheel lines closer (positive) or farther
    pub fn dolly(&self, camera: &mut Camera, amount: f32) {
        match camera.kind() {
            CameraKind::Orbiting => {
                let radius = camera.radius();
                let step = amount * self.config.dolly_factor * radius;
                let target = (radius - step).clamp(self.config.min_radius, self.config.max_radius);
                camera.set_radius(target);
            }
            CameraKind::Tracking => {
                camera.dolly(amount * self.config.dolly_factor);
            }
        }
    }

    /// Feeds a window event through the controls
    ///
    /// Returns whether the camera changed.
    pub fn handle_window_event(
        &mut self,
        camera: &mut Camera,
        event: &WindowEvent,
        canvas: (u32, u32),
    ) -> bool {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Some((position.x, position.y));
                self.drag_to(camera, position.x, position.y, canvas)
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                match (state, self.cursor) {
                    (ElementState::Pressed, Some((x, y))) => self.begin_drag(x, y),
                    (ElementState::Pressed, None) => self.dragging = true,
                    (ElementState::Released, _) => self.end_drag(),
                }
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, scroll) => *scroll,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y: scroll, .. }) => {
                        *scroll as f32 / 100.0
                    }
                };
                self.dolly(camera, lines);
                true
            }
            WindowEvent::PinchGesture { delta, .. } => {
                self.dolly(camera, *delta as f32 * PINCH_SCALE);
                true
            }
            _ => false,
        }
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::new(ControlsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::camera::CameraConfig;
    use cgmath::Vector3;
    use winit::event::{DeviceId, TouchPhase};

    fn device() -> DeviceId {
        // SAFETY: only used as an opaque tag in synthetic events
        unsafe { DeviceId::dummy() }
    }

    fn cursor_moved(x: f64, y: f64) -> WindowEvent {
        WindowEvent::CursorMoved {
            device_id: device(),
            position: PhysicalPosition::new(x, y),
        }
    }

    fn left_button(state: ElementState) -> WindowEvent {
        WindowEvent::MouseInput {
            device_id: device(),
            state,
            button: MouseButton::Left,
        }
    }

    fn wheel(delta: MouseScrollDelta) -> WindowEvent {
        WindowEvent::MouseWheel {
            device_id: device(),
            delta,
            phase: TouchPhase::Moved,
        }
    }

    fn bounded() -> Controls {
        Controls::new(ControlsConfig {
            min_radius: 2.0,
            max_radius: 20.0,
            ..Default::default()
        })
    }

    fn orbiting_at(distance: f32) -> Camera {
        let mut camera = Camera::default();
        camera.go_home(Some(Vector3::new(0.0, 0.0, distance)));
        camera
    }

    #[test]
    fn test_drag_changes_azimuth() {
        let mut camera = orbiting_at(10.0);
        let mut controls = Controls::default();

        controls.begin_drag(100.0, 100.0);
        assert!(controls.drag_to(&mut camera, 200.0, 100.0, (800, 600)));
        assert!((camera.azimuth() + 25.0).abs() < 1e-4);
        assert_eq!(camera.elevation(), 0.0);
    }

    #[test]
    fn test_moves_without_drag_are_ignored() {
        let mut camera = orbiting_at(10.0);
        let mut controls = Controls::default();
        assert!(!controls.drag_to(&mut camera, 50.0, 50.0, (800, 600)));

        controls.begin_drag(0.0, 0.0);
        controls.end_drag();
        assert!(!controls.drag_to(&mut camera, 50.0, 50.0, (800, 600)));
        assert_eq!(camera.azimuth(), 0.0);
    }

    #[test]
    fn test_elevation_is_clamped() {
        let mut camera = orbiting_at(10.0);
        let controls = Controls::default();

        controls.rotate(&mut camera, 0.0, -10_000.0, (800, 600));
        assert_eq!(camera.elevation(), 89.0);
        controls.rotate(&mut camera, 0.0, 10_000.0, (800, 600));
        assert_eq!(camera.elevation(), -89.0);
    }

    #[test]
    fn test_custom_elevation_limit() {
        let mut camera = Camera::new(CameraConfig {
            elevation_limit: 45.0,
            ..Default::default()
        });
        camera.go_home(Some(Vector3::new(0.0, 0.0, 5.0)));
        Controls::default().rotate(&mut camera, 0.0, 10_000.0, (800, 600));
        assert_eq!(camera.elevation(), -45.0);
    }

    #[test]
    fn test_dolly_clamps_radius() {
        let mut camera = orbiting_at(10.0);
        let controls = Controls::new(ControlsConfig {
            min_radius: 2.0,
            max_radius: 20.0,
            ..Default::default()
        });

        controls.dolly(&mut camera, 1.0);
        assert!((camera.radius() - 9.0).abs() < 1e-4);

        controls.dolly(&mut camera, 50.0);
        assert!((camera.radius() - 2.0).abs() < 1e-4);

        controls.dolly(&mut camera, -500.0);
        assert!((camera.radius() - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_pointer_events_drive_a_drag() {
        let mut camera = orbiting_at(10.0);
        let mut controls = Controls::default();
        let canvas = (800, 600);

        assert!(!controls.handle_window_event(&mut camera, &cursor_moved(100.0, 100.0), canvas));
        assert_eq!(controls.cursor(), Some((100.0, 100.0)));
        assert!(!controls.is_dragging());

        let press = left_button(ElementState::Pressed);
        assert!(!controls.handle_window_event(&mut camera, &press, canvas));
        assert!(controls.is_dragging());

        assert!(controls.handle_window_event(&mut camera, &cursor_moved(200.0, 100.0), canvas));
        assert!((camera.azimuth() + 25.0).abs() < 1e-4);

        let release = left_button(ElementState::Released);
        assert!(!controls.handle_window_event(&mut camera, &release, canvas));
        assert!(!controls.is_dragging());

        assert!(!controls.handle_window_event(&mut camera, &cursor_moved(400.0, 100.0), canvas));
        assert!((camera.azimuth() + 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_right_button_does_not_drag() {
        let mut camera = orbiting_at(10.0);
        let mut controls = Controls::default();
        controls.handle_window_event(&mut camera, &cursor_moved(0.0, 0.0), (800, 600));

        let press = WindowEvent::MouseInput {
            device_id: device(),
            state: ElementState::Pressed,
            button: MouseButton::Right,
        };
        assert!(!controls.handle_window_event(&mut camera, &press, (800, 600)));
        assert!(!controls.is_dragging());
    }

    #[test]
    fn test_wheel_lines_dolly_within_bounds() {
        let mut camera = orbiting_at(10.0);
        let mut controls = bounded();

        let one_line = wheel(MouseScrollDelta::LineDelta(0.0, 1.0));
        assert!(controls.handle_window_event(&mut camera, &one_line, (800, 600)));
        assert!((camera.radius() - 9.0).abs() < 1e-4);

        let far_in = wheel(MouseScrollDelta::LineDelta(0.0, 50.0));
        controls.handle_window_event(&mut camera, &far_in, (800, 600));
        assert!((camera.radius() - 2.0).abs() < 1e-4);

        let far_out = wheel(MouseScrollDelta::LineDelta(0.0, -500.0));
        controls.handle_window_event(&mut camera, &far_out, (800, 600));
        assert!((camera.radius() - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_pixel_wheel_matches_line_wheel() {
        let mut camera = orbiting_at(10.0);
        let mut controls = bounded();

        let pixels = wheel(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 100.0)));
        assert!(controls.handle_window_event(&mut camera, &pixels, (800, 600)));
        assert!((camera.radius() - 9.0).abs() < 1e-4);

        let back = wheel(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -100.0)));
        controls.handle_window_event(&mut camera, &back, (800, 600));
        assert!((camera.radius() - 9.9).abs() < 1e-4);
    }

    #[test]
    fn test_pinch_dollies_like_wheel() {
        let mut camera = orbiting_at(10.0);
        let mut controls = bounded();

        let pinch = WindowEvent::PinchGesture {
            device_id: device(),
            delta: 0.1,
            phase: TouchPhase::Moved,
        };
        assert!(controls.handle_window_event(&mut camera, &pinch, (800, 600)));
        assert!((camera.radius() - 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_unrelated_events_are_ignored() {
        let mut camera = orbiting_at(10.0);
        let mut controls = Controls::default();
        assert!(!controls.handle_window_event(&mut camera, &WindowEvent::Focused(true), (800, 600)));
        assert!((camera.radius() - 10.0).abs() < 1e-4);
    }
}
