//! First-person fly camera

use glam::{Mat4, Vec2, Vec3};
use winit::keyboard::KeyCode;

use crate::input::Input;

pub const DEFAULT_YAW: f32 = -90.0;
pub const DEFAULT_PITCH: f32 = 0.0;
pub const DEFAULT_SPEED: f32 = 2.5;
pub const DEFAULT_SENSITIVITY: f32 = 0.1;
/// Vertical field of view in degrees
pub const DEFAULT_FOV: f32 = 60.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;
/// Pitch limit in degrees, short of straight up or down
pub const PITCH_LIMIT: f32 = 89.0;

/// Movement keys held this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraMovement {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl CameraMovement {
    /// Read W/S/A/D, Space (up) and left Shift (down)
    pub fn from_input(input: &Input) -> Self {
        Self {
            forward: input.is_key_pressed(KeyCode::KeyW),
            backward: input.is_key_pressed(KeyCode::KeyS),
            left: input.is_key_pressed(KeyCode::KeyA),
            right: input.is_key_pressed(KeyCode::KeyD),
            up: input.is_key_pressed(KeyCode::Space),
            down: input.is_key_pressed(KeyCode::ShiftLeft),
        }
    }
}

/// Perspective camera driven by yaw and pitch
///
/// `front`, `right` and `up` are always derived from the angles, never
/// rotated in place, so they stay orthonormal.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    front: Vec3,
    right: Vec3,
    up: Vec3,
    world_up: Vec3,
    /// Degrees
    yaw: f32,
    /// Degrees, within the pitch limit
    pitch: f32,
    pub speed: f32,
    pub sensitivity: f32,
    /// Vertical field of view in degrees
    pub fov: f32,
}

impl Camera {
    /// Create a camera at `position` looking down -Z
    pub fn new(position: Vec3) -> Self {
        let mut camera = Self {
            position,
            front: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
            world_up: Vec3::Y,
            yaw: DEFAULT_YAW,
            pitch: DEFAULT_PITCH,
            speed: DEFAULT_SPEED,
            sensitivity: DEFAULT_SENSITIVITY,
            fov: DEFAULT_FOV,
        };
        camera.update_vectors();
        camera
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
        // Order matters: right needs the new front, up needs the new right
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }

    /// Turn by a mouse delta, +y looking up
    pub fn process_mouse(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch + dy * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_vectors();
    }

    /// Move for one frame; held directions add up
    pub fn process_movement(&mut self, movement: CameraMovement, dt: f32) {
        let velocity = self.speed * dt;
        let mut offset = Vec3::ZERO;
        if movement.forward {
            offset += self.front;
        }
        if movement.backward {
            offset -= self.front;
        }
        if movement.left {
            offset -= self.right;
        }
        if movement.right {
            offset += self.right;
        }
        if movement.up {
            offset += self.world_up;
        }
        if movement.down {
            offset -= self.world_up;
        }
        self.position += offset * velocity;
    }

    /// Apply this frame's keys and mouse motion
    pub fn process_input(&mut self, input: &Input, dt: f32) {
        self.process_movement(CameraMovement::from_input(input), dt);

        // Window y grows downward
        let delta: Vec2 = input.mouse_delta();
        self.process_mouse(delta.x, -delta.y);
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Get the projection matrix for an aspect ratio (width / height)
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), aspect, NEAR_PLANE, FAR_PLANE)
    }

    pub const fn front(&self) -> Vec3 {
        self.front
    }

    pub const fn right(&self) -> Vec3 {
        self.right
    }

    pub const fn up(&self) -> Vec3 {
        self.up
    }

    pub const fn yaw(&self) -> f32 {
        self.yaw
    }

    pub const fn pitch(&self) -> f32 {
        self.pitch
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 5.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::event::ElementState;

    const EPSILON: f32 = 1e-5;

    fn assert_orthonormal(camera: &Camera) {
        let (f, r, u) = (camera.front(), camera.right(), camera.up());
        assert!(f.dot(r).abs() < EPSILON);
        assert!(f.dot(u).abs() < EPSILON);
        assert!(r.dot(u).abs() < EPSILON);
        for v in [f, r, u] {
            assert!((v.length() - 1.0).abs() < EPSILON);
        }
    }

    #[test]
    fn test_defaults() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(camera.yaw(), -90.0);
        assert_eq!(camera.pitch(), 0.0);
        assert!(camera.front().abs_diff_eq(Vec3::NEG_Z, EPSILON));
        assert!(camera.right().abs_diff_eq(Vec3::X, EPSILON));
        assert!(camera.up().abs_diff_eq(Vec3::Y, EPSILON));
    }

    #[test]
    fn test_basis_stays_orthonormal() {
        let mut camera = Camera::default();
        for step in 0..200 {
            let dx = (step as f32 * 7.3) % 41.0 - 20.0;
            let dy = (step as f32 * 3.1) % 29.0 - 14.0;
            camera.process_mouse(dx, dy);
            assert_orthonormal(&camera);
        }
    }

    #[test]
    fn test_pitch_clamped() {
        let mut camera = Camera::default();
        for _ in 0..100 {
            camera.process_mouse(0.0, 500.0);
        }
        assert_eq!(camera.pitch(), PITCH_LIMIT);
        assert_orthonormal(&camera);

        camera.process_mouse(0.0, -1.0e6);
        assert_eq!(camera.pitch(), -PITCH_LIMIT);
        assert_orthonormal(&camera);
    }

    #[test]
    fn test_movement_is_additive() {
        let mut camera = Camera::new(Vec3::ZERO);
        let movement = CameraMovement {
            forward: true,
            right: true,
            up: true,
            ..Default::default()
        };
        camera.process_movement(movement, 2.0);
        // front -Z, right +X, up +Y, each scaled by speed * dt = 5
        assert!(camera.position.abs_diff_eq(Vec3::new(5.0, 5.0, -5.0), EPSILON));
    }

    #[test]
    fn test_opposite_keys_cancel() {
        let mut camera = Camera::new(Vec3::ONE);
        let movement = CameraMovement {
            forward: true,
            backward: true,
            up: true,
            down: true,
            ..Default::default()
        };
        camera.process_movement(movement, 1.0);
        assert!(camera.position.abs_diff_eq(Vec3::ONE, EPSILON));
    }

    #[test]
    fn test_process_input_inverts_mouse_y() {
        let mut input = Input::new();
        input.process_keyboard(KeyCode::KeyW, ElementState::Pressed);
        input.process_mouse_delta(Vec2::new(0.0, -10.0));

        let mut camera = Camera::new(Vec3::ZERO);
        camera.process_input(&input, 0.5);
        // Mouse moved up: pitch rises by 10 * sensitivity
        assert!((camera.pitch() - 1.0).abs() < EPSILON);
        assert!(camera.position.z < 0.0);
    }

    #[test]
    fn test_view_matrix_looks_down_front() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0));
        let view = camera.view_matrix();
        let ahead = view.transform_point3(Vec3::new(0.0, 0.0, 0.0));
        // Right-handed view space looks down -Z
        assert!(ahead.abs_diff_eq(Vec3::new(0.0, 0.0, -5.0), EPSILON));
    }
}
