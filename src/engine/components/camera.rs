use glam::{Mat4, Vec3};

use crate::engine::components::actor::FrameContext;
use crate::engine::utils::math::{build_view_matrix, perspective};

/// First-person camera described by position, pitch and yaw.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pitch: f32,
    yaw: f32,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.0, 4.0),
            pitch: 0.0,
            yaw: 0.0,
            fov_y: 60f32.to_radians(),
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Pitch is kept inside (-90°, 90°).
    pub fn set_rotation(&mut self, pitch: f32, yaw: f32) {
        let limit = std::f32::consts::FRAC_PI_2 - 0.01;
        self.pitch = pitch.clamp(-limit, limit);
        self.yaw = yaw;
    }

    /// Turns the camera by a mouse movement in pixels.
    pub fn apply_mouse_delta(&mut self, delta_x: f32, delta_y: f32, sensitivity: f32) {
        self.set_rotation(self.pitch - delta_y * sensitivity, self.yaw - delta_x * sensitivity);
    }

    pub fn view_matrix(&self) -> Mat4 {
        build_view_matrix(self.position, self.pitch, self.yaw)
    }

    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        perspective(self.fov_y, aspect_ratio, self.near, self.far)
    }

    pub fn frame_context(&self, aspect_ratio: f32) -> FrameContext {
        FrameContext {
            projection_view: self.projection_matrix(aspect_ratio) * self.view_matrix(),
            camera_position: self.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = Camera::new(Vec3::ZERO);
        let in_front = camera.view_matrix().transform_point3(Vec3::new(0.0, 0.0, -5.0));
        assert!((in_front - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::default();
        camera.set_rotation(10.0, 0.0);
        assert!(camera.pitch() < std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn mouse_movement_turns_the_camera() {
        let mut camera = Camera::default();
        camera.apply_mouse_delta(10.0, 5.0, 0.01);
        assert!((camera.yaw() + 0.1).abs() < 1e-6);
        assert!((camera.pitch() + 0.05).abs() < 1e-6);

        camera.apply_mouse_delta(0.0, -10_000.0, 0.01);
        assert!(camera.pitch() < std::f32::consts::FRAC_PI_2);
    }
}
