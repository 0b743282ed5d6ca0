use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Placement of an actor in the world.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ActorTransform {
    pub position: Vec3,
    pub scale: Vec3,
    /// Euler angles in radians: pitch (x), yaw (y), roll (z).
    pub rotation: Vec3,
}

impl Default for ActorTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ActorTransform {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Vec3::new(x, y, z),
            ..Self::identity()
        }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }

    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.position = Vec3::new(x, y, z);
    }

    pub fn set_scale(&mut self, x: f32, y: f32, z: f32) {
        self.scale = Vec3::new(x, y, z);
    }

    pub fn set_rotation(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Vec3::new(x, y, z);
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.position += Vec3::new(x, y, z);
    }

    pub fn rotate(&mut self, x: f32, y: f32, z: f32) {
        self.rotation += Vec3::new(x, y, z);
    }

    /// Scale -> Rotate (roll, pitch, then yaw) -> Translate.
    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, self.rotation.z);
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::utils::math::approx_eq_mat4;

    #[test]
    fn matrix_applies_scale_rotation_translation() {
        let mut transform = ActorTransform::new(1.0, 2.0, 3.0);
        transform.set_scale(2.0, 2.0, 2.0);
        transform.set_rotation(0.0, std::f32::consts::FRAC_PI_2, 0.0);

        let point = transform.matrix().transform_point3(Vec3::X);
        assert!((point - Vec3::new(1.0, 2.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn translate_accumulates() {
        let mut transform = ActorTransform::identity();
        transform.translate(1.0, 0.0, 0.0);
        transform.translate(0.0, -3.0, 0.0);
        assert!(approx_eq_mat4(
            &transform.matrix(),
            &Mat4::from_translation(Vec3::new(1.0, -3.0, 0.0)),
            1e-6
        ));
    }
}
