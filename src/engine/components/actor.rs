use glam::{Mat4, Vec3};

use crate::engine::components::transform::ActorTransform;
use crate::engine::rendering::{RenderDevice, ShaderProgram};

/// Per-frame camera inputs shared by every actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    pub projection_view: Mat4,
    pub camera_position: Vec3,
}

impl Default for FrameContext {
    fn default() -> Self {
        Self {
            projection_view: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
        }
    }
}

/// Lifecycle of anything placed in the world.
///
/// Update runs before render each frame; `release` frees GPU resources and must be
/// called before the actor is dropped.
pub trait Actor {
    type Error;

    fn initialize(&mut self, device: &dyn RenderDevice) -> Result<(), Self::Error>;
    fn update(&mut self, delta_seconds: f32);
    fn render(&mut self, device: &dyn RenderDevice, program: &dyn ShaderProgram, frame: &FrameContext);
    fn release(&mut self, device: &dyn RenderDevice);

    fn transform(&self) -> &ActorTransform;
    fn transform_mut(&mut self) -> &mut ActorTransform;

    fn model_matrix(&self) -> Mat4 {
        self.transform().matrix()
    }
}
