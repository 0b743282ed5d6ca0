use glam::{Mat4, Vec3};

/// Uniform names shared by the model renderer and the bundled skinning shader.
pub mod uniforms {
    pub const MODEL_MATRIX: &str = "modelMatrix";
    pub const PROJECTION_VIEW_MATRIX: &str = "projectionViewMatrix";
    pub const CAMERA_POSITION: &str = "cameraPosition";
    pub const HAS_BONES: &str = "hasBones";
    pub const BONES_MATRICES: &str = "bonesMatrices";
    pub const TEXTURE: &str = "uTexture";
    pub const HAS_TEXTURE: &str = "hasTexture";
    pub const DIFFUSE_COLOR: &str = "diffuseColor";
}

pub const VERTEX_SHADER_SOURCE: &str = include_str!("../../assets/shaders/skinned.vert");
pub const FRAGMENT_SHADER_SOURCE: &str = include_str!("../../assets/shaders/skinned.frag");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformSlot(pub u32);

/// A linked shader program.
pub trait ShaderProgram {
    fn use_program(&self);
    fn uniform_location(&self, name: &str) -> Option<UniformSlot>;
    fn set_mat4(&self, slot: UniformSlot, value: &Mat4);
    fn set_mat4_array(&self, slot: UniformSlot, values: &[Mat4]);
    fn set_vec3(&self, slot: UniformSlot, value: Vec3);
    fn set_i32(&self, slot: UniformSlot, value: i32);
}

/// Name-based upload helpers; uniforms the program does not declare are skipped.
pub trait ShaderProgramExt: ShaderProgram {
    fn set_mat4_named(&self, name: &str, value: &Mat4) {
        if let Some(slot) = self.uniform_location(name) {
            self.set_mat4(slot, value);
        }
    }

    fn set_mat4_array_named(&self, name: &str, values: &[Mat4]) {
        if let Some(slot) = self.uniform_location(name) {
            self.set_mat4_array(slot, values);
        }
    }

    fn set_vec3_named(&self, name: &str, value: Vec3) {
        if let Some(slot) = self.uniform_location(name) {
            self.set_vec3(slot, value);
        }
    }

    fn set_i32_named(&self, name: &str, value: i32) {
        if let Some(slot) = self.uniform_location(name) {
            self.set_i32(slot, value);
        }
    }
}

impl<T: ShaderProgram + ?Sized> ShaderProgramExt for T {}
