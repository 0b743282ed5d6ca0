//! Skinned model loading, animation and rendering on top of glow.
//!
//! [`Model`] imports a scene through a [`SceneImporter`], builds a [`Skeleton`] with
//! stable bone indices, samples keyframe clips every update and draws its meshes
//! with per-mesh bone matrices through a [`RenderDevice`].

pub mod engine;

pub use engine::components::*;
pub use engine::config::*;
pub use engine::error::*;
pub use engine::loaders::{importer_for_path, GltfImporter, ImportedScene, SceneImporter};
pub use engine::rendering::{
    GlShaderProgram, GlowDevice, HeadlessDevice, HeadlessProgram, RenderDevice, ShaderProgram,
};
