use glam::Mat4;

use crate::engine::components::mesh::Mesh;
use crate::engine::components::skeleton::Skeleton;
use crate::engine::error::RenderError;
use crate::engine::loaders::scene::{ImportedScene, NodeIndex};
use crate::engine::rendering::RenderDevice;

/// Scene graph entry that carries meshes.
#[derive(Debug)]
pub struct Node {
    pub name: String,
    /// Node-to-model transform composed at import time.
    pub global_transformation: Mat4,
    pub meshes: Vec<Mesh>,
}

impl Node {
    /// Builds a node from `index`, copying every mesh it references.
    pub fn copy_meshes(
        scene: &ImportedScene,
        index: NodeIndex,
        global_transformation: Mat4,
        skeleton: &mut Skeleton,
    ) -> Self {
        let source = scene.node(index);
        let meshes = source
            .meshes
            .iter()
            .filter_map(|&mesh_index| match scene.meshes.get(mesh_index) {
                Some(imported) => Some(Mesh::from_imported(imported, skeleton)),
                None => {
                    tracing::warn!("node '{}' references missing mesh {}", source.name, mesh_index);
                    None
                }
            })
            .collect();

        Self {
            name: source.name.clone(),
            global_transformation,
            meshes,
        }
    }

    pub fn upload(&mut self, device: &dyn RenderDevice) -> Result<(), RenderError> {
        for mesh in &mut self.meshes {
            mesh.upload(device)?;
        }
        Ok(())
    }

    pub fn release(&mut self, device: &dyn RenderDevice) {
        for mesh in &mut self.meshes {
            mesh.release(device);
        }
    }
}
