use glam::Mat4;

use crate::engine::components::skeleton::{BoneId, Skeleton};
use crate::engine::components::vertex::Vertex;
use crate::engine::error::RenderError;
use crate::engine::loaders::scene::ImportedMesh;
use crate::engine::rendering::{MeshBuffers, RenderDevice};

/// Size of the `bonesMatrices` uniform array in the skinning shader.
pub const MAX_BONES: usize = 100;

/// Triangle mesh with interleaved vertices and the bones it is skinned to.
///
/// `bone_ids` stored in the vertices are positions in [`Mesh::bones`], not skeleton
/// indices; [`Mesh::bones_matrices`] returns matrices in the same order.
#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub material_index: usize,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    bones: Vec<BoneId>,
    buffers: Option<MeshBuffers>,
}

impl Mesh {
    pub fn from_imported(imported: &ImportedMesh, skeleton: &mut Skeleton) -> Self {
        let mut vertices: Vec<Vertex> = imported
            .positions
            .iter()
            .enumerate()
            .map(|(i, position)| {
                let uv = imported
                    .texture_coordinates
                    .as_ref()
                    .and_then(|uvs| uvs.get(i))
                    .map_or([0.0, 0.0], |uv| uv.to_array());
                let normal = imported.normals.get(i).map_or([0.0; 3], |n| n.to_array());
                Vertex::new(position.to_array(), uv, normal)
            })
            .collect();

        let mut indices = Vec::with_capacity(imported.faces.len() * 3);
        let mut skipped = 0;
        for face in &imported.faces {
            if face.len() == 3 {
                indices.extend_from_slice(face);
            } else {
                skipped += 1;
            }
        }
        if skipped > 0 {
            tracing::warn!("mesh '{}': skipped {} non-triangle faces", imported.name, skipped);
        }

        let mut bones: Vec<BoneId> = Vec::with_capacity(imported.bones.len());
        let mut unreachable = 0;
        for imported_bone in &imported.bones {
            let id = skeleton.find_or_insert(&imported_bone.name);
            skeleton.set_offset_once(id, imported_bone.offset_matrix);

            let local = match bones.iter().position(|&b| b == id) {
                Some(local) => local,
                None => {
                    bones.push(id);
                    bones.len() - 1
                }
            };

            // The shader indexes `bonesMatrices[MAX_BONES]` with these ids.
            if local >= MAX_BONES {
                unreachable += 1;
                continue;
            }

            for weight in &imported_bone.weights {
                match vertices.get_mut(weight.vertex_id as usize) {
                    Some(vertex) => {
                        vertex.try_add_bone_data(local as i32, weight.weight);
                    }
                    None => tracing::warn!(
                        "mesh '{}': bone '{}' weights missing vertex {}",
                        imported.name,
                        imported_bone.name,
                        weight.vertex_id
                    ),
                }
            }
        }

        if unreachable > 0 {
            tracing::warn!(
                "mesh '{}' references {} bones, influences of the {} past {} are dropped",
                imported.name,
                bones.len(),
                unreachable,
                MAX_BONES
            );
        }

        Self {
            name: imported.name.clone(),
            material_index: imported.material_index,
            vertices,
            indices,
            bones,
            buffers: None,
        }
    }

    pub fn has_bones(&self) -> bool {
        !self.bones.is_empty()
    }

    pub fn bones(&self) -> &[BoneId] {
        &self.bones
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_uploaded(&self) -> bool {
        self.buffers.is_some()
    }

    pub fn upload(&mut self, device: &dyn RenderDevice) -> Result<(), RenderError> {
        let buffers = device.create_mesh_buffers(&self.vertices, &self.indices, self.has_bones())?;
        if let Some(previous) = self.buffers.replace(buffers) {
            device.delete_mesh_buffers(previous);
        }
        Ok(())
    }

    /// Current skinning matrices of this mesh's bones, in mesh-local order.
    pub fn bones_matrices(&self, skeleton: &Skeleton) -> Vec<Mat4> {
        self.bones
            .iter()
            .map(|&id| skeleton.bone(id).animated_matrix)
            .collect()
    }

    pub fn draw(&self, device: &dyn RenderDevice) {
        if let Some(buffers) = self.buffers {
            device.bind_vertex_array(Some(buffers.vertex_array));
            device.draw_indexed_triangles(self.indices.len());
        }
    }

    pub fn release(&mut self, device: &dyn RenderDevice) {
        if let Some(buffers) = self.buffers.take() {
            device.delete_mesh_buffers(buffers);
        }
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        if self.buffers.is_some() {
            tracing::warn!("mesh '{}' dropped without release", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::*;
    use crate::engine::loaders::scene::{ImportedBone, VertexWeight};
    use crate::engine::rendering::HeadlessDevice;

    fn bone(name: &str, offset: Mat4, weights: &[(u32, f32)]) -> ImportedBone {
        ImportedBone {
            name: name.to_string(),
            offset_matrix: offset,
            weights: weights
                .iter()
                .map(|&(vertex_id, weight)| VertexWeight { vertex_id, weight })
                .collect(),
        }
    }

    fn triangle() -> ImportedMesh {
        ImportedMesh {
            name: "tri".to_string(),
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: vec![Vec3::Z; 3],
            texture_coordinates: Some(vec![Vec2::ZERO, Vec2::X, Vec2::Y]),
            faces: vec![vec![0, 1, 2], vec![0, 1]],
            ..Default::default()
        }
    }

    #[test]
    fn copies_attributes_and_skips_non_triangles() {
        let mut skeleton = Skeleton::new();
        let mut imported = triangle();
        imported.texture_coordinates = None;
        let mesh = Mesh::from_imported(&imported, &mut skeleton);
        assert_eq!(mesh.indices(), &[0, 1, 2]);
        assert_eq!(mesh.vertices()[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices()[1].texture_coordinates, [0.0, 0.0]);
        assert!(!mesh.has_bones());
        assert!(skeleton.is_empty());
    }

    #[test]
    fn vertex_bone_ids_are_mesh_local() {
        let mut skeleton = Skeleton::new();
        // Bones already known to the skeleton get different global indices.
        skeleton.find_or_insert("root");
        skeleton.find_or_insert("spine");

        let mut imported = triangle();
        imported.bones = vec![
            bone("hand", Mat4::IDENTITY, &[(0, 1.0)]),
            bone("spine", Mat4::IDENTITY, &[(1, 0.5), (2, 1.0)]),
        ];
        let mesh = Mesh::from_imported(&imported, &mut skeleton);

        let hand = skeleton.find_bone("hand").unwrap();
        let spine = skeleton.find_bone("spine").unwrap();
        assert_eq!(hand, BoneId(2));
        assert_eq!(mesh.bones(), &[hand, spine]);

        skeleton.bone_mut(hand).animated_matrix = Mat4::from_translation(Vec3::X);
        skeleton.bone_mut(spine).animated_matrix = Mat4::from_translation(Vec3::Y);
        let matrices = mesh.bones_matrices(&skeleton);

        let v0 = mesh.vertices()[0];
        let v2 = mesh.vertices()[2];
        assert_eq!(matrices[v0.bone_ids[0] as usize], skeleton.bone(hand).animated_matrix);
        assert_eq!(matrices[v2.bone_ids[0] as usize], skeleton.bone(spine).animated_matrix);
    }

    #[test]
    fn first_offset_wins_across_meshes() {
        let mut skeleton = Skeleton::new();
        let first = Mat4::from_translation(Vec3::X);
        let mut a = triangle();
        a.bones = vec![bone("arm", first, &[(0, 1.0)])];
        let mut b = triangle();
        b.bones = vec![bone("arm", Mat4::from_translation(Vec3::Z), &[(0, 1.0)])];

        Mesh::from_imported(&a, &mut skeleton);
        Mesh::from_imported(&b, &mut skeleton);
        let arm = skeleton.find_bone("arm").unwrap();
        assert_eq!(skeleton.bone(arm).offset_matrix(), first);
        assert_eq!(skeleton.len(), 1);
    }

    #[test]
    fn bones_past_the_shader_array_carry_no_influence() {
        let mut skeleton = Skeleton::new();
        let mut imported = triangle();
        imported.bones = (0..MAX_BONES + 3)
            .map(|i| bone(&format!("bone_{i}"), Mat4::IDENTITY, &[((i % 3) as u32, 1.0 + i as f32)]))
            .collect();
        let mesh = Mesh::from_imported(&imported, &mut skeleton);

        assert_eq!(mesh.bones().len(), MAX_BONES + 3);
        for vertex in mesh.vertices() {
            assert_eq!(vertex.influence_count(), 4);
            for (&id, &weight) in vertex.bone_ids.iter().zip(&vertex.bone_weights) {
                assert!(weight > 0.0);
                assert!((id as usize) < MAX_BONES);
            }
        }
    }

    #[test]
    fn upload_draw_and_release() {
        let device = HeadlessDevice::new();
        let mut skeleton = Skeleton::new();
        let mut mesh = Mesh::from_imported(&triangle(), &mut skeleton);

        mesh.draw(&device);
        assert_eq!(device.counters().draw_calls, 0);

        mesh.upload(&device).unwrap();
        mesh.draw(&device);
        assert_eq!(device.counters().draw_calls, 1);
        assert_eq!(device.counters().indices_drawn, 3);

        mesh.release(&device);
        mesh.release(&device);
        assert_eq!(device.counters().mesh_buffers_deleted, 1);
        assert_eq!(device.live_mesh_buffers(), 0);
    }
}
