use std::collections::{HashMap, HashSet};

use glam::{Vec2, Vec3};

use crate::engine::config::ImportSettings;
use crate::engine::loaders::scene::{ImportedBone, ImportedMesh, ImportedScene, VertexWeight};

/// Runs the enabled post-processing steps over every mesh of `scene`.
pub fn apply(scene: &mut ImportedScene, settings: &ImportSettings) {
    let steps = &settings.post_process;

    for mesh in &mut scene.meshes {
        if steps.triangulate {
            triangulate(mesh);
        }
        if steps.gen_smooth_normals && mesh.normals.len() != mesh.positions.len() {
            generate_smooth_normals(mesh);
        }
        if steps.join_identical_vertices {
            let merged = join_identical_vertices(mesh);
            if merged > 0 {
                tracing::debug!("mesh '{}': joined {} identical vertices", mesh.name, merged);
            }
        }
        if steps.flip_uvs {
            flip_uvs(mesh);
        }
        if steps.limit_bone_weights {
            limit_bone_weights(mesh, settings.max_bone_weights);
        }
    }

    if steps.split_by_bone_count {
        split_by_bone_count(scene, settings.max_bones_per_mesh);
    }
}

/// Fans polygons into triangles and drops points and lines.
pub fn triangulate(mesh: &mut ImportedMesh) {
    let mut dropped = 0;
    let mut triangles = Vec::with_capacity(mesh.faces.len());

    for face in &mesh.faces {
        if face.len() < 3 {
            dropped += 1;
            continue;
        }
        for i in 1..face.len() - 1 {
            triangles.push(vec![face[0], face[i], face[i + 1]]);
        }
    }

    if dropped > 0 {
        tracing::debug!("mesh '{}': dropped {} point/line faces", mesh.name, dropped);
    }
    mesh.faces = triangles;
}

pub fn flip_uvs(mesh: &mut ImportedMesh) {
    if let Some(uvs) = &mut mesh.texture_coordinates {
        for uv in uvs.iter_mut() {
            uv.y = 1.0 - uv.y;
        }
    }
}

/// Area-weighted face normals, averaged over every vertex sharing a position.
pub fn generate_smooth_normals(mesh: &mut ImportedMesh) {
    let mut accumulated: HashMap<[u32; 3], Vec3> = HashMap::new();

    for face in mesh.faces.iter().filter(|f| f.len() >= 3) {
        let [a, b, c] = [face[0], face[1], face[2]].map(|i| mesh.positions[i as usize]);
        let face_normal = (b - a).cross(c - a);
        for &index in face {
            let key = position_key(mesh.positions[index as usize]);
            *accumulated.entry(key).or_insert(Vec3::ZERO) += face_normal;
        }
    }

    mesh.normals = mesh
        .positions
        .iter()
        .map(|&p| {
            accumulated
                .get(&position_key(p))
                .map(|n| n.normalize_or_zero())
                .filter(|n| *n != Vec3::ZERO)
                .unwrap_or(Vec3::Z)
        })
        .collect();
}

fn position_key(p: Vec3) -> [u32; 3] {
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
}

/// Per-vertex `(mesh bone index, weight)` lists, sorted by bone index.
fn vertex_influences(mesh: &ImportedMesh) -> Vec<Vec<(usize, f32)>> {
    let mut influences = vec![Vec::new(); mesh.vertex_count()];
    for (bone_index, bone) in mesh.bones.iter().enumerate() {
        for w in &bone.weights {
            if let Some(list) = influences.get_mut(w.vertex_id as usize) {
                list.push((bone_index, w.weight));
            }
        }
    }
    for list in &mut influences {
        list.sort_by_key(|&(bone, _)| bone);
    }
    influences
}

fn rebuild_bone_weights(mesh: &mut ImportedMesh, influences: &[Vec<(usize, f32)>]) {
    for bone in &mut mesh.bones {
        bone.weights.clear();
    }
    for (vertex_id, list) in influences.iter().enumerate() {
        for &(bone_index, weight) in list {
            mesh.bones[bone_index].weights.push(VertexWeight {
                vertex_id: vertex_id as u32,
                weight,
            });
        }
    }
}

/// Merges vertices whose attributes and bone influences match exactly.
/// Returns how many vertices were removed.
pub fn join_identical_vertices(mesh: &mut ImportedMesh) -> usize {
    let count = mesh.vertex_count();
    let influences = vertex_influences(mesh);
    let has_normals = mesh.normals.len() == count;

    let mut unique: HashMap<Vec<u32>, u32> = HashMap::with_capacity(count);
    let mut kept: Vec<usize> = Vec::with_capacity(count);
    let mut remap = vec![0u32; count];

    for vertex in 0..count {
        let mut key = position_key(mesh.positions[vertex]).to_vec();
        if has_normals {
            key.extend(position_key(mesh.normals[vertex]));
        }
        if let Some(uvs) = &mesh.texture_coordinates {
            let uv = uvs.get(vertex).copied().unwrap_or(Vec2::ZERO);
            key.extend([uv.x.to_bits(), uv.y.to_bits()]);
        }
        for &(bone, weight) in &influences[vertex] {
            key.extend([bone as u32, weight.to_bits()]);
        }

        let next = kept.len() as u32;
        let index = *unique.entry(key).or_insert_with(|| {
            kept.push(vertex);
            next
        });
        remap[vertex] = index;
    }

    let removed = count - kept.len();
    if removed == 0 {
        return 0;
    }

    mesh.positions = kept.iter().map(|&v| mesh.positions[v]).collect();
    if has_normals {
        mesh.normals = kept.iter().map(|&v| mesh.normals[v]).collect();
    }
    if let Some(uvs) = &mesh.texture_coordinates {
        let merged = kept
            .iter()
            .map(|&v| uvs.get(v).copied().unwrap_or(Vec2::ZERO))
            .collect();
        mesh.texture_coordinates = Some(merged);
    }
    for face in &mut mesh.faces {
        for index in face.iter_mut() {
            *index = remap[*index as usize];
        }
    }
    let merged_influences: Vec<_> = kept.iter().map(|&v| influences[v].clone()).collect();
    rebuild_bone_weights(mesh, &merged_influences);

    removed
}

/// Keeps the `max_weights` heaviest influences per vertex and renormalises them.
pub fn limit_bone_weights(mesh: &mut ImportedMesh, max_weights: usize) {
    if mesh.bones.is_empty() || max_weights == 0 {
        return;
    }

    let mut influences = vertex_influences(mesh);
    let mut limited = 0;

    for list in &mut influences {
        if list.len() <= max_weights {
            continue;
        }
        limited += 1;
        list.sort_by(|a, b| b.1.total_cmp(&a.1));
        list.truncate(max_weights);
        let total: f32 = list.iter().map(|&(_, w)| w).sum();
        if total > 0.0 {
            for entry in list.iter_mut() {
                entry.1 /= total;
            }
        }
        list.sort_by_key(|&(bone, _)| bone);
    }

    if limited > 0 {
        tracing::debug!(
            "mesh '{}': limited {} vertices to {} bone weights",
            mesh.name,
            limited,
            max_weights
        );
        rebuild_bone_weights(mesh, &influences);
    }
}

/// Splits meshes referencing more than `max_bones` bones and remaps node mesh lists.
pub fn split_by_bone_count(scene: &mut ImportedScene, max_bones: usize) {
    if max_bones == 0 || scene.meshes.iter().all(|m| m.bones.len() <= max_bones) {
        return;
    }

    let mut meshes = Vec::with_capacity(scene.meshes.len());
    let mut remap: Vec<Vec<usize>> = Vec::with_capacity(scene.meshes.len());

    for mesh in std::mem::take(&mut scene.meshes) {
        let start = meshes.len();
        if mesh.bones.len() <= max_bones {
            meshes.push(mesh);
        } else {
            let parts = split_mesh(&mesh, max_bones);
            tracing::debug!(
                "mesh '{}': {} bones split into {} meshes",
                mesh.name,
                mesh.bones.len(),
                parts.len()
            );
            meshes.extend(parts);
        }
        remap.push((start..meshes.len()).collect());
    }

    scene.meshes = meshes;
    for node in &mut scene.nodes {
        node.meshes = node
            .meshes
            .iter()
            .flat_map(|&m| remap.get(m).cloned().unwrap_or_default())
            .collect();
    }
}

fn split_mesh(mesh: &ImportedMesh, max_bones: usize) -> Vec<ImportedMesh> {
    let influences = vertex_influences(mesh);
    let mut groups: Vec<(HashSet<usize>, Vec<usize>)> = Vec::new();
    let mut bones: HashSet<usize> = HashSet::new();
    let mut faces: Vec<usize> = Vec::new();

    for (face_index, face) in mesh.faces.iter().enumerate() {
        let face_bones: HashSet<usize> = face
            .iter()
            .flat_map(|&v| influences[v as usize].iter().map(|&(bone, _)| bone))
            .collect();
        if face_bones.len() > max_bones {
            tracing::warn!(
                "mesh '{}': face {} alone references {} bones",
                mesh.name,
                face_index,
                face_bones.len()
            );
        }

        let union: HashSet<usize> = bones.union(&face_bones).copied().collect();
        if union.len() > max_bones && !faces.is_empty() {
            groups.push((std::mem::take(&mut bones), std::mem::take(&mut faces)));
            bones = face_bones;
        } else {
            bones = union;
        }
        faces.push(face_index);
    }
    if !faces.is_empty() {
        groups.push((bones, faces));
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(part, (bone_set, face_ids))| build_submesh(mesh, part, &bone_set, &face_ids))
        .collect()
}

fn build_submesh(mesh: &ImportedMesh, part: usize, bone_set: &HashSet<usize>, face_ids: &[usize]) -> ImportedMesh {
    let mut vertex_map: HashMap<u32, u32> = HashMap::new();
    let mut source_vertices: Vec<u32> = Vec::new();

    let faces = face_ids
        .iter()
        .map(|&f| {
            mesh.faces[f]
                .iter()
                .map(|&v| {
                    *vertex_map.entry(v).or_insert_with(|| {
                        source_vertices.push(v);
                        (source_vertices.len() - 1) as u32
                    })
                })
                .collect()
        })
        .collect();

    let pick = |v: &u32| *v as usize;
    let positions = source_vertices.iter().map(|v| mesh.positions[pick(v)]).collect();
    let normals = if mesh.normals.len() == mesh.positions.len() {
        source_vertices.iter().map(|v| mesh.normals[pick(v)]).collect()
    } else {
        Vec::new()
    };
    let texture_coordinates = mesh.texture_coordinates.as_ref().map(|uvs| {
        source_vertices
            .iter()
            .map(|v| uvs.get(pick(v)).copied().unwrap_or(Vec2::ZERO))
            .collect()
    });

    let bones = mesh
        .bones
        .iter()
        .enumerate()
        .filter(|(index, _)| bone_set.contains(index))
        .map(|(_, bone)| ImportedBone {
            name: bone.name.clone(),
            offset_matrix: bone.offset_matrix,
            weights: bone
                .weights
                .iter()
                .filter_map(|w| {
                    vertex_map.get(&w.vertex_id).map(|&vertex_id| VertexWeight {
                        vertex_id,
                        weight: w.weight,
                    })
                })
                .collect(),
        })
        .collect();

    ImportedMesh {
        name: format!("{}_{}", mesh.name, part),
        positions,
        normals,
        texture_coordinates,
        faces,
        material_index: mesh.material_index,
        bones,
    }
}
