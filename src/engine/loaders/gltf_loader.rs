use std::collections::HashMap;
use std::path::Path;

use gltf::animation::util::ReadOutputs;
use gltf::animation::{Interpolation, Property};
use gltf::buffer::Data;
use glam::{Mat4, Quat, Vec2, Vec3};

use crate::engine::config::ImportSettings;
use crate::engine::error::ImportError;
use crate::engine::loaders::post_process;
use crate::engine::loaders::scene::*;
use crate::engine::loaders::SceneImporter;
use crate::engine::utils::math::mat4_from_cols;

/// Name of the synthetic node placed above the glTF scene roots.
pub const ROOT_NODE_NAME: &str = "RootNode";

/// Reads `.gltf` / `.glb` assets.
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfImporter;

impl SceneImporter for GltfImporter {
    fn read_file(&self, path: &Path, settings: &ImportSettings) -> Result<ImportedScene, ImportError> {
        let gltf = gltf::Gltf::open(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let buffers = gltf::import_buffers(&gltf.document, Some(base), gltf.blob.clone())?;

        let mut scene = convert_document(&gltf.document, &buffers, base)?;
        post_process::apply(&mut scene, settings);

        tracing::debug!(
            "glTF '{}': {} nodes, {} meshes, {} materials, {} animations, {} embedded textures",
            path.display(),
            scene.nodes.len(),
            scene.meshes.len(),
            scene.materials.len(),
            scene.animations.len(),
            scene.textures.len()
        );
        Ok(scene)
    }
}

/// Converts a loaded glTF document into an [`ImportedScene`] without post-processing.
pub fn convert_document(document: &gltf::Document, buffers: &[Data], base: &Path) -> Result<ImportedScene, ImportError> {
    let gltf_scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| ImportError::InvalidScene("document has no scenes".to_string()))?;

    let names = unique_node_names(document);
    let mut converter = Converter {
        buffers,
        names: &names,
        scene: ImportedScene::new(ROOT_NODE_NAME),
        mesh_cache: HashMap::new(),
        default_material: None,
        material_count: document.materials().len(),
    };

    let (textures, references) = convert_images(document, buffers, base);
    converter.scene.textures = textures;
    converter.scene.materials = document
        .materials()
        .map(|m| convert_material(&m, &references))
        .collect();

    for node in gltf_scene.nodes() {
        converter.add_node(0, &node)?;
    }

    if let Some(index) = converter.default_material {
        debug_assert_eq!(index, converter.scene.materials.len());
        converter.scene.materials.push(ImportedMaterial {
            name: "DefaultMaterial".to_string(),
            ..Default::default()
        });
    }

    converter.scene.animations = document
        .animations()
        .map(|a| convert_animation(&a, buffers, &names))
        .collect();

    Ok(converter.scene)
}

fn unique_node_names(document: &gltf::Document) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    document
        .nodes()
        .map(|node| {
            let base = node
                .name()
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("node_{}", node.index()));
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{}_{}", base, node.index())
            }
        })
        .collect()
}

struct Converter<'a> {
    buffers: &'a [Data],
    names: &'a [String],
    scene: ImportedScene,
    mesh_cache: HashMap<(usize, Option<usize>), Vec<usize>>,
    default_material: Option<usize>,
    material_count: usize,
}

impl Converter<'_> {
    fn add_node(&mut self, parent: NodeIndex, node: &gltf::Node) -> Result<(), ImportError> {
        let mut scene_node = SceneNode::new(
            self.names[node.index()].clone(),
            mat4_from_cols(node.transform().matrix()),
        );

        if let Some(mesh) = node.mesh() {
            let skin = node.skin();
            let key = (mesh.index(), skin.as_ref().map(|s| s.index()));
            let meshes = match self.mesh_cache.get(&key) {
                Some(meshes) => meshes.clone(),
                None => {
                    let meshes = self.convert_mesh(&mesh, skin.as_ref())?;
                    self.mesh_cache.insert(key, meshes.clone());
                    meshes
                }
            };
            scene_node.meshes = meshes;
        }

        let index = self.scene.add_node(parent, scene_node);
        for child in node.children() {
            self.add_node(index, &child)?;
        }
        Ok(())
    }

    fn convert_mesh(&mut self, mesh: &gltf::Mesh, skin: Option<&gltf::Skin>) -> Result<Vec<usize>, ImportError> {
        let buffers = self.buffers;
        let mut indices = Vec::new();

        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| Some(buffers[buffer.index()].0.as_slice()));

            let Some(positions) = reader.read_positions() else {
                tracing::warn!("mesh '{}': primitive without positions skipped", mesh_name(mesh));
                continue;
            };
            let positions: Vec<Vec3> = positions.map(Vec3::from).collect();
            let vertex_count = positions.len() as u32;

            let normals = reader
                .read_normals()
                .map(|n| n.map(Vec3::from).collect())
                .unwrap_or_default();
            let texture_coordinates = reader
                .read_tex_coords(0)
                .map(|uv| uv.into_f32().map(Vec2::from).collect());

            let vertex_indices: Vec<u32> = match reader.read_indices() {
                Some(read) => read.into_u32().collect(),
                None => (0..vertex_count).collect(),
            };
            if let Some(bad) = vertex_indices.iter().find(|&&i| i >= vertex_count) {
                return Err(ImportError::InvalidScene(format!(
                    "mesh '{}' references vertex {} of {}",
                    mesh_name(mesh),
                    bad,
                    vertex_count
                )));
            }
            let Some(faces) = faces_for_mode(primitive.mode(), &vertex_indices) else {
                tracing::warn!(
                    "mesh '{}': {:?} primitive skipped",
                    mesh_name(mesh),
                    primitive.mode()
                );
                continue;
            };

            let material_index = match primitive.material().index() {
                Some(index) => index,
                None => *self.default_material.get_or_insert(self.material_count),
            };

            let bones = match (skin, reader.read_joints(0), reader.read_weights(0)) {
                (Some(skin), Some(joints), Some(weights)) => {
                    let joints: Vec<[u16; 4]> = joints.into_u16().collect();
                    let weights: Vec<[f32; 4]> = weights.into_f32().collect();
                    self.skin_bones(skin, &joints, &weights)
                }
                _ => Vec::new(),
            };

            let name = if mesh.primitives().len() > 1 {
                format!("{}_{}", mesh_name(mesh), primitive.index())
            } else {
                mesh_name(mesh)
            };

            indices.push(self.scene.meshes.len());
            self.scene.meshes.push(ImportedMesh {
                name,
                positions,
                normals,
                texture_coordinates,
                faces,
                material_index,
                bones,
            });
        }

        Ok(indices)
    }

    /// One bone per joint that influences at least one vertex.
    fn skin_bones(&self, skin: &gltf::Skin, joints: &[[u16; 4]], weights: &[[f32; 4]]) -> Vec<ImportedBone> {
        let joint_nodes: Vec<usize> = skin.joints().map(|j| j.index()).collect();
        let buffers = self.buffers;
        let inverse_bind: Vec<Mat4> = skin
            .reader(|buffer| Some(buffers[buffer.index()].0.as_slice()))
            .read_inverse_bind_matrices()
            .map(|m| m.map(mat4_from_cols).collect())
            .unwrap_or_default();

        let mut per_joint: Vec<Vec<VertexWeight>> = vec![Vec::new(); joint_nodes.len()];
        for (vertex_id, (joint, weight)) in joints.iter().zip(weights).enumerate() {
            for k in 0..4 {
                let slot = joint[k] as usize;
                if weight[k] > 0.0 && slot < per_joint.len() {
                    per_joint[slot].push(VertexWeight {
                        vertex_id: vertex_id as u32,
                        weight: weight[k],
                    });
                }
            }
        }

        per_joint
            .into_iter()
            .enumerate()
            .filter(|(_, weights)| !weights.is_empty())
            .map(|(slot, weights)| ImportedBone {
                name: self.names[joint_nodes[slot]].clone(),
                offset_matrix: inverse_bind.get(slot).copied().unwrap_or(Mat4::IDENTITY),
                weights,
            })
            .collect()
    }
}

fn mesh_name(mesh: &gltf::Mesh) -> String {
    mesh.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("mesh_{}", mesh.index()))
}

fn faces_for_mode(mode: gltf::mesh::Mode, indices: &[u32]) -> Option<Vec<Vec<u32>>> {
    use gltf::mesh::Mode;

    let faces = match mode {
        Mode::Triangles => indices.chunks_exact(3).map(|c| c.to_vec()).collect(),
        Mode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, w)| {
                if i % 2 == 0 {
                    vec![w[0], w[1], w[2]]
                } else {
                    vec![w[1], w[0], w[2]]
                }
            })
            .collect(),
        Mode::TriangleFan => match indices.split_first() {
            Some((&first, rest)) => rest.windows(2).map(|w| vec![first, w[0], w[1]]).collect(),
            None => Vec::new(),
        },
        Mode::Points | Mode::Lines | Mode::LineLoop | Mode::LineStrip => return None,
    };
    Some(faces)
}

/// Maps glTF image indices to the texture reference a material stores:
/// `*N` for embedded images, the relative URI otherwise.
type ImageReferences = HashMap<usize, String>;

fn convert_images(document: &gltf::Document, buffers: &[Data], base: &Path) -> (Vec<EmbeddedTexture>, ImageReferences) {
    let mut textures = Vec::new();
    let mut references = HashMap::new();

    for image in document.images() {
        match image.source() {
            gltf::image::Source::Uri { uri, .. } if !uri.starts_with("data:") => {
                references.insert(image.index(), uri.to_string());
            }
            _ => {
                if let Some(texture) = embedded_texture(&image, buffers, base) {
                    references.insert(image.index(), format!("*{}", textures.len()));
                    textures.push(texture);
                }
            }
        }
    }

    (textures, references)
}

fn embedded_texture(image: &gltf::Image, buffers: &[Data], base: &Path) -> Option<EmbeddedTexture> {
    if let gltf::image::Source::View { view, .. } = image.source() {
        let start = view.offset();
        let data = buffers[view.buffer().index()].0.get(start..start + view.length())?.to_vec();
        return Some(EmbeddedTexture {
            width: data.len() as u32,
            height: 0,
            data,
        });
    }

    let decoded = match gltf::image::Data::from_source(image.source(), Some(base), buffers) {
        Ok(decoded) => decoded,
        Err(err) => {
            tracing::warn!("image {}: failed to decode data URI: {}", image.index(), err);
            return None;
        }
    };
    Some(EmbeddedTexture {
        width: decoded.width,
        height: decoded.height,
        data: to_rgba8(&decoded)?,
    })
}

fn to_rgba8(image: &gltf::image::Data) -> Option<Vec<u8>> {
    use gltf::image::Format;

    let pixels = &image.pixels;
    let rgba = match image.format {
        Format::R8G8B8A8 => pixels.clone(),
        Format::R8G8B8 => pixels.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], 255]).collect(),
        Format::R8G8 => pixels.chunks_exact(2).flat_map(|p| [p[0], p[0], p[0], p[1]]).collect(),
        Format::R8 => pixels.iter().flat_map(|&p| [p, p, p, 255]).collect(),
        other => {
            tracing::warn!("unsupported embedded image format {:?}", other);
            return None;
        }
    };
    Some(rgba)
}

fn convert_material(material: &gltf::Material, references: &ImageReferences) -> ImportedMaterial {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, _] = pbr.base_color_factor();

    let diffuse_texture = pbr
        .base_color_texture()
        .and_then(|info| references.get(&info.texture().source().index()).cloned());

    ImportedMaterial {
        name: material.name().unwrap_or_default().to_string(),
        diffuse_texture,
        properties: HashMap::new(),
    }
    .with_property(MaterialKey::ColorDiffuse, MaterialProperty::Color(Vec3::new(r, g, b)))
    .with_property(MaterialKey::TwoSided, MaterialProperty::Bool(material.double_sided()))
}

fn convert_animation(animation: &gltf::Animation, buffers: &[Data], names: &[String]) -> ImportedAnimation {
    let mut channels: Vec<NodeAnimation> = Vec::new();
    let mut by_node: HashMap<usize, usize> = HashMap::new();
    let mut duration = 0.0f64;

    for channel in animation.channels() {
        let target = channel.target().node().index();
        let reader = channel.reader(|buffer| Some(buffers[buffer.index()].0.as_slice()));
        let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs()) else {
            continue;
        };
        let times: Vec<f64> = inputs.map(f64::from).collect();
        if let Some(&last) = times.last() {
            duration = duration.max(last);
        }
        let interpolation = channel.sampler().interpolation();

        let slot = *by_node.entry(target).or_insert_with(|| {
            channels.push(NodeAnimation {
                node_name: names[target].clone(),
                ..Default::default()
            });
            channels.len() - 1
        });
        let track = &mut channels[slot];

        match (channel.target().property(), outputs) {
            (Property::Translation, ReadOutputs::Translations(values)) => {
                let values: Vec<Vec3> = values.map(Vec3::from).collect();
                track.position_keys = vector_keys(&times, &sampler_values(&values, interpolation), interpolation);
            }
            (Property::Scale, ReadOutputs::Scales(values)) => {
                let values: Vec<Vec3> = values.map(Vec3::from).collect();
                track.scaling_keys = vector_keys(&times, &sampler_values(&values, interpolation), interpolation);
            }
            (Property::Rotation, ReadOutputs::Rotations(values)) => {
                let values: Vec<Quat> = values.into_f32().map(|q| Quat::from_array(q).normalize()).collect();
                track.rotation_keys = quat_keys(&times, &sampler_values(&values, interpolation), interpolation);
            }
            _ => {}
        }
    }

    ImportedAnimation {
        name: animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("animation_{}", animation.index())),
        duration,
        ticks_per_second: 1.0,
        channels,
    }
}

/// Cubic spline samplers store (in-tangent, value, out-tangent) per key; keep the values.
fn sampler_values<T: Copy>(values: &[T], interpolation: Interpolation) -> Vec<T> {
    match interpolation {
        Interpolation::CubicSpline => values.chunks_exact(3).map(|c| c[1]).collect(),
        Interpolation::Linear | Interpolation::Step => values.to_vec(),
    }
}

// Step keys hold their value until just before the next key.
const STEP_EPSILON: f64 = 1e-4;

fn vector_keys(times: &[f64], values: &[Vec3], interpolation: Interpolation) -> Vec<VectorKey> {
    keyed(times, values, interpolation)
        .into_iter()
        .map(|(time, value)| VectorKey { time, value })
        .collect()
}

fn quat_keys(times: &[f64], values: &[Quat], interpolation: Interpolation) -> Vec<QuatKey> {
    keyed(times, values, interpolation)
        .into_iter()
        .map(|(time, value)| QuatKey { time, value })
        .collect()
}

fn keyed<T: Copy>(times: &[f64], values: &[T], interpolation: Interpolation) -> Vec<(f64, T)> {
    let mut keys = Vec::with_capacity(times.len() * 2);
    for (i, (&time, &value)) in times.iter().zip(values).enumerate() {
        if matches!(interpolation, Interpolation::Step) && i > 0 {
            let (previous_time, previous_value) = keys[keys.len() - 1];
            let hold = time - STEP_EPSILON;
            if hold > previous_time {
                keys.push((hold, previous_value));
            }
        }
        keys.push((time, value));
    }
    keys
}

#[cfg(test)]
mod tests {
    use gltf::mesh::Mode;

    use super::*;
    use crate::engine::components::animation::BoneTrack;

    #[test]
    fn step_keys_hold_until_the_next_key() {
        let times = [0.0, 1.0, 2.0];
        let values = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let keys = vector_keys(&times, &values, Interpolation::Step);

        let key_times: Vec<f64> = keys.iter().map(|k| k.time).collect();
        assert_eq!(key_times, vec![0.0, 1.0 - STEP_EPSILON, 1.0, 2.0 - STEP_EPSILON, 2.0]);

        let track = BoneTrack::from(&NodeAnimation {
            node_name: "hip".to_string(),
            position_keys: keys,
            ..Default::default()
        });
        let translation_at = |time: f64| track.sample(time, &Mat4::IDENTITY).w_axis.truncate();
        assert!(translation_at(0.5).abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(translation_at(0.99).abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(translation_at(1.0).abs_diff_eq(Vec3::X, 1e-6));
        assert!(translation_at(1.5).abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn linear_keys_are_taken_as_is() {
        let keys = keyed(&[0.0, 0.5], &[1.0f32, 2.0], Interpolation::Linear);
        assert_eq!(keys, vec![(0.0, 1.0), (0.5, 2.0)]);
    }

    #[test]
    fn cubic_spline_keeps_the_value_of_each_triple() {
        let values = [
            Vec3::splat(-1.0),
            Vec3::X,
            Vec3::splat(9.0),
            Vec3::splat(-2.0),
            Vec3::Y,
            Vec3::splat(8.0),
        ];
        assert_eq!(sampler_values(&values, Interpolation::CubicSpline), vec![Vec3::X, Vec3::Y]);
        assert_eq!(sampler_values(&values, Interpolation::Linear).len(), 6);
    }

    #[test]
    fn strips_alternate_winding() {
        let faces = faces_for_mode(Mode::TriangleStrip, &[0, 1, 2, 3, 4]).unwrap();
        assert_eq!(faces, vec![vec![0, 1, 2], vec![2, 1, 3], vec![2, 3, 4]]);
    }

    #[test]
    fn fans_share_the_first_vertex() {
        let faces = faces_for_mode(Mode::TriangleFan, &[0, 1, 2, 3]).unwrap();
        assert_eq!(faces, vec![vec![0, 1, 2], vec![0, 2, 3]]);
        assert_eq!(faces_for_mode(Mode::TriangleFan, &[]), Some(Vec::new()));
    }

    #[test]
    fn triangle_lists_drop_trailing_indices_and_lines_are_skipped() {
        let faces = faces_for_mode(Mode::Triangles, &[0, 1, 2, 3]).unwrap();
        assert_eq!(faces, vec![vec![0, 1, 2]]);
        assert_eq!(faces_for_mode(Mode::Lines, &[0, 1]), None);
    }
}
