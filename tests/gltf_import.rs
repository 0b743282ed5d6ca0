use std::fs;
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};
use serde_json::json;
use skinned_model::engine::loaders::scene::MaterialKey;
use skinned_model::engine::rendering::{uniforms, UniformValue};
use skinned_model::{
    FrameContext, GltfImporter, HeadlessDevice, HeadlessProgram, ImportError, ImportSettings, Model, ModelConfig,
    ModelError, SceneImporter,
};

/// Little-endian buffer with the rig's geometry, skin and one translation clip.
fn rig_buffer() -> Vec<u8> {
    let mut bytes = Vec::new();
    let floats = |bytes: &mut Vec<u8>, values: &[f32]| {
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
    };

    // 0..36 positions
    floats(&mut bytes, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0]);
    // 36..42 indices, padded to 44
    for i in [0u16, 1, 2] {
        bytes.extend_from_slice(&i.to_le_bytes());
    }
    bytes.extend_from_slice(&[0, 0]);
    // 44..56 joints
    bytes.extend_from_slice(&[0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 0]);
    // 56..104 weights
    floats(
        &mut bytes,
        &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.0, 0.0],
    );
    // 104..232 inverse bind matrices
    floats(&mut bytes, &Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)).to_cols_array());
    floats(&mut bytes, &Mat4::from_translation(Vec3::new(0.0, -2.0, 0.0)).to_cols_array());
    // 232..240 key times
    floats(&mut bytes, &[0.0, 1.0]);
    // 240..264 hip translations
    floats(&mut bytes, &[0.0, 1.0, 0.0, 1.0, 1.0, 0.0]);

    assert_eq!(bytes.len(), 264);
    bytes
}

/// Armature -> hip -> knee, plus a skinned "Body" mesh. With `textured`, the
/// primitive uses a material whose base color texture is `textures/skin.png`.
fn write_rig(dir: &Path, textured: bool) -> PathBuf {
    fs::write(dir.join("rig.bin"), rig_buffer()).unwrap();

    let mut primitive = json!({
        "attributes": { "POSITION": 0, "JOINTS_0": 2, "WEIGHTS_0": 3 },
        "indices": 1
    });
    let mut document = json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0, 3] }],
        "nodes": [
            { "name": "Armature", "children": [1] },
            { "name": "hip", "translation": [0.0, 1.0, 0.0], "children": [2] },
            { "name": "knee", "translation": [0.0, 1.0, 0.0] },
            { "name": "Body", "mesh": 0, "skin": 0 }
        ],
        "skins": [{ "joints": [1, 2], "inverseBindMatrices": 4 }],
        "animations": [{
            "name": "wave",
            "channels": [{ "sampler": 0, "target": { "node": 1, "path": "translation" } }],
            "samplers": [{ "input": 5, "output": 6, "interpolation": "LINEAR" }]
        }],
        "buffers": [{ "uri": "rig.bin", "byteLength": 264 }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 },
            { "buffer": 0, "byteOffset": 44, "byteLength": 12 },
            { "buffer": 0, "byteOffset": 56, "byteLength": 48 },
            { "buffer": 0, "byteOffset": 104, "byteLength": 128 },
            { "buffer": 0, "byteOffset": 232, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 240, "byteLength": 24 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 2.0, 0.0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" },
            { "bufferView": 2, "componentType": 5121, "count": 3, "type": "VEC4" },
            { "bufferView": 3, "componentType": 5126, "count": 3, "type": "VEC4" },
            { "bufferView": 4, "componentType": 5126, "count": 2, "type": "MAT4" },
            { "bufferView": 5, "componentType": 5126, "count": 2, "type": "SCALAR",
              "min": [0.0], "max": [1.0] },
            { "bufferView": 6, "componentType": 5126, "count": 2, "type": "VEC3" }
        ]
    });

    if textured {
        primitive["material"] = json!(0);
        document["materials"] = json!([{
            "name": "skin",
            "doubleSided": true,
            "pbrMetallicRoughness": {
                "baseColorFactor": [0.5, 0.25, 1.0, 1.0],
                "baseColorTexture": { "index": 0 }
            }
        }]);
        document["textures"] = json!([{ "source": 0 }]);
        document["images"] = json!([{ "uri": "textures/skin.png" }]);

        fs::create_dir_all(dir.join("textures")).unwrap();
        image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 200, 180, 255]))
            .save(dir.join("textures/skin.png"))
            .unwrap();
    }
    document["meshes"] = json!([{ "name": "Body", "primitives": [primitive] }]);

    let path = dir.join("rig.gltf");
    fs::write(&path, serde_json::to_vec_pretty(&document).unwrap()).unwrap();
    path
}

#[test]
fn importer_builds_scene_graph_under_synthetic_root() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_rig(dir.path(), false);
    let scene = GltfImporter.read_file(&path, &ImportSettings::default()).unwrap();

    let names: Vec<&str> = scene.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, ["RootNode", "Armature", "hip", "knee", "Body"]);
    assert_eq!(scene.root_node().children.len(), 2);
    assert_eq!(scene.parent_name(3), Some("hip"));

    assert_eq!(scene.meshes.len(), 1);
    let mesh = &scene.meshes[0];
    assert_eq!(mesh.faces, vec![vec![0, 1, 2]]);
    // Normals are generated when the asset has none.
    assert_eq!(mesh.normals.len(), 3);
    let bone_names: Vec<&str> = mesh.bones.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(bone_names, ["hip", "knee"]);
    assert_eq!(mesh.bones[1].offset_matrix, Mat4::from_translation(Vec3::new(0.0, -2.0, 0.0)));
    assert_eq!(mesh.bones[0].weights.len(), 2);

    // No material on the primitive: a default one is appended.
    assert_eq!(scene.materials.len(), 1);
    assert_eq!(mesh.material_index, 0);

    let clip = &scene.animations[0];
    assert_eq!(clip.name, "wave");
    assert_eq!(clip.ticks_per_second, 1.0);
    assert_eq!(clip.duration, 1.0);
    assert_eq!(clip.channels[0].node_name, "hip");
    assert_eq!(clip.channels[0].position_keys.len(), 2);
}

#[test]
fn material_texture_uri_and_properties_are_imported() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_rig(dir.path(), true);
    let scene = GltfImporter.read_file(&path, &ImportSettings::default()).unwrap();

    let material = &scene.materials[0];
    assert_eq!(material.diffuse_texture.as_deref(), Some("textures/skin.png"));
    assert_eq!(material.color(MaterialKey::ColorDiffuse), Some(Vec3::new(0.5, 0.25, 1.0)));
    assert_eq!(material.flag(MaterialKey::TwoSided), Some(true));
    assert!(scene.textures.is_empty());
}

#[test]
fn model_loads_and_animates_a_gltf_rig() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_rig(dir.path(), true);

    let device = HeadlessDevice::new();
    let program = HeadlessProgram::new();
    let mut model = Model::new(&path, ModelConfig::default());
    model.initialize(&device).unwrap();

    let stats = model.stats();
    assert_eq!(stats.nodes, 1);
    assert_eq!(stats.bones, 4);
    assert_eq!(stats.textured_materials, 1);
    assert_eq!(stats.clips, 1);
    assert!(model.animator().is_started());
    assert!(!model.materials()[0].raster_state().cull_back_faces);

    // Halfway through the clip the hip (and the knee under it) moved +0.5 on x.
    model.update(0.5);
    model.render(&device, &program, &FrameContext::default());

    let Some(UniformValue::Mat4Array(matrices)) = program.last_value(uniforms::BONES_MATRICES) else {
        panic!("bone matrices were not uploaded");
    };
    let shifted = Mat4::from_translation(Vec3::new(0.5, 0.0, 0.0));
    assert_eq!(matrices.len(), 2);
    for matrix in &matrices {
        assert!(matrix.abs_diff_eq(shifted, 1e-5));
    }
    assert_eq!(program.last_value(uniforms::HAS_TEXTURE), Some(UniformValue::Int(1)));

    model.release(&device);
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.live_mesh_buffers(), 0);
}

#[test]
fn missing_file_fails_import() {
    let dir = tempfile::tempdir().unwrap();
    let device = HeadlessDevice::new();
    let mut model = Model::new(dir.path().join("absent.gltf"), ModelConfig::default());
    assert!(matches!(
        model.initialize(&device),
        Err(ModelError::Import {
            source: ImportError::Gltf(_),
            ..
        })
    ));
    assert!(model.is_empty());
}
