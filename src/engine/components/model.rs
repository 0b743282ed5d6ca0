use std::fmt;
use std::path::{Path, PathBuf};

use glam::Mat4;

use crate::engine::components::actor::{Actor, FrameContext};
use crate::engine::components::animation::Animation;
use crate::engine::components::animator::Animator;
use crate::engine::components::material::Material;
use crate::engine::components::mesh::MAX_BONES;
use crate::engine::components::node::Node;
use crate::engine::components::skeleton::Skeleton;
use crate::engine::components::transform::ActorTransform;
use crate::engine::config::{ModelConfig, PlaybackMode};
use crate::engine::error::ModelError;
use crate::engine::loaders::scene::ImportedScene;
use crate::engine::loaders::{importer_for_path, SceneImporter};
use crate::engine::rendering::{uniforms, RenderDevice, ShaderProgram, ShaderProgramExt};
use crate::engine::utils::paths::model_directory;

// Upper bound on error codes drained after a draw call.
const MAX_ERRORS_PER_DRAW: usize = 8;

/// Counts describing a loaded model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelStats {
    pub nodes: usize,
    pub meshes: usize,
    pub bones: usize,
    pub materials: usize,
    pub textured_materials: usize,
    pub clips: usize,
}

impl fmt::Display for ModelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes, {} meshes, {} bones, {} materials ({} textured), {} clips",
            self.nodes, self.meshes, self.bones, self.materials, self.textured_materials, self.clips
        )
    }
}

/// A skinned model loaded from a file.
///
/// Owns the skeleton, materials, render nodes and clips built from one import.
pub struct Model {
    path: PathBuf,
    config: ModelConfig,
    importer: Option<Box<dyn SceneImporter>>,
    transform: ActorTransform,
    skeleton: Skeleton,
    materials: Vec<Material>,
    nodes: Vec<Node>,
    animations: Vec<Animation>,
    animator: Animator,
}

impl Model {
    /// The importer is chosen from the file extension at initialization.
    pub fn new(path: impl Into<PathBuf>, config: ModelConfig) -> Self {
        let animator = Animator::new(&config.playback);
        Self {
            path: path.into(),
            config,
            importer: None,
            transform: ActorTransform::identity(),
            skeleton: Skeleton::new(),
            materials: Vec::new(),
            nodes: Vec::new(),
            animations: Vec::new(),
            animator,
        }
    }

    pub fn with_importer(path: impl Into<PathBuf>, config: ModelConfig, importer: Box<dyn SceneImporter>) -> Self {
        Self {
            importer: Some(importer),
            ..Self::new(path, config)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn animations(&self) -> &[Animation] {
        &self.animations
    }

    pub fn animator(&self) -> &Animator {
        &self.animator
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.skeleton.is_empty()
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            nodes: self.nodes.len(),
            meshes: self.nodes.iter().map(|n| n.meshes.len()).sum(),
            bones: self.skeleton.len(),
            materials: self.materials.len(),
            textured_materials: self.materials.iter().filter(|m| m.has_texture()).count(),
            clips: self.animations.len(),
        }
    }

    /// Imports the model file and uploads it.
    ///
    /// On failure the model is left empty; update, render and release stay safe.
    pub fn initialize(&mut self, device: &dyn RenderDevice) -> Result<(), ModelError> {
        self.release(device);

        let scene = match self.import() {
            Ok(scene) => scene,
            Err(err) => {
                tracing::error!("{}", err);
                return Err(err);
            }
        };

        self.initialize_materials(device, &scene);
        self.process_nodes(&scene);

        if let Err(err) = self.nodes.iter_mut().try_for_each(|node| node.upload(device)) {
            tracing::error!("model '{}': mesh upload failed: {}", self.path.display(), err);
            self.release(device);
            return Err(err.into());
        }

        let default_ticks = self.config.import.default_ticks_per_second;
        self.animations = scene
            .animations
            .iter()
            .map(|clip| Animation::from_imported(clip, default_ticks))
            .collect();
        for clip in &self.animations {
            tracing::debug!(
                "clip '{}': {:.2}s, {} tracks",
                clip.name,
                clip.duration_seconds(),
                clip.track_count()
            );
        }
        if !self.animations.is_empty() && self.config.playback.autoplay {
            self.animator.start(0);
        }

        // Pose once so skinning matrices are valid before the first update.
        self.animator.update(0.0, &self.animations, &mut self.skeleton);

        tracing::info!("model '{}' loaded: {}", self.path.display(), self.stats());
        Ok(())
    }

    fn import(&self) -> Result<ImportedScene, ModelError> {
        let settings = &self.config.import;
        let result = match &self.importer {
            Some(importer) => importer.read_file(&self.path, settings),
            None => importer_for_path(&self.path).and_then(|importer| importer.read_file(&self.path, settings)),
        };
        let result = result.and_then(|scene| scene.validate().map(|()| scene));
        result.map_err(|source| ModelError::Import {
            path: self.path.clone(),
            source,
        })
    }

    fn initialize_materials(&mut self, device: &dyn RenderDevice, scene: &ImportedScene) {
        let directory = model_directory(&self.path.to_string_lossy());
        let texture_root = &self.config.import.texture_root;

        self.materials = scene
            .materials
            .iter()
            .map(|imported| Material::from_imported(device, imported, &scene.textures, &directory, texture_root))
            .collect();

        tracing::info!("model: initialized {} materials", self.materials.len());
    }

    /// Depth-first walk: nodes with meshes become render nodes, the others bones.
    fn process_nodes(&mut self, scene: &ImportedScene) {
        let mut stack = vec![(scene.root, Mat4::IDENTITY)];

        while let Some((index, parent_global)) = stack.pop() {
            let source = scene.node(index);
            let global = parent_global * source.transformation;

            if source.meshes.is_empty() {
                let bone = self.skeleton.find_or_insert(&source.name);
                self.skeleton.bone_mut(bone).bind_matrix = source.transformation;
                if let Some(parent_name) = scene.parent_name(index) {
                    self.skeleton.link_to_parent(bone, parent_name);
                }
            } else {
                self.nodes
                    .push(Node::copy_meshes(scene, index, global, &mut self.skeleton));
            }

            stack.extend(source.children.iter().rev().map(|&child| (child, global)));
        }

        self.skeleton.set_root(&scene.root_node().name);
    }

    pub fn update(&mut self, delta_seconds: f32) {
        if self.is_empty() {
            return;
        }
        self.animator
            .update(delta_seconds, &self.animations, &mut self.skeleton);
    }

    pub fn render(&mut self, device: &dyn RenderDevice, program: &dyn ShaderProgram, frame: &FrameContext) {
        program.use_program();
        let model_matrix = self.transform.matrix();
        let fallback_material = Material::default();

        for node in &self.nodes {
            for mesh in &node.meshes {
                let skinned = mesh.has_bones();
                let mesh_matrix = if skinned {
                    model_matrix
                } else {
                    model_matrix * node.global_transformation
                };

                program.set_mat4_named(uniforms::MODEL_MATRIX, &mesh_matrix);
                program.set_mat4_named(uniforms::PROJECTION_VIEW_MATRIX, &frame.projection_view);
                program.set_vec3_named(uniforms::CAMERA_POSITION, frame.camera_position);
                program.set_i32_named(uniforms::HAS_BONES, skinned as i32);

                if skinned {
                    let mut matrices = mesh.bones_matrices(&self.skeleton);
                    matrices.truncate(MAX_BONES);
                    program.set_mat4_array_named(uniforms::BONES_MATRICES, &matrices);
                }

                match self.materials.get(mesh.material_index) {
                    Some(material) => material.apply(device, program),
                    None => fallback_material.apply(device, program),
                }

                mesh.draw(device);

                for _ in 0..MAX_ERRORS_PER_DRAW {
                    match device.take_error() {
                        Some(code) => tracing::error!("GL error 0x{:04X} drawing mesh '{}'", code, mesh.name),
                        None => break,
                    }
                }
            }
        }

        device.bind_vertex_array(None);
    }

    /// Frees mesh buffers, then textures. Calling it again is a no-op.
    pub fn release(&mut self, device: &dyn RenderDevice) {
        for node in &mut self.nodes {
            node.release(device);
        }
        for material in &mut self.materials {
            material.release(device);
        }

        self.nodes.clear();
        self.materials.clear();
        self.animations.clear();
        self.skeleton = Skeleton::new();
        self.animator.stop();
    }

    /// Restarts playback with clip `index`.
    pub fn play_clip(&mut self, index: usize) -> bool {
        if index >= self.animations.len() {
            tracing::warn!(
                "model '{}': no clip {} ({} available)",
                self.path.display(),
                index,
                self.animations.len()
            );
            return false;
        }
        self.animator.start(index);
        true
    }

    pub fn pause(&mut self) {
        self.animator.pause();
    }

    pub fn resume(&mut self) {
        self.animator.resume();
    }

    pub fn set_playback_speed(&mut self, speed: f32) {
        self.animator.set_speed(speed);
    }

    pub fn set_playback_mode(&mut self, mode: PlaybackMode) {
        self.animator.set_mode(mode);
    }
}

impl Actor for Model {
    type Error = ModelError;

    fn initialize(&mut self, device: &dyn RenderDevice) -> Result<(), ModelError> {
        Model::initialize(self, device)
    }

    fn update(&mut self, delta_seconds: f32) {
        Model::update(self, delta_seconds)
    }

    fn render(&mut self, device: &dyn RenderDevice, program: &dyn ShaderProgram, frame: &FrameContext) {
        Model::render(self, device, program, frame)
    }

    fn release(&mut self, device: &dyn RenderDevice) {
        Model::release(self, device)
    }

    fn transform(&self) -> &ActorTransform {
        &self.transform
    }

    fn transform_mut(&mut self) -> &mut ActorTransform {
        &mut self.transform
    }
}
