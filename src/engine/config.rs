use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::components::mesh::MAX_BONES;
use crate::engine::components::vertex::MAX_BONE_INFLUENCES;
use crate::engine::error::ConfigError;

/// Post-processing steps applied to an imported scene before it reaches the model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PostProcessSteps {
    pub triangulate: bool,
    pub flip_uvs: bool,
    pub gen_smooth_normals: bool,
    pub join_identical_vertices: bool,
    pub limit_bone_weights: bool,
    pub split_by_bone_count: bool,
}

impl Default for PostProcessSteps {
    fn default() -> Self {
        Self {
            triangulate: true,
            flip_uvs: false,
            gen_smooth_normals: true,
            join_identical_vertices: true,
            limit_bone_weights: true,
            split_by_bone_count: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ImportSettings {
    pub post_process: PostProcessSteps,
    /// Influences kept per vertex by the weight limiting step.
    pub max_bone_weights: usize,
    /// Meshes referencing more bones than this are split.
    pub max_bones_per_mesh: usize,
    /// Last directory tried when resolving a material texture by file name.
    pub texture_root: String,
    /// Used when a clip does not carry its own tick rate.
    pub default_ticks_per_second: f64,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            post_process: PostProcessSteps::default(),
            max_bone_weights: MAX_BONE_INFLUENCES,
            max_bones_per_mesh: MAX_BONES,
            texture_root: "/".to_string(),
            default_ticks_per_second: 25.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Wrap playback time back to the start of the clip.
    #[default]
    Loop,
    /// Hold the last frame once the clip ends.
    Clamp,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PlaybackSettings {
    pub mode: PlaybackMode,
    pub speed: f32,
    pub autoplay: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            mode: PlaybackMode::Loop,
            speed: 1.0,
            autoplay: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct ModelConfig {
    pub import: ImportSettings,
    pub playback: PlaybackSettings,
}

impl ModelConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}
