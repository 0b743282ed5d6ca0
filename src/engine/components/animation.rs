use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};

use crate::engine::loaders::scene::{ImportedAnimation, NodeAnimation, QuatKey, VectorKey};
use crate::engine::utils::math::{decompose, trs_matrix};

/// Keyframes for one bone; times in ticks.
#[derive(Debug, Clone, Default)]
pub struct BoneTrack {
    pub bone_name: String,
    pub position_keys: Vec<VectorKey>,
    pub rotation_keys: Vec<QuatKey>,
    pub scaling_keys: Vec<VectorKey>,
}

impl From<&NodeAnimation> for BoneTrack {
    fn from(channel: &NodeAnimation) -> Self {
        Self {
            bone_name: channel.node_name.clone(),
            position_keys: channel.position_keys.clone(),
            rotation_keys: channel.rotation_keys.clone(),
            scaling_keys: channel.scaling_keys.clone(),
        }
    }
}

/// Index of the key segment containing `time` and the blend factor inside it.
/// Times outside the key range clamp to the first or last key.
fn segment(times: impl ExactSizeIterator<Item = f64> + Clone, time: f64) -> (usize, usize, f32) {
    let count = times.len();
    let mut previous = 0;
    for (i, key_time) in times.clone().enumerate() {
        if key_time <= time {
            previous = i;
        } else {
            break;
        }
    }
    let next = (previous + 1).min(count - 1);

    let previous_time = times.clone().nth(previous).unwrap_or(0.0);
    let next_time = times.clone().nth(next).unwrap_or(previous_time);
    let factor = if next_time > previous_time && time > previous_time {
        ((time - previous_time) / (next_time - previous_time)).clamp(0.0, 1.0) as f32
    } else {
        0.0
    };
    (previous, next, factor)
}

fn sample_vector(keys: &[VectorKey], time: f64) -> Option<Vec3> {
    if keys.is_empty() {
        return None;
    }
    let (a, b, t) = segment(keys.iter().map(|k| k.time), time);
    Some(keys[a].value.lerp(keys[b].value, t))
}

fn sample_rotation(keys: &[QuatKey], time: f64) -> Option<Quat> {
    if keys.is_empty() {
        return None;
    }
    let (a, b, t) = segment(keys.iter().map(|k| k.time), time);
    Some(keys[a].value.slerp(keys[b].value, t).normalize())
}

impl BoneTrack {
    /// Local transform at `time`. Channels without keys keep the bind pose component.
    pub fn sample(&self, time: f64, bind_matrix: &Mat4) -> Mat4 {
        let (bind_translation, bind_rotation, bind_scale) = decompose(bind_matrix);
        let translation = sample_vector(&self.position_keys, time).unwrap_or(bind_translation);
        let rotation = sample_rotation(&self.rotation_keys, time).unwrap_or(bind_rotation);
        let scale = sample_vector(&self.scaling_keys, time).unwrap_or(bind_scale);
        trs_matrix(translation, rotation, scale)
    }
}

/// A keyframe clip, tracks keyed by bone name.
#[derive(Debug, Clone, Default)]
pub struct Animation {
    pub name: String,
    /// Length in ticks.
    pub duration: f64,
    pub ticks_per_second: f64,
    tracks: HashMap<String, BoneTrack>,
}

impl Animation {
    pub fn new(name: impl Into<String>, duration: f64, ticks_per_second: f64, tracks: Vec<BoneTrack>) -> Self {
        Self {
            name: name.into(),
            duration,
            ticks_per_second,
            tracks: tracks.into_iter().map(|t| (t.bone_name.clone(), t)).collect(),
        }
    }

    /// Converts an imported clip; a missing tick rate falls back to `default_ticks_per_second`.
    pub fn from_imported(imported: &ImportedAnimation, default_ticks_per_second: f64) -> Self {
        let ticks_per_second = if imported.ticks_per_second > 0.0 {
            imported.ticks_per_second
        } else {
            default_ticks_per_second
        };
        Self::new(
            imported.name.clone(),
            imported.duration,
            ticks_per_second,
            imported.channels.iter().map(BoneTrack::from).collect(),
        )
    }

    pub fn track(&self, bone_name: &str) -> Option<&BoneTrack> {
        self.tracks.get(bone_name)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.ticks_per_second > 0.0 {
            self.duration / self.ticks_per_second
        } else {
            0.0
        }
    }
}
