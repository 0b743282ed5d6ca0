use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};

/// Bone influence slots per vertex; matches the `ivec4`/`vec4` shader attributes.
pub const MAX_BONE_INFLUENCES: usize = 4;

/// Interleaved vertex as laid out in the GPU vertex buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub texture_coordinates: [f32; 2],
    pub normal: [f32; 3],
    /// Mesh-local bone indices.
    pub bone_ids: [i32; MAX_BONE_INFLUENCES],
    pub bone_weights: [f32; MAX_BONE_INFLUENCES],
}

/// What happened to an influence passed to [`Vertex::try_add_bone_data`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoneSlotOutcome {
    Stored { slot: usize },
    Replaced { slot: usize, bone_id: i32, weight: f32 },
    Discarded,
}

impl Vertex {
    pub fn new(position: [f32; 3], texture_coordinates: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            texture_coordinates,
            normal,
            ..Self::default()
        }
    }

    /// Records one bone influence.
    ///
    /// Empty slots (weight exactly `0.0`) are filled first. Once all four are used the
    /// weakest slot is replaced if `weight` is strictly larger, otherwise the influence
    /// is dropped. A genuine zero-weight influence therefore looks like a free slot.
    pub fn try_add_bone_data(&mut self, bone_id: i32, weight: f32) -> BoneSlotOutcome {
        if let Some(slot) = self.bone_weights.iter().position(|&w| w == 0.0) {
            self.bone_ids[slot] = bone_id;
            self.bone_weights[slot] = weight;
            return BoneSlotOutcome::Stored { slot };
        }

        let mut weakest = 0;
        for slot in 1..MAX_BONE_INFLUENCES {
            if self.bone_weights[slot] < self.bone_weights[weakest] {
                weakest = slot;
            }
        }
        let weakest_weight = self.bone_weights[weakest];

        if weakest_weight < weight {
            let previous = self.bone_ids[weakest];
            tracing::trace!(
                "replaced bone {} (weight {}) with bone {} (weight {})",
                previous,
                weakest_weight,
                bone_id,
                weight
            );
            self.bone_ids[weakest] = bone_id;
            self.bone_weights[weakest] = weight;
            return BoneSlotOutcome::Replaced {
                slot: weakest,
                bone_id: previous,
                weight: weakest_weight,
            };
        }

        tracing::trace!("bone {} with weight {} was discarded", bone_id, weight);
        BoneSlotOutcome::Discarded
    }

    pub fn influence_count(&self) -> usize {
        self.bone_weights.iter().filter(|&&w| w != 0.0).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Float,
    Int,
}

/// One enabled vertex attribute of the interleaved layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: i32,
    pub kind: AttributeKind,
    pub offset: usize,
}

pub const VERTEX_STRIDE: usize = size_of::<Vertex>();

/// Attribute layout expected by the skinning shader. Bone attributes (locations 3
/// and 4) are only present for meshes with bones.
pub fn vertex_attributes(has_bones: bool) -> Vec<VertexAttribute> {
    let mut attributes = vec![
        VertexAttribute {
            location: 0,
            components: 3,
            kind: AttributeKind::Float,
            offset: offset_of!(Vertex, position),
        },
        VertexAttribute {
            location: 1,
            components: 2,
            kind: AttributeKind::Float,
            offset: offset_of!(Vertex, texture_coordinates),
        },
        VertexAttribute {
            location: 2,
            components: 3,
            kind: AttributeKind::Float,
            offset: offset_of!(Vertex, normal),
        },
    ];

    if has_bones {
        attributes.push(VertexAttribute {
            location: 3,
            components: MAX_BONE_INFLUENCES as i32,
            kind: AttributeKind::Int,
            offset: offset_of!(Vertex, bone_ids),
        });
        attributes.push(VertexAttribute {
            location: 4,
            components: MAX_BONE_INFLUENCES as i32,
            kind: AttributeKind::Float,
            offset: offset_of!(Vertex, bone_weights),
        });
    }

    attributes
}
