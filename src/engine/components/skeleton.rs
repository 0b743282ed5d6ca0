use std::collections::HashMap;

use glam::Mat4;

use crate::engine::error::SkeletonError;

/// Index of a bone inside its skeleton. Doubles as the bone's global index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoneId(pub usize);

#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    /// Mesh space -> bone space at bind pose. `None` until a mesh supplies it.
    offset_matrix: Option<Mat4>,
    /// Local-to-parent transform taken from the scene graph.
    pub bind_matrix: Mat4,
    /// Animated bone-to-model transform of the current frame.
    pub world_matrix: Mat4,
    /// `world_matrix * offset_matrix`, uploaded for skinning.
    pub animated_matrix: Mat4,
    pub parent: Option<BoneId>,
    pub children: Vec<BoneId>,
}

impl Bone {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            offset_matrix: None,
            bind_matrix: Mat4::IDENTITY,
            world_matrix: Mat4::IDENTITY,
            animated_matrix: Mat4::IDENTITY,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn offset_matrix(&self) -> Mat4 {
        self.offset_matrix.unwrap_or(Mat4::IDENTITY)
    }

    pub fn has_offset(&self) -> bool {
        self.offset_matrix.is_some()
    }
}

/// Arena of bones in discovery order.
///
/// Indices are append-only and never renumbered, so shader arrays indexed by them
/// stay valid for the whole life of the model.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    index_by_name: HashMap<String, BoneId>,
    roots: Vec<BoneId>,
    /// Cached [`Skeleton::hierarchy_order`], rebuilt after bones or links change.
    order: Vec<BoneId>,
    order_stale: bool,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, id: BoneId) -> &Bone {
        &self.bones[id.0]
    }

    pub fn bone_mut(&mut self, id: BoneId) -> &mut Bone {
        &mut self.bones[id.0]
    }

    pub fn find_bone(&self, name: &str) -> Option<BoneId> {
        self.index_by_name.get(name).copied()
    }

    /// Appends a new bone and assigns it the next index.
    pub fn insert(&mut self, name: &str) -> Result<BoneId, SkeletonError> {
        if self.index_by_name.contains_key(name) {
            return Err(SkeletonError::DuplicateBone(name.to_string()));
        }
        Ok(self.push_bone(name))
    }

    pub fn find_or_insert(&mut self, name: &str) -> BoneId {
        self.find_bone(name).unwrap_or_else(|| self.push_bone(name))
    }

    fn push_bone(&mut self, name: &str) -> BoneId {
        let id = BoneId(self.bones.len());
        self.bones.push(Bone::new(name));
        self.index_by_name.insert(name.to_string(), id);
        self.order_stale = true;
        id
    }

    pub fn bone_index(&self, name: &str) -> Result<usize, SkeletonError> {
        self.find_bone(name)
            .map(|id| id.0)
            .ok_or_else(|| SkeletonError::UnknownBone(name.to_string()))
    }

    /// Stores the bind-pose offset the first time one is supplied. Returns whether
    /// the value was taken.
    pub fn set_offset_once(&mut self, id: BoneId, offset: Mat4) -> bool {
        let bone = &mut self.bones[id.0];
        if bone.offset_matrix.is_some() {
            return false;
        }
        bone.offset_matrix = Some(offset);
        true
    }

    /// Links `child` under the bone called `parent_name`.
    ///
    /// An unknown parent leaves the child unparented. A bone keeps the first parent it
    /// is linked to.
    pub fn link_to_parent(&mut self, child: BoneId, parent_name: &str) -> Option<BoneId> {
        let parent = self.find_bone(parent_name)?;
        if parent == child || self.is_ancestor(child, parent) {
            tracing::warn!(
                "ignoring cyclic link of bone '{}' under '{}'",
                self.bones[child.0].name,
                parent_name
            );
            return None;
        }

        match self.bones[child.0].parent {
            Some(existing) => Some(existing),
            None => {
                self.bones[child.0].parent = Some(parent);
                let children = &mut self.bones[parent.0].children;
                if !children.contains(&child) {
                    children.push(child);
                }
                self.order_stale = true;
                Some(parent)
            }
        }
    }

    fn is_ancestor(&self, ancestor: BoneId, mut bone: BoneId) -> bool {
        while let Some(parent) = self.bones[bone.0].parent {
            if parent == ancestor {
                return true;
            }
            bone = parent;
        }
        false
    }

    /// Registers the bone matching the scene root for hierarchy traversal.
    pub fn set_root(&mut self, name: &str) -> Option<BoneId> {
        let id = self.find_bone(name)?;
        if !self.roots.contains(&id) {
            self.roots.insert(0, id);
            self.order_stale = true;
        }
        Some(id)
    }

    pub fn roots(&self) -> &[BoneId] {
        &self.roots
    }

    /// Every bone, parents strictly before their children.
    ///
    /// Traversal starts at the registered root, then covers the remaining parentless
    /// bones (those only known through mesh data) in index order.
    pub fn hierarchy_order(&mut self) -> &[BoneId] {
        self.refresh_order();
        &self.order
    }

    /// Recomputes world and skinning matrices top-down from the local transform
    /// `local` returns for each bone.
    pub fn update_matrices(&mut self, mut local: impl FnMut(&Bone) -> Mat4) {
        self.refresh_order();
        for &id in &self.order {
            let bone = &self.bones[id.0];
            let local_matrix = local(bone);
            let world = match bone.parent {
                Some(parent) => self.bones[parent.0].world_matrix * local_matrix,
                None => local_matrix,
            };
            let animated = world * bone.offset_matrix();

            let bone = &mut self.bones[id.0];
            bone.world_matrix = world;
            bone.animated_matrix = animated;
        }
    }

    fn refresh_order(&mut self) {
        if !self.order_stale {
            return;
        }
        self.order_stale = false;
        self.order.clear();

        let mut visited = vec![false; self.bones.len()];
        let mut stack: Vec<BoneId> = Vec::new();
        let starts = self.roots.iter().copied().chain(
            self.bones
                .iter()
                .enumerate()
                .filter(|(_, bone)| bone.parent.is_none())
                .map(|(index, _)| BoneId(index)),
        );

        for start in starts {
            if visited[start.0] || self.bones[start.0].parent.is_some() {
                continue;
            }
            stack.push(start);
            while let Some(id) = stack.pop() {
                if visited[id.0] {
                    continue;
                }
                visited[id.0] = true;
                self.order.push(id);
                stack.extend(self.bones[id.0].children.iter().rev().copied());
            }
        }
    }

    /// Skinning matrices of all bones in index order.
    pub fn animated_matrices(&self) -> Vec<Mat4> {
        self.bones.iter().map(|bone| bone.animated_matrix).collect()
    }
}
