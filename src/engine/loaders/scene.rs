//! Importer-neutral scene graph handed to [`crate::Model`].
//!
//! Importers translate their native format into this shape; the model only ever
//! queries it and drops it once import finishes.

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::engine::error::ImportError;

pub type NodeIndex = usize;

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    /// Local-to-parent transform.
    pub transformation: Mat4,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
    /// Indices into [`ImportedScene::meshes`].
    pub meshes: Vec<usize>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, transformation: Mat4) -> Self {
        Self {
            name: name.into(),
            transformation,
            parent: None,
            children: Vec::new(),
            meshes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexWeight {
    pub vertex_id: u32,
    pub weight: f32,
}

#[derive(Debug, Clone)]
pub struct ImportedBone {
    pub name: String,
    pub offset_matrix: Mat4,
    pub weights: Vec<VertexWeight>,
}

#[derive(Debug, Clone, Default)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// First UV channel, when the source has one.
    pub texture_coordinates: Option<Vec<Vec2>>,
    /// Polygons as vertex index lists; triangles after triangulation.
    pub faces: Vec<Vec<u32>>,
    pub material_index: usize,
    pub bones: Vec<ImportedBone>,
}

impl ImportedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_bones(&self) -> bool {
        !self.bones.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKey {
    ColorDiffuse,
    ColorAmbient,
    ColorSpecular,
    Shininess,
    ShininessStrength,
    EnableWireframe,
    Reflectivity,
    TwoSided,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialProperty {
    Color(Vec3),
    Float(f32),
    Bool(bool),
}

#[derive(Debug, Clone, Default)]
pub struct ImportedMaterial {
    pub name: String,
    /// Diffuse texture reference: a file path or `*N` for an embedded texture.
    pub diffuse_texture: Option<String>,
    pub properties: HashMap<MaterialKey, MaterialProperty>,
}

impl ImportedMaterial {
    pub fn with_property(mut self, key: MaterialKey, property: MaterialProperty) -> Self {
        self.properties.insert(key, property);
        self
    }

    pub fn color(&self, key: MaterialKey) -> Option<Vec3> {
        match self.properties.get(&key)? {
            MaterialProperty::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn float(&self, key: MaterialKey) -> Option<f32> {
        match self.properties.get(&key)? {
            MaterialProperty::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn flag(&self, key: MaterialKey) -> Option<bool> {
        match self.properties.get(&key)? {
            MaterialProperty::Bool(b) => Some(*b),
            MaterialProperty::Float(f) => Some(*f != 0.0),
            _ => None,
        }
    }
}

/// An image stored inside the asset.
///
/// `height == 0` marks a compressed file blob of `data.len()` bytes (PNG, JPEG, ...);
/// otherwise `data` holds `width * height` RGBA8 texels.
#[derive(Debug, Clone)]
pub struct EmbeddedTexture {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorKey {
    pub time: f64,
    pub value: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuatKey {
    pub time: f64,
    pub value: Quat,
}

/// Keyframes targeting one node, times in ticks.
#[derive(Debug, Clone, Default)]
pub struct NodeAnimation {
    pub node_name: String,
    pub position_keys: Vec<VectorKey>,
    pub rotation_keys: Vec<QuatKey>,
    pub scaling_keys: Vec<VectorKey>,
}

#[derive(Debug, Clone, Default)]
pub struct ImportedAnimation {
    pub name: String,
    /// Length in ticks.
    pub duration: f64,
    /// `0.0` when the source format does not say.
    pub ticks_per_second: f64,
    pub channels: Vec<NodeAnimation>,
}

#[derive(Debug, Clone)]
pub struct ImportedScene {
    pub nodes: Vec<SceneNode>,
    pub root: NodeIndex,
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
    pub animations: Vec<ImportedAnimation>,
    pub textures: Vec<EmbeddedTexture>,
}

impl ImportedScene {
    /// A scene holding only an identity root node.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![SceneNode::new(root_name, Mat4::IDENTITY)],
            root: 0,
            meshes: Vec::new(),
            materials: Vec::new(),
            animations: Vec::new(),
            textures: Vec::new(),
        }
    }

    /// Adds a node under `parent` and returns its index.
    pub fn add_node(&mut self, parent: NodeIndex, mut node: SceneNode) -> NodeIndex {
        let index = self.nodes.len();
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent].children.push(index);
        index
    }

    pub fn root_node(&self) -> &SceneNode {
        &self.nodes[self.root]
    }

    pub fn node(&self, index: NodeIndex) -> &SceneNode {
        &self.nodes[index]
    }

    pub fn parent_name(&self, index: NodeIndex) -> Option<&str> {
        let parent = self.nodes.get(index)?.parent?;
        self.nodes.get(parent).map(|node| node.name.as_str())
    }

    /// Checks that the nodes reachable from `root` form a tree with in-range
    /// child indices.
    pub fn validate(&self) -> Result<(), ImportError> {
        if self.root >= self.nodes.len() {
            return Err(ImportError::InvalidScene(format!(
                "root node {} out of range ({} nodes)",
                self.root,
                self.nodes.len()
            )));
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            if std::mem::replace(&mut visited[index], true) {
                return Err(ImportError::InvalidScene(format!(
                    "node '{}' is reached more than once",
                    self.nodes[index].name
                )));
            }
            for &child in &self.nodes[index].children {
                if child >= self.nodes.len() {
                    return Err(ImportError::InvalidScene(format!(
                        "node '{}' has child {} out of range ({} nodes)",
                        self.nodes[index].name,
                        child,
                        self.nodes.len()
                    )));
                }
                stack.push(child);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> ImportedScene {
        let mut scene = ImportedScene::new("RootNode");
        let armature = scene.add_node(0, SceneNode::new("Armature", Mat4::IDENTITY));
        scene.add_node(armature, SceneNode::new("hip", Mat4::IDENTITY));
        scene
    }

    #[test]
    fn well_formed_tree_is_valid() {
        let scene = chain();
        assert!(scene.validate().is_ok());
        assert_eq!(scene.parent_name(2), Some("Armature"));
        assert_eq!(scene.parent_name(0), None);
    }

    #[test]
    fn dangling_child_is_rejected() {
        let mut scene = ImportedScene::new("RootNode");
        scene.nodes[0].children.push(7);
        assert!(matches!(scene.validate(), Err(ImportError::InvalidScene(_))));
    }

    #[test]
    fn dangling_root_is_rejected() {
        let mut scene = chain();
        scene.root = 3;
        assert!(matches!(scene.validate(), Err(ImportError::InvalidScene(_))));
    }

    #[test]
    fn cycles_and_shared_children_are_rejected() {
        let mut cyclic = chain();
        cyclic.nodes[2].children.push(1);
        assert!(matches!(cyclic.validate(), Err(ImportError::InvalidScene(_))));

        let mut shared = chain();
        shared.nodes[0].children.push(2);
        assert!(matches!(shared.validate(), Err(ImportError::InvalidScene(_))));
    }

    #[test]
    fn parent_name_tolerates_dangling_links() {
        let mut scene = chain();
        scene.nodes[2].parent = Some(40);
        assert_eq!(scene.parent_name(2), None);
        assert_eq!(scene.parent_name(9), None);
    }
}
