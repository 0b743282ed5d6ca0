pub mod actor;
pub mod animation;
pub mod animator;
pub mod camera;
pub mod material;
pub mod mesh;
pub mod model;
pub mod node;
pub mod skeleton;
pub mod texture;
pub mod transform;
pub mod vertex;

pub use actor::{Actor, FrameContext};
pub use animation::{Animation, BoneTrack};
pub use animator::{pose_skeleton, Animator};
pub use camera::Camera;
pub use material::Material;
pub use mesh::{Mesh, MAX_BONES};
pub use model::{Model, ModelStats};
pub use node::Node;
pub use skeleton::{Bone, BoneId, Skeleton};
pub use texture::Texture;
pub use transform::ActorTransform;
pub use vertex::{BoneSlotOutcome, Vertex, MAX_BONE_INFLUENCES};
