use std::num::NonZeroU32;

use crate::engine::components::vertex::Vertex;
use crate::engine::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub NonZeroU32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArrayHandle(pub NonZeroU32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub NonZeroU32);

/// GPU objects backing one mesh: the vertex array plus its vertex and index buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBuffers {
    pub vertex_array: VertexArrayHandle,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
}

/// Fixed-function state a material asks for before its meshes are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RasterState {
    pub cull_back_faces: bool,
    pub wireframe: bool,
}

/// The GPU operations the model subsystem needs from the graphics context.
///
/// All calls happen on the thread that owns the context.
pub trait RenderDevice {
    /// Uploads tightly packed RGBA8 texels.
    fn create_texture_rgba8(&self, width: u32, height: u32, texels: &[u8]) -> Result<TextureHandle, RenderError>;
    fn bind_texture(&self, unit: u32, texture: TextureHandle);
    fn delete_texture(&self, texture: TextureHandle);

    /// Creates the vertex array for `vertices`/`indices`; bone attributes are only
    /// enabled when `has_bones` is set.
    fn create_mesh_buffers(&self, vertices: &[Vertex], indices: &[u32], has_bones: bool) -> Result<MeshBuffers, RenderError>;
    fn delete_mesh_buffers(&self, buffers: MeshBuffers);

    fn bind_vertex_array(&self, vertex_array: Option<VertexArrayHandle>);
    fn set_raster_state(&self, state: RasterState);
    fn draw_indexed_triangles(&self, index_count: usize);

    /// Pops the oldest pending error code, if any.
    fn take_error(&self) -> Option<u32>;
}
