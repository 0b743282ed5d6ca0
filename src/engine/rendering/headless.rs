//! A [`RenderDevice`] and [`ShaderProgram`] that keep bookkeeping instead of talking
//! to a GPU. Used for batch runs without a display and by the test suite.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;

use glam::{Mat4, Vec3};

use crate::engine::components::vertex::Vertex;
use crate::engine::error::RenderError;
use crate::engine::rendering::device::*;
use crate::engine::rendering::program::*;

/// Counters collected by [`HeadlessDevice`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCounters {
    pub textures_created: usize,
    pub textures_deleted: usize,
    pub mesh_buffers_created: usize,
    pub mesh_buffers_deleted: usize,
    pub draw_calls: usize,
    pub indices_drawn: usize,
}

#[derive(Default)]
pub struct HeadlessDevice {
    next_id: Cell<u32>,
    counters: Cell<DeviceCounters>,
    live_textures: RefCell<HashSet<TextureHandle>>,
    live_vertex_arrays: RefCell<HashSet<VertexArrayHandle>>,
    bound_textures: RefCell<HashMap<u32, TextureHandle>>,
    bound_vertex_array: Cell<Option<VertexArrayHandle>>,
    raster_state: Cell<RasterState>,
    pending_errors: RefCell<Vec<u32>>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> DeviceCounters {
        self.counters.get()
    }

    pub fn live_textures(&self) -> usize {
        self.live_textures.borrow().len()
    }

    pub fn live_mesh_buffers(&self) -> usize {
        self.live_vertex_arrays.borrow().len()
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureHandle> {
        self.bound_textures.borrow().get(&unit).copied()
    }

    pub fn raster_state(&self) -> RasterState {
        self.raster_state.get()
    }

    /// Queues an error code to be reported by the next [`RenderDevice::take_error`].
    pub fn inject_error(&self, code: u32) {
        self.pending_errors.borrow_mut().push(code);
    }

    fn allocate(&self) -> NonZeroU32 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        NonZeroU32::new(id).unwrap_or(NonZeroU32::MIN)
    }

    fn count(&self, update: impl FnOnce(&mut DeviceCounters)) {
        let mut counters = self.counters.get();
        update(&mut counters);
        self.counters.set(counters);
    }
}

impl RenderDevice for HeadlessDevice {
    fn create_texture_rgba8(&self, width: u32, height: u32, texels: &[u8]) -> Result<TextureHandle, RenderError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || texels.len() != expected {
            return Err(RenderError::ObjectCreation {
                object: "texture",
                message: format!("{}x{} texture needs {} bytes, got {}", width, height, expected, texels.len()),
            });
        }
        let handle = TextureHandle(self.allocate());
        self.live_textures.borrow_mut().insert(handle);
        self.count(|c| c.textures_created += 1);
        Ok(handle)
    }

    fn bind_texture(&self, unit: u32, texture: TextureHandle) {
        self.bound_textures.borrow_mut().insert(unit, texture);
    }

    fn delete_texture(&self, texture: TextureHandle) {
        if self.live_textures.borrow_mut().remove(&texture) {
            self.count(|c| c.textures_deleted += 1);
        } else {
            tracing::warn!("headless: delete of unknown texture {:?}", texture);
        }
    }

    fn create_mesh_buffers(&self, vertices: &[Vertex], indices: &[u32], _has_bones: bool) -> Result<MeshBuffers, RenderError> {
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(RenderError::ObjectCreation {
                object: "index buffer",
                message: format!("index {} out of range for {} vertices", bad, vertices.len()),
            });
        }
        let buffers = MeshBuffers {
            vertex_array: VertexArrayHandle(self.allocate()),
            vertex_buffer: BufferHandle(self.allocate()),
            index_buffer: BufferHandle(self.allocate()),
        };
        self.live_vertex_arrays.borrow_mut().insert(buffers.vertex_array);
        self.count(|c| c.mesh_buffers_created += 1);
        Ok(buffers)
    }

    fn delete_mesh_buffers(&self, buffers: MeshBuffers) {
        if self.live_vertex_arrays.borrow_mut().remove(&buffers.vertex_array) {
            self.count(|c| c.mesh_buffers_deleted += 1);
        } else {
            tracing::warn!("headless: delete of unknown vertex array {:?}", buffers.vertex_array);
        }
    }

    fn bind_vertex_array(&self, vertex_array: Option<VertexArrayHandle>) {
        self.bound_vertex_array.set(vertex_array);
    }

    fn set_raster_state(&self, state: RasterState) {
        self.raster_state.set(state);
    }

    fn draw_indexed_triangles(&self, index_count: usize) {
        if self.bound_vertex_array.get().is_none() {
            self.pending_errors.borrow_mut().push(glow::INVALID_OPERATION);
            return;
        }
        self.count(|c| {
            c.draw_calls += 1;
            c.indices_drawn += index_count;
        });
    }

    fn take_error(&self) -> Option<u32> {
        let mut errors = self.pending_errors.borrow_mut();
        if errors.is_empty() {
            None
        } else {
            Some(errors.remove(0))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Mat4Array(Vec<Mat4>),
    Vec3(Vec3),
    Int(i32),
}

/// Shader program stand-in that declares the bundled shader's uniforms and records
/// every upload.
pub struct HeadlessProgram {
    declared: Vec<&'static str>,
    uses: Cell<usize>,
    uploads: RefCell<Vec<(&'static str, UniformValue)>>,
}

impl Default for HeadlessProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessProgram {
    pub fn new() -> Self {
        Self::with_uniforms(&[
            uniforms::MODEL_MATRIX,
            uniforms::PROJECTION_VIEW_MATRIX,
            uniforms::CAMERA_POSITION,
            uniforms::HAS_BONES,
            uniforms::BONES_MATRICES,
            uniforms::TEXTURE,
            uniforms::HAS_TEXTURE,
            uniforms::DIFFUSE_COLOR,
        ])
    }

    pub fn with_uniforms(declared: &[&'static str]) -> Self {
        Self {
            declared: declared.to_vec(),
            uses: Cell::new(0),
            uploads: RefCell::new(Vec::new()),
        }
    }

    pub fn use_count(&self) -> usize {
        self.uses.get()
    }

    /// Number of uploads to `name`.
    pub fn upload_count(&self, name: &str) -> usize {
        self.uploads.borrow().iter().filter(|(n, _)| *n == name).count()
    }

    /// Most recent value uploaded to `name`.
    pub fn last_value(&self, name: &str) -> Option<UniformValue> {
        self.uploads
            .borrow()
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
    }

    /// Every value uploaded to `name`, oldest first.
    pub fn values(&self, name: &str) -> Vec<UniformValue> {
        self.uploads
            .borrow()
            .iter()
            .filter(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn clear_uploads(&self) {
        self.uploads.borrow_mut().clear();
    }

    fn record(&self, slot: UniformSlot, value: UniformValue) {
        match self.declared.get(slot.0 as usize) {
            Some(&name) => self.uploads.borrow_mut().push((name, value)),
            None => tracing::warn!("headless: upload to undeclared slot {}", slot.0),
        }
    }
}

impl ShaderProgram for HeadlessProgram {
    fn use_program(&self) {
        self.uses.set(self.uses.get() + 1);
    }

    fn uniform_location(&self, name: &str) -> Option<UniformSlot> {
        self.declared
            .iter()
            .position(|&declared| declared == name)
            .map(|index| UniformSlot(index as u32))
    }

    fn set_mat4(&self, slot: UniformSlot, value: &Mat4) {
        self.record(slot, UniformValue::Mat4(*value));
    }

    fn set_mat4_array(&self, slot: UniformSlot, values: &[Mat4]) {
        self.record(slot, UniformValue::Mat4Array(values.to_vec()));
    }

    fn set_vec3(&self, slot: UniformSlot, value: Vec3) {
        self.record(slot, UniformValue::Vec3(value));
    }

    fn set_i32(&self, slot: UniformSlot, value: i32) {
        self.record(slot, UniformValue::Int(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_size_is_validated() {
        let device = HeadlessDevice::new();
        assert!(device.create_texture_rgba8(2, 2, &[0; 16]).is_ok());
        assert!(device.create_texture_rgba8(2, 2, &[0; 12]).is_err());
        assert_eq!(device.live_textures(), 1);
    }

    #[test]
    fn handles_are_unique() {
        let device = HeadlessDevice::new();
        let a = device.create_texture_rgba8(1, 1, &[0; 4]).unwrap();
        let b = device.create_texture_rgba8(1, 1, &[0; 4]).unwrap();
        assert_ne!(a, b);
        device.delete_texture(a);
        device.delete_texture(b);
        assert_eq!(device.live_textures(), 0);
        assert_eq!(device.counters().textures_deleted, 2);
    }

    #[test]
    fn drawing_without_vertex_array_reports_an_error() {
        let device = HeadlessDevice::new();
        device.draw_indexed_triangles(3);
        assert_eq!(device.take_error(), Some(glow::INVALID_OPERATION));
        assert_eq!(device.take_error(), None);
        assert_eq!(device.counters().draw_calls, 0);
    }

    #[test]
    fn program_records_declared_uniforms_only() {
        let program = HeadlessProgram::with_uniforms(&[uniforms::HAS_BONES]);
        program.set_i32_named(uniforms::HAS_BONES, 1);
        program.set_vec3_named(uniforms::DIFFUSE_COLOR, Vec3::ONE);
        assert_eq!(program.upload_count(uniforms::HAS_BONES), 1);
        assert_eq!(program.upload_count(uniforms::DIFFUSE_COLOR), 0);
        assert_eq!(program.last_value(uniforms::HAS_BONES), Some(UniformValue::Int(1)));
    }
}
