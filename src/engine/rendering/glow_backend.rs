use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use glam::{Mat4, Vec3};
use glow::HasContext;

use crate::engine::components::vertex::{vertex_attributes, AttributeKind, Vertex, VERTEX_STRIDE};
use crate::engine::error::RenderError;
use crate::engine::rendering::device::*;
use crate::engine::rendering::program::*;
use crate::engine::utils::math::flatten_matrices;

/// [`RenderDevice`] over a current OpenGL 3.3 context.
pub struct GlowDevice {
    gl: Rc<glow::Context>,
}

impl GlowDevice {
    pub fn new(gl: Rc<glow::Context>) -> Self {
        Self { gl }
    }

    pub fn gl(&self) -> &Rc<glow::Context> {
        &self.gl
    }

    /// Viewport, clear and depth test for a new frame.
    pub fn begin_frame(&self, width: u32, height: u32) {
        unsafe {
            self.gl.viewport(0, 0, width as i32, height as i32);
            self.gl.enable(glow::DEPTH_TEST);
            self.gl.clear_color(0.1, 0.1, 0.1, 1.0);
            self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }
}

fn creation_error(object: &'static str) -> impl FnOnce(String) -> RenderError {
    move |message| RenderError::ObjectCreation { object, message }
}

impl RenderDevice for GlowDevice {
    fn create_texture_rgba8(&self, width: u32, height: u32, texels: &[u8]) -> Result<TextureHandle, RenderError> {
        let gl = &self.gl;
        unsafe {
            let texture = gl.create_texture().map_err(creation_error("texture"))?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(texels)),
            );
            gl.generate_mipmap(glow::TEXTURE_2D);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR_MIPMAP_LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
            gl.bind_texture(glow::TEXTURE_2D, None);
            Ok(TextureHandle(texture.0))
        }
    }

    fn bind_texture(&self, unit: u32, texture: TextureHandle) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, Some(glow::NativeTexture(texture.0)));
        }
    }

    fn delete_texture(&self, texture: TextureHandle) {
        unsafe { self.gl.delete_texture(glow::NativeTexture(texture.0)) }
    }

    fn create_mesh_buffers(&self, vertices: &[Vertex], indices: &[u32], has_bones: bool) -> Result<MeshBuffers, RenderError> {
        let gl = &self.gl;
        unsafe {
            let vao = gl.create_vertex_array().map_err(creation_error("vertex array"))?;
            gl.bind_vertex_array(Some(vao));

            let vbo = gl.create_buffer().map_err(creation_error("vertex buffer"))?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(vertices), glow::STATIC_DRAW);

            let ebo = gl.create_buffer().map_err(creation_error("index buffer"))?;
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
            gl.buffer_data_u8_slice(glow::ELEMENT_ARRAY_BUFFER, bytemuck::cast_slice(indices), glow::STATIC_DRAW);

            let stride = VERTEX_STRIDE as i32;
            for attribute in vertex_attributes(has_bones) {
                gl.enable_vertex_attrib_array(attribute.location);
                match attribute.kind {
                    AttributeKind::Int => gl.vertex_attrib_pointer_i32(
                        attribute.location,
                        attribute.components,
                        glow::INT,
                        stride,
                        attribute.offset as i32,
                    ),
                    AttributeKind::Float => gl.vertex_attrib_pointer_f32(
                        attribute.location,
                        attribute.components,
                        glow::FLOAT,
                        false,
                        stride,
                        attribute.offset as i32,
                    ),
                }
            }

            gl.bind_vertex_array(None);

            Ok(MeshBuffers {
                vertex_array: VertexArrayHandle(vao.0),
                vertex_buffer: BufferHandle(vbo.0),
                index_buffer: BufferHandle(ebo.0),
            })
        }
    }

    fn delete_mesh_buffers(&self, buffers: MeshBuffers) {
        unsafe {
            self.gl.delete_vertex_array(glow::NativeVertexArray(buffers.vertex_array.0));
            self.gl.delete_buffer(glow::NativeBuffer(buffers.vertex_buffer.0));
            self.gl.delete_buffer(glow::NativeBuffer(buffers.index_buffer.0));
        }
    }

    fn bind_vertex_array(&self, vertex_array: Option<VertexArrayHandle>) {
        unsafe {
            self.gl
                .bind_vertex_array(vertex_array.map(|v| glow::NativeVertexArray(v.0)));
        }
    }

    fn set_raster_state(&self, state: RasterState) {
        unsafe {
            if state.cull_back_faces {
                self.gl.enable(glow::CULL_FACE);
                self.gl.cull_face(glow::BACK);
            } else {
                self.gl.disable(glow::CULL_FACE);
            }
            let mode = if state.wireframe { glow::LINE } else { glow::FILL };
            self.gl.polygon_mode(glow::FRONT_AND_BACK, mode);
        }
    }

    fn draw_indexed_triangles(&self, index_count: usize) {
        unsafe {
            self.gl
                .draw_elements(glow::TRIANGLES, index_count as i32, glow::UNSIGNED_INT, 0);
        }
    }

    fn take_error(&self) -> Option<u32> {
        match unsafe { self.gl.get_error() } {
            glow::NO_ERROR => None,
            code => Some(code),
        }
    }
}

fn compile_shader(gl: &glow::Context, shader_type: u32, source: &str) -> Result<glow::Shader, RenderError> {
    unsafe {
        let shader = gl.create_shader(shader_type).map_err(creation_error("shader"))?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(RenderError::ShaderCompile(log));
        }
        Ok(shader)
    }
}

/// Linked GLSL program with a per-name uniform location cache.
pub struct GlShaderProgram {
    gl: Rc<glow::Context>,
    program: glow::Program,
    locations: RefCell<HashMap<String, Option<glow::UniformLocation>>>,
}

impl GlShaderProgram {
    pub fn new(gl: Rc<glow::Context>, vertex_source: &str, fragment_source: &str) -> Result<Self, RenderError> {
        let vertex = compile_shader(&gl, glow::VERTEX_SHADER, vertex_source)?;
        let fragment = match compile_shader(&gl, glow::FRAGMENT_SHADER, fragment_source) {
            Ok(fragment) => fragment,
            Err(err) => {
                unsafe { gl.delete_shader(vertex) };
                return Err(err);
            }
        };

        unsafe {
            let program = gl.create_program().map_err(creation_error("program"))?;
            gl.attach_shader(program, vertex);
            gl.attach_shader(program, fragment);
            gl.link_program(program);

            let linked = gl.get_program_link_status(program);
            gl.detach_shader(program, vertex);
            gl.detach_shader(program, fragment);
            gl.delete_shader(vertex);
            gl.delete_shader(fragment);

            if !linked {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(RenderError::ProgramLink(log));
            }

            Ok(Self {
                gl,
                program,
                locations: RefCell::new(HashMap::new()),
            })
        }
    }

    /// The bundled skinning program.
    pub fn skinned(gl: Rc<glow::Context>) -> Result<Self, RenderError> {
        Self::new(gl, VERTEX_SHADER_SOURCE, FRAGMENT_SHADER_SOURCE)
    }

    pub fn delete(self) {
        unsafe { self.gl.delete_program(self.program) }
    }

    fn location(&self, slot: UniformSlot) -> glow::UniformLocation {
        glow::NativeUniformLocation(slot.0)
    }
}

impl ShaderProgram for GlShaderProgram {
    fn use_program(&self) {
        unsafe { self.gl.use_program(Some(self.program)) }
    }

    fn uniform_location(&self, name: &str) -> Option<UniformSlot> {
        let mut locations = self.locations.borrow_mut();
        let location = locations
            .entry(name.to_string())
            .or_insert_with(|| unsafe { self.gl.get_uniform_location(self.program, name) });
        location.as_ref().map(|l| UniformSlot(l.0))
    }

    fn set_mat4(&self, slot: UniformSlot, value: &Mat4) {
        let location = self.location(slot);
        unsafe {
            self.gl
                .uniform_matrix_4_f32_slice(Some(&location), false, &value.to_cols_array());
        }
    }

    fn set_mat4_array(&self, slot: UniformSlot, values: &[Mat4]) {
        let location = self.location(slot);
        unsafe {
            self.gl
                .uniform_matrix_4_f32_slice(Some(&location), false, &flatten_matrices(values));
        }
    }

    fn set_vec3(&self, slot: UniformSlot, value: Vec3) {
        let location = self.location(slot);
        unsafe { self.gl.uniform_3_f32(Some(&location), value.x, value.y, value.z) }
    }

    fn set_i32(&self, slot: UniformSlot, value: i32) {
        let location = self.location(slot);
        unsafe { self.gl.uniform_1_i32(Some(&location), value) }
    }
}
