//! OpenGL backend on top of `glow`.
//!
//! Wraps a `glow::Context` created by the host windowing layer. The context
//! must be current on the calling thread for every call. Requires OpenGL 3.3
//! (instanced arrays and attribute divisors); debug labels are forwarded only
//! when `GL_KHR_debug` or OpenGL 4.3 is available.

use std::num::NonZeroU32;

use glint_core::mesh::PrimitiveTopology;
use glow::HasContext;

use super::{
    ActiveAttribute, ActiveUniform, AttribPointer, BufferId, BufferTarget, BufferUsage,
    DrawCommand, GpuBackend, GpuObject, IndexType, ProgramId, ShaderId, ShaderStage,
    UniformLocation, VertexArrayId,
};
use crate::error::{GraphicsError, GraphicsResult};
use crate::layout::{BaseType, ScalarKind};
use crate::shader::UniformValue;

/// OpenGL GPU backend.
pub struct GlBackend {
    gl: glow::Context,
    debug_labels: bool,
}

impl GlBackend {
    /// Wrap a host-created context.
    pub fn new(gl: glow::Context) -> Self {
        let version = gl.version();
        let debug_labels = gl.supported_extensions().contains("GL_KHR_debug")
            || (!version.is_embedded && (version.major, version.minor) >= (4, 3));
        log::info!(
            "Using OpenGL {}.{} ({})",
            version.major,
            version.minor,
            version.vendor_info
        );
        Self { gl, debug_labels }
    }

    /// Get the wrapped context.
    pub fn context(&self) -> &glow::Context {
        &self.gl
    }
}

impl std::fmt::Debug for GlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlBackend")
            .field("version", self.gl.version())
            .field("debug_labels", &self.debug_labels)
            .finish()
    }
}

fn buffer_target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Vertex => glow::ARRAY_BUFFER,
        BufferTarget::Index => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn buffer_usage(usage: BufferUsage) -> u32 {
    match usage {
        BufferUsage::Static => glow::STATIC_DRAW,
        BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
        BufferUsage::Stream => glow::STREAM_DRAW,
    }
}

fn scalar_type(kind: ScalarKind) -> u32 {
    match kind {
        ScalarKind::I8 => glow::BYTE,
        ScalarKind::U8 => glow::UNSIGNED_BYTE,
        ScalarKind::I16 => glow::SHORT,
        ScalarKind::U16 => glow::UNSIGNED_SHORT,
        ScalarKind::I32 => glow::INT,
        ScalarKind::U32 => glow::UNSIGNED_INT,
        ScalarKind::F32 => glow::FLOAT,
        ScalarKind::F64 => glow::DOUBLE,
    }
}

fn index_type(index: IndexType) -> u32 {
    match index {
        IndexType::U8 => glow::UNSIGNED_BYTE,
        IndexType::U16 => glow::UNSIGNED_SHORT,
        IndexType::U32 => glow::UNSIGNED_INT,
    }
}

fn draw_mode(topology: PrimitiveTopology) -> u32 {
    match topology {
        PrimitiveTopology::PointList => glow::POINTS,
        PrimitiveTopology::LineList => glow::LINES,
        PrimitiveTopology::LineStrip => glow::LINE_STRIP,
        PrimitiveTopology::TriangleList => glow::TRIANGLES,
        PrimitiveTopology::TriangleStrip => glow::TRIANGLE_STRIP,
        PrimitiveTopology::TriangleFan => glow::TRIANGLE_FAN,
    }
}

/// Map a GL type enum to a base type and component count.
fn gl_type(ty: u32) -> Option<(BaseType, u8)> {
    let mapped = match ty {
        glow::FLOAT => (BaseType::Float, 1),
        glow::FLOAT_VEC2 => (BaseType::Float, 2),
        glow::FLOAT_VEC3 => (BaseType::Float, 3),
        glow::FLOAT_VEC4 => (BaseType::Float, 4),
        glow::FLOAT_MAT4 => (BaseType::Float, 16),
        glow::DOUBLE => (BaseType::Double, 1),
        glow::DOUBLE_VEC2 => (BaseType::Double, 2),
        glow::DOUBLE_VEC3 => (BaseType::Double, 3),
        glow::DOUBLE_VEC4 => (BaseType::Double, 4),
        glow::DOUBLE_MAT4 => (BaseType::Double, 16),
        glow::INT => (BaseType::Int, 1),
        glow::INT_VEC2 => (BaseType::Int, 2),
        glow::INT_VEC3 => (BaseType::Int, 3),
        glow::INT_VEC4 => (BaseType::Int, 4),
        glow::UNSIGNED_INT => (BaseType::UInt, 1),
        glow::UNSIGNED_INT_VEC2 => (BaseType::UInt, 2),
        glow::UNSIGNED_INT_VEC3 => (BaseType::UInt, 3),
        glow::UNSIGNED_INT_VEC4 => (BaseType::UInt, 4),
        glow::BOOL => (BaseType::Bool, 1),
        glow::BOOL_VEC2 => (BaseType::Bool, 2),
        glow::BOOL_VEC3 => (BaseType::Bool, 3),
        glow::BOOL_VEC4 => (BaseType::Bool, 4),
        glow::SAMPLER_1D
        | glow::SAMPLER_2D
        | glow::SAMPLER_3D
        | glow::SAMPLER_CUBE
        | glow::SAMPLER_2D_ARRAY
        | glow::SAMPLER_2D_SHADOW
        | glow::INT_SAMPLER_2D
        | glow::UNSIGNED_INT_SAMPLER_2D => (BaseType::Sampler, 1),
        _ => return None,
    };
    Some(mapped)
}

fn array_size(size: i32) -> u32 {
    u32::try_from(size).unwrap_or(1).max(1)
}

/// Introspection names arrays after their first element, e.g. `aWeights[0]`.
fn base_name(name: &str) -> &str {
    name.strip_suffix("[0]").unwrap_or(name)
}

fn as_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn native_buffer(id: BufferId) -> glow::NativeBuffer {
    glow::NativeBuffer(id.0)
}

fn native_program(id: ProgramId) -> glow::NativeProgram {
    glow::NativeProgram(id.0)
}

fn native_vertex_array(id: VertexArrayId) -> glow::NativeVertexArray {
    glow::NativeVertexArray(id.0)
}

fn native_shader(id: ShaderId) -> glow::NativeShader {
    glow::NativeShader(id.0)
}

impl GpuBackend for GlBackend {
    fn name(&self) -> &'static str {
        "OpenGL"
    }

    fn create_buffer(&self) -> GraphicsResult<BufferId> {
        // SAFETY: the context is current on this thread.
        let buffer = unsafe { self.gl.create_buffer() }
            .map_err(GraphicsError::ResourceCreationFailed)?;
        Ok(BufferId(buffer.0))
    }

    fn buffer_data(&self, buffer: BufferId, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let gl_target = buffer_target(target);
        unsafe {
            if target == BufferTarget::Index {
                // Keep the upload from replacing another vertex array's index binding.
                self.gl.bind_vertex_array(None);
            }
            self.gl.bind_buffer(gl_target, Some(native_buffer(buffer)));
            self.gl
                .buffer_data_u8_slice(gl_target, data, buffer_usage(usage));
        }
    }

    fn buffer_sub_data(&self, buffer: BufferId, target: BufferTarget, offset: usize, data: &[u8]) {
        let gl_target = buffer_target(target);
        unsafe {
            if target == BufferTarget::Index {
                self.gl.bind_vertex_array(None);
            }
            self.gl.bind_buffer(gl_target, Some(native_buffer(buffer)));
            self.gl
                .buffer_sub_data_u8_slice(gl_target, as_i32(offset), data);
        }
    }

    fn delete_buffer(&self, buffer: BufferId) {
        unsafe { self.gl.delete_buffer(native_buffer(buffer)) }
    }

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> GraphicsResult<ShaderId> {
        let shader_type = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe {
            let shader = self
                .gl
                .create_shader(shader_type)
                .map_err(GraphicsError::ResourceCreationFailed)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(GraphicsError::ShaderCompileError { stage, log });
            }
            Ok(ShaderId(shader.0))
        }
    }

    fn delete_shader(&self, shader: ShaderId) {
        unsafe { self.gl.delete_shader(native_shader(shader)) }
    }

    fn link_program(&self, vertex: ShaderId, fragment: ShaderId) -> GraphicsResult<ProgramId> {
        unsafe {
            let program = self
                .gl
                .create_program()
                .map_err(GraphicsError::ResourceCreationFailed)?;
            self.gl.attach_shader(program, native_shader(vertex));
            self.gl.attach_shader(program, native_shader(fragment));
            self.gl.link_program(program);
            self.gl.detach_shader(program, native_shader(vertex));
            self.gl.detach_shader(program, native_shader(fragment));
            if !self.gl.get_program_link_status(program) {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                return Err(GraphicsError::ProgramLinkError(log));
            }
            Ok(ProgramId(program.0))
        }
    }

    fn active_attributes(&self, program: ProgramId) -> Vec<ActiveAttribute> {
        let native = native_program(program);
        unsafe {
            (0..self.gl.get_active_attributes(native))
                .filter_map(|index| self.gl.get_active_attribute(native, index))
                .filter_map(|attribute| {
                    // Built-ins such as gl_InstanceID have no location.
                    let location = self.gl.get_attrib_location(native, &attribute.name)?;
                    let Some((base_type, components)) = gl_type(attribute.atype) else {
                        log::warn!(
                            "Skipping attribute `{}` of unsupported type {:#x}",
                            attribute.name,
                            attribute.atype
                        );
                        return None;
                    };
                    Some(ActiveAttribute {
                        name: base_name(&attribute.name).to_string(),
                        location,
                        base_type,
                        components,
                        array_size: array_size(attribute.size),
                    })
                })
                .collect()
        }
    }

    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveUniform> {
        let native = native_program(program);
        unsafe {
            (0..self.gl.get_active_uniforms(native))
                .filter_map(|index| self.gl.get_active_uniform(native, index))
                .filter_map(|uniform| {
                    // Block members have no location.
                    let location = self.gl.get_uniform_location(native, &uniform.name)?;
                    let Some((base_type, components)) = gl_type(uniform.utype) else {
                        log::warn!(
                            "Skipping uniform `{}` of unsupported type {:#x}",
                            uniform.name,
                            uniform.utype
                        );
                        return None;
                    };
                    Some(ActiveUniform {
                        name: base_name(&uniform.name).to_string(),
                        location: UniformLocation(location.0),
                        base_type,
                        components,
                        array_size: array_size(uniform.size),
                    })
                })
                .collect()
        }
    }

    fn use_program(&self, program: Option<ProgramId>) {
        unsafe { self.gl.use_program(program.map(native_program)) }
    }

    fn set_uniform(&self, location: UniformLocation, value: &UniformValue) {
        let location = glow::NativeUniformLocation(location.0);
        let loc = Some(&location);
        let gl = &self.gl;
        unsafe {
            match value {
                UniformValue::Float(v) => gl.uniform_1_f32(loc, *v),
                UniformValue::Vec2([x, y]) => gl.uniform_2_f32(loc, *x, *y),
                UniformValue::Vec3([x, y, z]) => gl.uniform_3_f32(loc, *x, *y, *z),
                UniformValue::Vec4([x, y, z, w]) => gl.uniform_4_f32(loc, *x, *y, *z, *w),
                UniformValue::Int(v) => gl.uniform_1_i32(loc, *v),
                UniformValue::IVec2([x, y]) => gl.uniform_2_i32(loc, *x, *y),
                UniformValue::IVec3([x, y, z]) => gl.uniform_3_i32(loc, *x, *y, *z),
                UniformValue::IVec4([x, y, z, w]) => gl.uniform_4_i32(loc, *x, *y, *z, *w),
                UniformValue::UInt(v) => gl.uniform_1_u32(loc, *v),
                UniformValue::UVec2([x, y]) => gl.uniform_2_u32(loc, *x, *y),
                UniformValue::UVec3([x, y, z]) => gl.uniform_3_u32(loc, *x, *y, *z),
                UniformValue::UVec4([x, y, z, w]) => gl.uniform_4_u32(loc, *x, *y, *z, *w),
                UniformValue::Bool(v) => gl.uniform_1_i32(loc, i32::from(*v)),
                UniformValue::BVec2([x, y]) => {
                    gl.uniform_2_i32(loc, i32::from(*x), i32::from(*y))
                }
                UniformValue::BVec3([x, y, z]) => {
                    gl.uniform_3_i32(loc, i32::from(*x), i32::from(*y), i32::from(*z))
                }
                UniformValue::BVec4([x, y, z, w]) => gl.uniform_4_i32(
                    loc,
                    i32::from(*x),
                    i32::from(*y),
                    i32::from(*z),
                    i32::from(*w),
                ),
                // glow has no glUniform*d entry points.
                UniformValue::Double(_)
                | UniformValue::DVec2(_)
                | UniformValue::DVec3(_)
                | UniformValue::DVec4(_) => log::warn!(
                    "GlBackend: cannot write {} uniform at location {}",
                    value.type_name(),
                    location.0
                ),
                UniformValue::Mat4(m) => gl.uniform_matrix_4_f32_slice(loc, false, m),
                UniformValue::FloatArray(v) => gl.uniform_1_f32_slice(loc, v),
                UniformValue::Vec2Array(v) => gl.uniform_2_f32_slice(loc, v.as_flattened()),
                UniformValue::Vec3Array(v) => gl.uniform_3_f32_slice(loc, v.as_flattened()),
                UniformValue::Vec4Array(v) => gl.uniform_4_f32_slice(loc, v.as_flattened()),
                UniformValue::IntArray(v) => gl.uniform_1_i32_slice(loc, v),
                UniformValue::UIntArray(v) => gl.uniform_1_u32_slice(loc, v),
                UniformValue::Mat4Array(v) => {
                    gl.uniform_matrix_4_f32_slice(loc, false, v.as_flattened())
                }
            }
        }
    }

    fn delete_program(&self, program: ProgramId) {
        unsafe { self.gl.delete_program(native_program(program)) }
    }

    fn create_vertex_array(&self) -> GraphicsResult<VertexArrayId> {
        let vertex_array = unsafe { self.gl.create_vertex_array() }
            .map_err(GraphicsError::ResourceCreationFailed)?;
        Ok(VertexArrayId(vertex_array.0))
    }

    fn set_attribute(&self, vertex_array: VertexArrayId, buffer: BufferId, pointer: &AttribPointer) {
        let index = pointer.location;
        let size = i32::from(pointer.components);
        let data_type = scalar_type(pointer.kind);
        let stride = as_i32(pointer.stride);
        let offset = as_i32(pointer.offset);
        unsafe {
            self.gl
                .bind_vertex_array(Some(native_vertex_array(vertex_array)));
            self.gl
                .bind_buffer(glow::ARRAY_BUFFER, Some(native_buffer(buffer)));
            self.gl.enable_vertex_attrib_array(index);
            match pointer.base_type {
                BaseType::Double => {
                    self.gl
                        .vertex_attrib_pointer_f64(index, size, data_type, stride, offset)
                }
                BaseType::Int | BaseType::UInt | BaseType::Bool | BaseType::Sampler => {
                    self.gl
                        .vertex_attrib_pointer_i32(index, size, data_type, stride, offset)
                }
                BaseType::Float => self
                    .gl
                    .vertex_attrib_pointer_f32(index, size, data_type, false, stride, offset),
            }
            self.gl.vertex_attrib_divisor(index, pointer.divisor);
            self.gl.bind_vertex_array(None);
        }
    }

    fn set_index_buffer(&self, vertex_array: VertexArrayId, buffer: BufferId) {
        unsafe {
            self.gl
                .bind_vertex_array(Some(native_vertex_array(vertex_array)));
            self.gl
                .bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(native_buffer(buffer)));
            self.gl.bind_vertex_array(None);
        }
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayId) {
        unsafe { self.gl.delete_vertex_array(native_vertex_array(vertex_array)) }
    }

    fn draw(&self, program: ProgramId, vertex_array: VertexArrayId, command: &DrawCommand) {
        let mode = draw_mode(command.topology);
        let count = i32::try_from(command.count).unwrap_or(i32::MAX);
        let instances = i32::try_from(command.instance_count).unwrap_or(i32::MAX);
        unsafe {
            self.gl.use_program(Some(native_program(program)));
            self.gl
                .bind_vertex_array(Some(native_vertex_array(vertex_array)));
            match command.index_type {
                Some(index) => {
                    self.gl
                        .draw_elements_instanced(mode, count, index_type(index), 0, instances)
                }
                None => self.gl.draw_arrays_instanced(mode, 0, count, instances),
            }
            self.gl.bind_vertex_array(None);
        }
    }

    fn set_label(&self, object: GpuObject, label: &str) {
        if !self.debug_labels {
            return;
        }
        let (identifier, name): (u32, NonZeroU32) = match object {
            GpuObject::Buffer(id) => (glow::BUFFER, id.0),
            GpuObject::Program(id) => (glow::PROGRAM, id.0),
            GpuObject::VertexArray(id) => (glow::VERTEX_ARRAY, id.0),
        };
        unsafe { self.gl.object_label(identifier, name.get(), Some(label)) }
    }
}
