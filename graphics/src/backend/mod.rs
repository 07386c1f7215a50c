//! GPU backend abstraction layer.
//!
//! This module provides a trait-based abstraction over an OpenGL-style device
//! API, so the rest of the crate works the same on a real context and in
//! headless tests.
//!
//! # Available Backends
//!
//! - `dummy` (default): Headless backend that models device objects in memory
//!   and records every call, for tests and tooling
//! - `gl-backend`: OpenGL 3.3+ backend on top of `glow`
//!
//! # Architecture
//!
//! Each backend implements the [`GpuBackend`] trait, which provides:
//! - Buffer allocation, full reallocation and partial updates
//! - Shader compilation, program linking and introspection
//! - Vertex array attribute pointers and instancing divisors
//! - Uniform writes and instanced draws
//!
//! Device objects are referred to by small `Copy` handles. All calls must be
//! made from the thread that owns the rendering context.

#[cfg(feature = "dummy")]
pub mod dummy;

#[cfg(feature = "gl-backend")]
pub mod gl;

use std::fmt;
use std::num::NonZeroU32;
use std::rc::Rc;

use glint_core::mesh::PrimitiveTopology;

use crate::error::{GraphicsError, GraphicsResult};
use crate::layout::{BaseType, ScalarKind};
use crate::shader::UniformValue;

#[cfg(feature = "dummy")]
pub use dummy::DummyBackend;

#[cfg(feature = "gl-backend")]
pub use gl::GlBackend;

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub(crate) NonZeroU32);

            impl $name {
                /// Get the raw device name of this object.
                pub fn raw(self) -> u32 {
                    self.0.get()
                }
            }
        )*
    };
}

define_handle! {
    /// Handle to a device buffer.
    BufferId,
    /// Handle to a compiled shader stage.
    ShaderId,
    /// Handle to a linked shader program.
    ProgramId,
    /// Handle to a vertex array object.
    VertexArrayId,
}

/// Location of a uniform within its program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub(crate) u32);

impl UniformLocation {
    /// Get the raw location.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Which backend to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// Headless recording backend.
    #[default]
    Dummy,
    /// OpenGL through a host-supplied `glow` context.
    Gl,
}

/// What a buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex or instance attribute data.
    Vertex,
    /// Element indices.
    Index,
}

/// Expected update frequency of a buffer, forwarded to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// Written once, drawn many times.
    #[default]
    Static,
    /// Rewritten occasionally.
    Dynamic,
    /// Rewritten every frame.
    Stream,
}

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage.
    Vertex,
    /// Fragment stage.
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Element type of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    /// 8-bit indices.
    U8,
    /// 16-bit indices.
    U16,
    /// 32-bit indices.
    U32,
}

impl IndexType {
    /// Get the index type for a scalar kind, if it can index.
    pub fn from_scalar(kind: ScalarKind) -> Option<Self> {
        match kind {
            ScalarKind::U8 => Some(Self::U8),
            ScalarKind::U16 => Some(Self::U16),
            ScalarKind::U32 => Some(Self::U32),
            _ => None,
        }
    }

    /// Get the size in bytes of each index.
    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// An active vertex input reported by program introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAttribute {
    /// Attribute name.
    pub name: String,
    /// First attribute slot.
    pub location: u32,
    /// Base type.
    pub base_type: BaseType,
    /// Components (1..=4, or 16 for `mat4`).
    pub components: u8,
    /// Array length (1 for non-arrays).
    pub array_size: u32,
}

/// An active uniform reported by program introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    /// Uniform name, without any `[0]` suffix.
    pub name: String,
    /// Location of element 0.
    pub location: UniformLocation,
    /// Base type.
    pub base_type: BaseType,
    /// Components (1..=4, or 16 for `mat4`).
    pub components: u8,
    /// Array length (1 for non-arrays).
    pub array_size: u32,
}

/// One attribute slot's source within a bound buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttribPointer {
    /// Attribute slot.
    pub location: u32,
    /// Components read per vertex (1..=4).
    pub components: u8,
    /// Scalar kind stored in the buffer.
    pub kind: ScalarKind,
    /// Shader-side base type, selecting float, integer or double fetch.
    pub base_type: BaseType,
    /// Byte stride between elements.
    pub stride: usize,
    /// Byte offset of the first element.
    pub offset: usize,
    /// Instancing divisor (0 = per vertex).
    pub divisor: u32,
}

/// Parameters of one instanced draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawCommand {
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Vertices (non-indexed) or indices (indexed) to draw.
    pub count: u32,
    /// Number of instances.
    pub instance_count: u32,
    /// Index type when drawing with the bound index buffer.
    pub index_type: Option<IndexType>,
}

/// A device object that can carry a debug label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuObject {
    /// A buffer.
    Buffer(BufferId),
    /// A program.
    Program(ProgramId),
    /// A vertex array.
    VertexArray(VertexArrayId),
}

/// Backend trait for GPU operations.
///
/// Implementations translate these calls to a concrete device API. Object
/// creation and compilation report failures; the remaining calls mirror
/// device calls that have no synchronous failure path.
pub trait GpuBackend {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Create a buffer object with no storage.
    fn create_buffer(&self) -> GraphicsResult<BufferId>;

    /// Replace the buffer's storage with `data` (full reallocation).
    fn buffer_data(&self, buffer: BufferId, target: BufferTarget, data: &[u8], usage: BufferUsage);

    /// Overwrite part of the buffer's existing storage.
    fn buffer_sub_data(&self, buffer: BufferId, target: BufferTarget, offset: usize, data: &[u8]);

    /// Delete a buffer.
    fn delete_buffer(&self, buffer: BufferId);

    /// Compile one shader stage.
    ///
    /// Fails with [`GraphicsError::ShaderCompileError`] carrying the compiler log.
    fn compile_shader(&self, stage: ShaderStage, source: &str) -> GraphicsResult<ShaderId>;

    /// Delete a shader stage.
    fn delete_shader(&self, shader: ShaderId);

    /// Link two stages into a program.
    ///
    /// Fails with [`GraphicsError::ProgramLinkError`] carrying the linker log.
    fn link_program(&self, vertex: ShaderId, fragment: ShaderId) -> GraphicsResult<ProgramId>;

    /// List the program's active vertex inputs.
    fn active_attributes(&self, program: ProgramId) -> Vec<ActiveAttribute>;

    /// List the program's active uniforms.
    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveUniform>;

    /// Make `program` current (or none).
    fn use_program(&self, program: Option<ProgramId>);

    /// Write a uniform of the current program.
    fn set_uniform(&self, location: UniformLocation, value: &UniformValue);

    /// Delete a program.
    fn delete_program(&self, program: ProgramId);

    /// Create a vertex array object.
    fn create_vertex_array(&self) -> GraphicsResult<VertexArrayId>;

    /// Point one attribute slot of `vertex_array` at `buffer`, enabling it.
    fn set_attribute(&self, vertex_array: VertexArrayId, buffer: BufferId, pointer: &AttribPointer);

    /// Attach `buffer` as the index buffer of `vertex_array`.
    fn set_index_buffer(&self, vertex_array: VertexArrayId, buffer: BufferId);

    /// Delete a vertex array object.
    fn delete_vertex_array(&self, vertex_array: VertexArrayId);

    /// Issue one instanced draw with `program` and `vertex_array`.
    fn draw(&self, program: ProgramId, vertex_array: VertexArrayId, command: &DrawCommand);

    /// Attach a debug label to an object.
    fn set_label(&self, object: GpuObject, label: &str);
}

/// Create a backend of the given type.
///
/// The GL backend wraps a context owned by the host windowing layer, so it is
/// constructed directly with `GlBackend::new` and passed to
/// `GraphicsDevice::with_backend` instead.
pub fn create_backend(backend_type: BackendType) -> GraphicsResult<Rc<dyn GpuBackend>> {
    match backend_type {
        #[cfg(feature = "dummy")]
        BackendType::Dummy => {
            log::info!("Creating dummy GPU backend");
            Ok(Rc::new(DummyBackend::new()))
        }
        #[cfg(not(feature = "dummy"))]
        BackendType::Dummy => Err(GraphicsError::InvalidParameter(
            "dummy backend requires the `dummy` feature".to_string(),
        )),
        BackendType::Gl => {
            log::warn!("GL backend requested without a context");
            Err(GraphicsError::InvalidParameter(
                "the GL backend wraps a host context; build it with GlBackend::new".to_string(),
            ))
        }
    }
}
