//! Graphics device.
//!
//! The [`GraphicsDevice`] is the main interface for creating GPU resources.
//! It owns the backend and the [`DeviceParameters`], and counts the live
//! buffers, programs and vertex arrays created through it.

use std::cell::Cell;
use std::rc::Rc;

use glint_core::mesh::MeshData;

use crate::backend::{self, BackendType, BufferTarget, BufferUsage, GpuBackend, GpuObject};
use crate::binding::VertexArray;
use crate::error::GraphicsResult;
use crate::layout::VertexData;
use crate::mesh::Mesh;
use crate::resources::GpuBuffer;
use crate::shader::ShaderProgram;

/// Configuration for a [`GraphicsDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceParameters {
    /// Backend created by [`GraphicsDevice::new`].
    pub backend: BackendType,
    /// Forward resource labels to the backend.
    pub debug_labels: bool,
    /// Usage hint for per-batch instance buffers.
    pub instance_usage: BufferUsage,
    /// Skip the draw call of batches with no instances.
    pub skip_empty_batches: bool,
}

impl Default for DeviceParameters {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            debug_labels: false,
            instance_usage: BufferUsage::Stream,
            skip_empty_batches: true,
        }
    }
}

impl DeviceParameters {
    /// Create the default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend type.
    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    /// Enable or disable debug labels.
    pub fn with_debug_labels(mut self, enabled: bool) -> Self {
        self.debug_labels = enabled;
        self
    }

    /// Set the usage hint for instance buffers.
    pub fn with_instance_usage(mut self, usage: BufferUsage) -> Self {
        self.instance_usage = usage;
        self
    }

    /// Enable or disable skipping empty batches.
    pub fn with_skip_empty_batches(mut self, skip: bool) -> Self {
        self.skip_empty_batches = skip;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResourceKind {
    Buffer,
    Program,
    VertexArray,
}

/// A graphics device for creating GPU resources.
///
/// Shared as `Rc`: every resource keeps its device alive, and all calls must
/// stay on the thread that owns the rendering context.
///
/// # Example
///
/// ```ignore
/// let device = GraphicsDevice::new(DeviceParameters::default())?;
///
/// let program = device.create_program(VERTEX_SOURCE, FRAGMENT_SOURCE)?;
/// let quad = device.create_mesh(&glint_core::mesh::unit_quad())?;
/// ```
pub struct GraphicsDevice {
    backend: Rc<dyn GpuBackend>,
    parameters: DeviceParameters,
    buffers: Cell<usize>,
    programs: Cell<usize>,
    vertex_arrays: Cell<usize>,
}

impl GraphicsDevice {
    /// Create a device with the backend named in `parameters`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be created on its own (the GL
    /// backend needs a host context; use [`with_backend`](Self::with_backend)).
    pub fn new(parameters: DeviceParameters) -> GraphicsResult<Rc<Self>> {
        let backend = backend::create_backend(parameters.backend)?;
        Ok(Self::with_backend(backend, parameters))
    }

    /// Create a device around an existing backend.
    pub fn with_backend(backend: Rc<dyn GpuBackend>, parameters: DeviceParameters) -> Rc<Self> {
        log::info!("Creating GraphicsDevice on {} backend", backend.name());
        Rc::new(Self {
            backend,
            parameters,
            buffers: Cell::new(0),
            programs: Cell::new(0),
            vertex_arrays: Cell::new(0),
        })
    }

    /// Get the backend.
    pub fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    /// Get the device parameters.
    pub fn parameters(&self) -> &DeviceParameters {
        &self.parameters
    }

    /// Create an empty buffer.
    pub fn create_buffer<T: VertexData>(
        self: &Rc<Self>,
        target: BufferTarget,
        usage: BufferUsage,
    ) -> GraphicsResult<GpuBuffer<T>> {
        GpuBuffer::new(self, target, usage)
    }

    /// Create a vertex buffer holding `data`.
    pub fn create_vertex_buffer<T: VertexData>(
        self: &Rc<Self>,
        data: &[T],
        usage: BufferUsage,
    ) -> GraphicsResult<GpuBuffer<T>> {
        let mut buffer = GpuBuffer::new(self, BufferTarget::Vertex, usage)?;
        buffer.upload(data)?;
        Ok(buffer)
    }

    /// Create an index buffer holding `indices`.
    pub fn create_index_buffer<I: VertexData>(
        self: &Rc<Self>,
        indices: &[I],
        usage: BufferUsage,
    ) -> GraphicsResult<GpuBuffer<I>> {
        let mut buffer = GpuBuffer::new(self, BufferTarget::Index, usage)?;
        buffer.upload(indices)?;
        Ok(buffer)
    }

    /// Compile and link a shader program.
    pub fn create_program(
        self: &Rc<Self>,
        vertex_source: &str,
        fragment_source: &str,
    ) -> GraphicsResult<Rc<ShaderProgram>> {
        ShaderProgram::compile(self, vertex_source, fragment_source).map(Rc::new)
    }

    /// Create an empty vertex array.
    pub fn create_vertex_array(self: &Rc<Self>) -> GraphicsResult<VertexArray> {
        VertexArray::new(self)
    }

    /// Upload CPU mesh data into a shareable mesh.
    pub fn create_mesh<V: VertexData>(self: &Rc<Self>, data: &MeshData<V>) -> GraphicsResult<Rc<Mesh<V>>> {
        Mesh::from_data(self, data).map(Rc::new)
    }

    /// Get the number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.get()
    }

    /// Get the number of live programs.
    pub fn program_count(&self) -> usize {
        self.programs.get()
    }

    /// Get the number of live vertex arrays.
    pub fn vertex_array_count(&self) -> usize {
        self.vertex_arrays.get()
    }

    pub(crate) fn resource_created(&self, kind: ResourceKind) {
        let counter = self.counter(kind);
        counter.set(counter.get() + 1);
    }

    pub(crate) fn resource_released(&self, kind: ResourceKind) {
        let counter = self.counter(kind);
        counter.set(counter.get().saturating_sub(1));
    }

    /// Forward a debug label when labels are enabled.
    pub(crate) fn label_object(&self, object: GpuObject, label: &str) {
        if self.parameters.debug_labels {
            self.backend.set_label(object, label);
        }
    }

    fn counter(&self, kind: ResourceKind) -> &Cell<usize> {
        match kind {
            ResourceKind::Buffer => &self.buffers,
            ResourceKind::Program => &self.programs,
            ResourceKind::VertexArray => &self.vertex_arrays,
        }
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("backend", &self.backend.name())
            .field("parameters", &self.parameters)
            .field("buffers", &self.buffers.get())
            .field("programs", &self.programs.get())
            .field("vertex_arrays", &self.vertex_arrays.get())
            .finish()
    }
}

// Device handles are tied to the context thread.
static_assertions::assert_not_impl_any!(GraphicsDevice: Send, Sync);
