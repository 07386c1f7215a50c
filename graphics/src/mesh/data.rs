//! GPU mesh with a vertex buffer and an optional index buffer.

use std::rc::Rc;

use glint_core::mesh::{MeshData, PrimitiveTopology, first_out_of_range_index};

use crate::backend::BufferUsage;
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::layout::VertexData;
use crate::resources::GpuBuffer;

/// A GPU mesh: vertices of type `V`, optional `u32` indices and a topology.
///
/// # Example
///
/// ```ignore
/// let quad = device.create_mesh(&glint_core::mesh::generators::unit_quad())?;
/// assert_eq!(quad.index_count(), Some(6));
/// ```
pub struct Mesh<V: VertexData> {
    vertices: GpuBuffer<V>,
    indices: Option<GpuBuffer<u32>>,
    topology: PrimitiveTopology,
    label: Option<String>,
}

impl<V: VertexData> Mesh<V> {
    /// Upload vertices and optional indices.
    ///
    /// # Errors
    ///
    /// Fails with [`GraphicsError::InvalidParameter`] when an index points
    /// past the last vertex, or with any buffer creation error.
    pub fn new(
        device: &Rc<GraphicsDevice>,
        vertices: &[V],
        indices: Option<&[u32]>,
        topology: PrimitiveTopology,
    ) -> GraphicsResult<Self> {
        if let Some(bad) = indices.and_then(|i| first_out_of_range_index(i, vertices.len())) {
            return Err(GraphicsError::InvalidParameter(format!(
                "index {bad} is out of range for {} vertices",
                vertices.len()
            )));
        }

        let vertex_buffer = device.create_vertex_buffer(vertices, BufferUsage::Static)?;
        let index_buffer = indices
            .map(|i| device.create_index_buffer(i, BufferUsage::Static))
            .transpose()?;

        Ok(Self {
            vertices: vertex_buffer,
            indices: index_buffer,
            topology,
            label: None,
        })
    }

    /// Upload CPU mesh data, keeping its topology and label.
    pub fn from_data(device: &Rc<GraphicsDevice>, data: &MeshData<V>) -> GraphicsResult<Self> {
        let mesh = Self::new(device, data.vertices(), data.indices(), data.topology())?;
        Ok(match data.label() {
            Some(label) => mesh.with_label(label),
            None => mesh,
        })
    }

    /// Set a debug label, also applied to the mesh's buffers.
    pub fn with_label(self, label: impl Into<String>) -> Self {
        let label = label.into();
        let Self {
            vertices, indices, topology, ..
        } = self;
        Self {
            vertices: vertices.with_label(format!("{label} vertices")),
            indices: indices.map(|i| i.with_label(format!("{label} indices"))),
            topology,
            label: Some(label),
        }
    }

    /// Get the vertex buffer.
    pub fn vertices(&self) -> &GpuBuffer<V> {
        &self.vertices
    }

    /// Get the index buffer, if any.
    pub fn indices(&self) -> Option<&GpuBuffer<u32>> {
        self.indices.as_ref()
    }

    /// Get the primitive topology.
    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    /// Get the number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of indices, if indexed.
    pub fn index_count(&self) -> Option<usize> {
        self.indices.as_ref().map(GpuBuffer::len)
    }

    /// Get the debug label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Release the device buffers. Disposing again does nothing.
    pub fn dispose(&mut self) {
        self.vertices.dispose();
        if let Some(indices) = &mut self.indices {
            indices.dispose();
        }
    }
}

impl<V: VertexData> std::fmt::Debug for Mesh<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("label", &self.label)
            .field("topology", &self.topology)
            .field("vertices", &self.vertices.len())
            .field("indices", &self.index_count())
            .finish()
    }
}
