//! CPU-side mesh data structures.
//!
//! This module provides:
//! - [`PrimitiveTopology`] - How vertices are assembled into primitives
//! - [`MeshData`] - Typed vertex list plus optional `u32` indices

/// Primitive topology describing how vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Each vertex is a separate point.
    PointList,
    /// Every two vertices form a line.
    LineList,
    /// Vertices form a connected strip of lines.
    LineStrip,
    /// Every three vertices form a triangle.
    #[default]
    TriangleList,
    /// Vertices form a connected strip of triangles.
    TriangleStrip,
    /// Every vertex after the second forms a triangle with the first one.
    TriangleFan,
}

/// A CPU-side mesh: one typed vertex stream and optional indices.
///
/// This is the GPU-agnostic representation produced by the generators in
/// [`super::generators`]; `glint-graphics` uploads it into a GPU mesh.
///
/// # Example
///
/// ```ignore
/// let data = MeshData::new(vec![[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
///     .with_label("triangle");
/// assert_eq!(data.vertex_count(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData<V> {
    vertices: Vec<V>,
    indices: Option<Vec<u32>>,
    topology: PrimitiveTopology,
    label: Option<String>,
}

impl<V> MeshData<V> {
    /// Create non-indexed mesh data from a vertex list.
    pub fn new(vertices: Vec<V>) -> Self {
        Self {
            vertices,
            indices: None,
            topology: PrimitiveTopology::TriangleList,
            label: None,
        }
    }

    /// Attach index data. An empty list leaves the mesh non-indexed.
    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = if indices.is_empty() {
            None
        } else {
            Some(indices)
        };
        self
    }

    /// Set the primitive topology.
    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Get the vertices.
    pub fn vertices(&self) -> &[V] {
        &self.vertices
    }

    /// Get the indices, if any.
    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    /// Get the primitive topology.
    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    /// Get the debug label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Get the number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of indices (0 for non-indexed).
    pub fn index_count(&self) -> usize {
        self.indices.as_ref().map_or(0, Vec::len)
    }

    /// Check if this mesh uses indexed drawing.
    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    /// Find the first index that points past the vertex list.
    pub fn first_out_of_range_index(&self) -> Option<u32> {
        self.indices
            .as_deref()
            .and_then(|indices| first_out_of_range_index(indices, self.vertices.len()))
    }
}

/// Find the first of `indices` that does not address one of `vertex_count` vertices.
pub fn first_out_of_range_index(indices: &[u32], vertex_count: usize) -> Option<u32> {
    indices
        .iter()
        .copied()
        .find(|&i| usize::try_from(i).map_or(true, |i| i >= vertex_count))
}
