//! GPU meshes.
//!
//! A [`Mesh`] owns the device copy of one vertex stream and an optional
//! `u32` index buffer, uploaded from CPU [`MeshData`]. Meshes are shared
//! through `Rc`; the batch registry only keeps weak references to them.
//!
//! [`MeshData`]: glint_core::mesh::MeshData

mod data;

pub use data::Mesh;
pub use glint_core::mesh::{MeshData, PrimitiveTopology};
