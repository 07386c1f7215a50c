//! # Glint Graphics
//!
//! Instanced batch renderer over an OpenGL-style device.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`layout`] - Attribute layouts inferred from plain vertex and instance types
//! - [`GpuBuffer`] - Typed device buffers that grow on demand
//! - [`ShaderProgram`] - Compiled programs with introspected attributes and typed uniforms
//! - [`VertexArray`] - Attribute bindings with per-instance divisors
//! - [`Mesh`] - Vertex and optional index buffers with a topology
//! - [`Graphics`] - A registry batching instances by material and mesh
//! - Multiple backend support: OpenGL via `glow`, and Dummy (for testing)
//!
//! ## Example
//!
//! ```ignore
//! use glint_graphics::{DeviceParameters, Graphics, GraphicsDevice, Material, MaterialDescriptor};
//!
//! let device = GraphicsDevice::new(DeviceParameters::default())?;
//! let program = device.create_program(VERTEX_SRC, FRAGMENT_SRC)?;
//! let material = Rc::new(Material::<[f32; 3], ShapeInstance>::new(
//!     MaterialDescriptor::new(program)
//!         .with_mesh_attributes(&["aPosition"])
//!         .with_instance_attributes(&["aModel", "aColor"]),
//! )?);
//! let quad = device.create_mesh(&glint_core::mesh::generators::unit_quad())?;
//!
//! let mut graphics = Graphics::new(&device);
//! graphics.add(&material, &quad, shape)?;
//! graphics.draw(Some(&camera))?;
//! ```

// Lets the derive macro's `glint_graphics::` paths resolve inside this crate.
extern crate self as glint_graphics;

pub mod backend;
pub mod batch;
pub mod binding;
pub mod device;
pub mod error;
pub mod layout;
pub mod materials;
pub mod mesh;
pub mod resources;
pub mod scene;
pub mod shader;

// Re-export main types for convenience
pub use backend::{BackendType, BufferTarget, BufferUsage, GpuBackend};
#[cfg(feature = "dummy")]
pub use backend::DummyBackend;
#[cfg(feature = "gl-backend")]
pub use backend::GlBackend;
pub use batch::{FrameStats, Graphics};
pub use binding::VertexArray;
pub use device::{DeviceParameters, GraphicsDevice};
pub use error::{GraphicsError, GraphicsResult};
// Derive macro; shares the trait's name.
pub use graphics_macro::VertexData;
pub use layout::{BaseType, Layout, ScalarKind, VertexData};
pub use materials::{Material, MaterialDescriptor};
pub use mesh::{Mesh, MeshData, PrimitiveTopology};
pub use resources::GpuBuffer;
pub use scene::{Camera, CameraMatrices};
pub use shader::{ProgramAttribute, ProgramUniform, ShaderProgram, UniformValue};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// This should be called before using any graphics functionality.
pub fn init() {
    log::info!("Glint Graphics v{} initialized", VERSION);
}
