//! Materials.
//!
//! A [`Material`] is the batching key of the registry: a shader program plus
//! the attribute names its mesh vertices and instance values bind to, and the
//! camera uniforms it consumes. Two materials batch separately unless they
//! are the same `Rc`, even when built from equal descriptors.

mod material;

pub use material::{CameraUniformNames, CameraUniforms, Material, MaterialDescriptor};
