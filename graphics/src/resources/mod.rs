//! GPU resources.
//!
//! This module contains the resource types created through [`GraphicsDevice`]:
//! - [`GpuBuffer`] - typed device buffer with grow-or-update uploads
//!
//! Resources hold a strong reference to their device and release their device
//! object on drop or on an explicit `dispose`.
//!
//! [`GraphicsDevice`]: crate::GraphicsDevice

mod buffer;

pub use buffer::GpuBuffer;
