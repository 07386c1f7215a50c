//! Cameras.
//!
//! Materials that consume a camera receive its view and projection matrices
//! from any [`CameraMatrices`] implementation at draw time. [`Camera`] is the
//! stock implementation.

mod camera;

pub use camera::{Camera, CameraMatrices};
