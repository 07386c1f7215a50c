//! # glint core
//!
//! Renderer-agnostic building blocks for the glint batch renderer:
//! math aliases and projection helpers, and CPU mesh data with generators.

pub mod math;
pub mod mesh;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core library version.
pub fn init() {
    log::info!("glint core v{} initialized", VERSION);
}
